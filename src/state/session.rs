use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::state::asset::AssetPriceState;
use crate::store::PriceStore;
use crate::types::{MarketSnapshot, Notification};

/// Lifecycle of a team session.
///
/// Active -> Draining (last subscriber left, cancel sent) -> Destroyed
/// (removed from the registry). A session never goes back to Active; the
/// next subscriber for the team gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Draining,
    Destroyed,
}

/// Sending half of one viewer's stream.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: Uuid,
    tx: mpsc::Sender<MarketSnapshot>,
}

impl SubscriberHandle {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<MarketSnapshot>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { id: Uuid::new_v4(), tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Never waits. False when the viewer is gone or too far behind.
    pub fn deliver(&self, snapshot: MarketSnapshot) -> bool {
        self.tx.try_send(snapshot).is_ok()
    }
}

#[derive(Debug)]
struct Subscriber {
    handle: SubscriberHandle,
    user_id: String,
}

#[derive(Debug)]
struct Inner {
    subscribers: HashMap<Uuid, Subscriber>,
    pending: Vec<Notification>,
    phase: SessionPhase,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// One team's live market: assets, viewers, queued notifications.
#[derive(Debug)]
pub struct TeamSession {
    pub team_id: String,
    // Only the broadcast loop mutates prices.
    assets: Mutex<Vec<AssetPriceState>>,
    inner: Mutex<Inner>,
    cancel: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TeamSession {
    pub fn new(team_id: String, assets: Vec<AssetPriceState>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            team_id,
            assets: Mutex::new(assets),
            inner: Mutex::new(Inner {
                subscribers: HashMap::new(),
                pending: Vec::new(),
                phase: SessionPhase::Active,
            }),
            cancel,
            task: Mutex::new(None),
        }
    }

    /// Spawn the broadcast loop. Called once, by the registry, right before
    /// the session becomes visible.
    pub(crate) fn start(self: &Arc<Self>, store: Arc<dyn PriceStore>, tick: Duration) {
        let rx = self.cancel.subscribe();
        let handle = tokio::spawn(crate::engine::task::run_session(
            self.clone(),
            store,
            tick,
            rx,
        ));
        *lock(&self.task) = Some(handle);
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.inner).phase
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    pub fn asset_count(&self) -> usize {
        lock(&self.assets).len()
    }

    /// Copy of the current asset states.
    pub fn assets(&self) -> Vec<AssetPriceState> {
        lock(&self.assets).clone()
    }

    /// Run `f` over the asset list with exclusive access.
    pub(crate) fn with_assets<R>(&self, f: impl FnOnce(&mut Vec<AssetPriceState>) -> R) -> R {
        let mut g = lock(&self.assets);
        f(&mut *g)
    }

    pub(crate) fn add_subscriber(&self, handle: SubscriberHandle, user_id: &str) {
        let mut g = lock(&self.inner);
        g.subscribers.insert(
            handle.id(),
            Subscriber {
                handle,
                user_id: user_id.to_string(),
            },
        );
    }

    /// Remaining subscriber count, or None if `id` was not subscribed here.
    pub(crate) fn remove_subscriber(&self, id: Uuid) -> Option<usize> {
        let mut g = lock(&self.inner);
        g.subscribers.remove(&id)?;
        Some(g.subscribers.len())
    }

    pub(crate) fn enqueue(&self, notifications: &[Notification]) {
        lock(&self.inner).pending.extend_from_slice(notifications);
    }

    /// Distinct subscribed user ids, in no particular order.
    pub fn subscribed_users(&self) -> Vec<String> {
        let g = lock(&self.inner);
        let mut seen = HashSet::new();
        g.subscribers
            .values()
            .filter(|s| seen.insert(s.user_id.as_str()))
            .map(|s| s.user_id.clone())
            .collect()
    }

    /// Drain the pending queue and copy the subscriber list, atomically.
    pub(crate) fn take_broadcast(&self) -> (Vec<Notification>, Vec<(SubscriberHandle, String)>) {
        let mut g = lock(&self.inner);
        let pending = std::mem::take(&mut g.pending);
        let subs = g
            .subscribers
            .values()
            .map(|s| (s.handle.clone(), s.user_id.clone()))
            .collect();
        (pending, subs)
    }

    /// Active -> Draining. Drops remaining subscribers (their streams end)
    /// and pending notifications, then signals the loop.
    pub(crate) fn begin_drain(&self) {
        {
            let mut g = lock(&self.inner);
            if g.phase != SessionPhase::Active {
                return;
            }
            g.phase = SessionPhase::Draining;
            g.subscribers.clear();
            g.pending.clear();
        }
        self.cancel.send_replace(true);
    }

    pub(crate) fn mark_destroyed(&self) {
        lock(&self.inner).phase = SessionPhase::Destroyed;
    }

    /// Wait for the broadcast loop to exit. Returns at once if it never
    /// started or was already awaited.
    pub async fn stopped(&self) {
        let handle = lock(&self.task).take();
        if let Some(h) = handle {
            let _ = h.await;
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|h| !h.is_finished())
    }
}
