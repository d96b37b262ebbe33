pub mod asset;
pub mod session;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{MarketError, MarketResult};
use crate::store::PriceStore;
use crate::types::Notification;
use crate::upstream::AssetCatalog;

pub use asset::AssetPriceState;
pub use session::{SessionPhase, SubscriberHandle, TeamSession};

/// team id -> live session.
///
/// Every membership change for a team happens under that team's map shard
/// lock, and session internals are locked after it (shard, then session).
/// So "last subscriber leaves" and "next subscriber arrives" are serialized:
/// a subscriber either joins a live session or creates a new one, never
/// one that is being torn down.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<TeamSession>>,
    catalog: Arc<dyn AssetCatalog>,
    prices: Arc<dyn PriceStore>,
    tick: Duration,
}

impl SessionRegistry {
    pub fn new(catalog: Arc<dyn AssetCatalog>, prices: Arc<dyn PriceStore>, tick: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            catalog,
            prices,
            tick,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    /// Join the team's session, creating it (catalog fetch + loop start)
    /// when there is none.
    ///
    /// The catalog is called with no lock held. If two first subscribers
    /// race, both may fetch, but only the first insert wins; the loser's
    /// session is dropped before its loop ever starts.
    pub async fn subscribe(
        &self,
        team_id: &str,
        handle: SubscriberHandle,
        user_id: &str,
    ) -> MarketResult<Arc<TeamSession>> {
        if let Some(existing) = self.sessions.get(team_id) {
            existing.add_subscriber(handle, user_id);
            debug!(team = %team_id, user = %user_id, "joined live session");
            return Ok(existing.clone());
        }

        let rows = self.catalog.fetch_assets(team_id).await.map_err(|e| {
            warn!(team = %team_id, "asset catalog fetch failed: {e:#}");
            MarketError::Upstream(format!("could not load assets for team {team_id}: {e:#}"))
        })?;
        let assets = asset::states_from_catalog(team_id, &rows);
        let fresh = Arc::new(TeamSession::new(team_id.to_string(), assets));

        let session = match self.sessions.entry(team_id.to_string()) {
            Entry::Occupied(o) => {
                debug!(team = %team_id, "session created concurrently, joining it");
                let s = o.get().clone();
                s.add_subscriber(handle, user_id);
                s
            }
            Entry::Vacant(v) => {
                fresh.add_subscriber(handle, user_id);
                fresh.start(self.prices.clone(), self.tick);
                v.insert(fresh.clone());
                info!(
                    team = %team_id,
                    assets = fresh.asset_count(),
                    tick_ms = self.tick.as_millis() as u64,
                    "market session created"
                );
                fresh
            }
        };

        Ok(session)
    }

    /// Remove a subscriber; tears the session down when it was the last one.
    /// Unknown team or subscriber is a no-op.
    pub fn unsubscribe(&self, team_id: &str, subscriber: Uuid) {
        let Entry::Occupied(o) = self.sessions.entry(team_id.to_string()) else {
            return;
        };

        let Some(remaining) = o.get().remove_subscriber(subscriber) else {
            return;
        };

        if remaining > 0 {
            debug!(team = %team_id, remaining, "subscriber left");
            return;
        }

        let session = o.remove();
        session.begin_drain();
        session.mark_destroyed();
        info!(team = %team_id, "last subscriber left, market session destroyed");
    }

    /// Queue notifications for the next tick. Dropped when the team has no
    /// live session (nobody to deliver to).
    pub fn enqueue_notifications(&self, team_id: &str, notifications: &[Notification]) {
        if notifications.is_empty() {
            return;
        }
        match self.sessions.get(team_id) {
            Some(s) => s.enqueue(notifications),
            None => debug!(
                team = %team_id,
                dropped = notifications.len(),
                "no live session, notifications dropped"
            ),
        }
    }

    /// One notification per subscribed user other than the actor.
    pub fn build_notifications_excluding(
        &self,
        team_id: &str,
        actor_user_id: &str,
        message: &str,
    ) -> Vec<Notification> {
        let Some(s) = self.sessions.get(team_id) else {
            return Vec::new();
        };
        s.subscribed_users()
            .into_iter()
            .filter(|u| u != actor_user_id)
            .map(|u| Notification::new(u, message))
            .collect()
    }

    pub fn session(&self, team_id: &str) -> Option<Arc<TeamSession>> {
        self.sessions.get(team_id).map(|s| s.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn subscriber_count(&self, team_id: &str) -> usize {
        self.sessions
            .get(team_id)
            .map(|s| s.subscriber_count())
            .unwrap_or(0)
    }

    /// Cancel every session and wait for all loops to exit.
    pub async fn shutdown(&self) {
        let teams: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();

        let mut drained = Vec::with_capacity(teams.len());
        for team in teams {
            if let Some((_, s)) = self.sessions.remove(&team) {
                s.begin_drain();
                s.mark_destroyed();
                drained.push(s);
            }
        }

        let n = drained.len();
        for s in drained {
            s.stopped().await;
        }
        info!(sessions = n, "all market sessions stopped");
    }
}
