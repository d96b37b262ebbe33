use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::TeamSession;
use crate::store::PriceStore;
use crate::types::{AssetQuote, MarketSnapshot, Notification};

/// What one tick did. Mostly for tests and debug logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub persisted: usize,
    pub failed: usize,
    pub delivered: usize,
}

/// Broadcast loop of one team session. Runs until `cancel` flips to true
/// (or its sender is dropped).
pub async fn run_session(
    session: Arc<TeamSession>,
    store: Arc<dyn PriceStore>,
    tick: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut interval = time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(team = %session.team_id, tick_ms = tick.as_millis() as u64, "broadcast loop started");

    loop {
        if *cancel.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let report = tick_once(&session, store.as_ref()).await;
                debug!(
                    team = %session.team_id,
                    persisted = report.persisted,
                    failed = report.failed,
                    delivered = report.delivered,
                    "tick"
                );
            }
        }
    }

    info!(team = %session.team_id, "broadcast loop stopped");
}

/// Advance every asset once, persist, then send one snapshot per subscriber.
pub async fn tick_once(session: &TeamSession, store: &dyn PriceStore) -> TickReport {
    let mut report = TickReport::default();

    // Prices move once per tick, shared by every viewer.
    let (moved, quotes): (Vec<(i64, f64)>, Vec<AssetQuote>) = session.with_assets(|assets| {
        assets
            .iter_mut()
            .map(|a| {
                let price = a.advance();
                ((a.team_asset_id, price), a.quote())
            })
            .unzip()
    });
    let quotes: Arc<[AssetQuote]> = quotes.into();

    for (team_asset_id, price) in moved {
        if session.is_cancelled() {
            return report;
        }
        match persist(store, team_asset_id, price).await {
            Ok(()) => report.persisted += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    team = %session.team_id,
                    team_asset_id,
                    price,
                    "price persist failed: {e:#}"
                );
            }
        }
    }

    if session.is_cancelled() {
        return report;
    }

    let (pending, subscribers) = session.take_broadcast();
    let timestamp_millis = Utc::now().timestamp_millis();

    for (handle, user_id) in subscribers {
        let snapshot = MarketSnapshot {
            timestamp_millis,
            assets: quotes.clone(),
            notifications: addressed_to(&pending, &user_id),
        };
        if handle.deliver(snapshot) {
            report.delivered += 1;
        } else {
            debug!(team = %session.team_id, subscriber = %handle.id(), "snapshot dropped");
        }
    }

    report
}

async fn persist(store: &dyn PriceStore, team_asset_id: i64, price: f64) -> anyhow::Result<()> {
    store.append_observation(team_asset_id, price).await?;
    store.update_current_price(team_asset_id, price).await
}

fn addressed_to(pending: &[Notification], user_id: &str) -> Vec<Notification> {
    pending
        .iter()
        .filter(|n| n.user_id == user_id)
        .cloned()
        .collect()
}
