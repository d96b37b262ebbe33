//! Transport-agnostic market RPCs: one streaming call, two unary calls.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{MarketError, MarketResult};
use crate::exec::TradeProcessor;
use crate::state::{SessionRegistry, SubscriberHandle};
use crate::types::{MarketSnapshot, TradeRequest, TradeResult, TradeSide, canonical_id};

pub struct MarketService {
    registry: Arc<SessionRegistry>,
    trades: TradeProcessor,
    subscriber_buffer: usize,
}

impl MarketService {
    pub fn new(registry: Arc<SessionRegistry>, trades: TradeProcessor, subscriber_buffer: usize) -> Self {
        Self {
            registry,
            trades,
            subscriber_buffer,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Subscribe to a team's market. Snapshots arrive once per tick until the
    /// returned stream is closed or dropped.
    pub async fn check_market(&self, team_id: &str, user_id: &str) -> MarketResult<MarketStream> {
        let team_id = canonical_id(team_id);
        let user_id = canonical_id(user_id);
        if team_id.is_empty() {
            return Err(MarketError::validation("teamId is required"));
        }
        if user_id.is_empty() {
            return Err(MarketError::validation("userId is required"));
        }

        let (handle, rx) = SubscriberHandle::channel(self.subscriber_buffer);
        let subscriber_id = handle.id();
        self.registry.subscribe(&team_id, handle, &user_id).await?;

        info!(team = %team_id, user = %user_id, subscriber = %subscriber_id, "market stream opened");

        Ok(MarketStream {
            rx,
            registry: self.registry.clone(),
            team_id,
            subscriber_id,
            closed: false,
        })
    }

    pub async fn buy_asset(&self, req: &TradeRequest) -> MarketResult<TradeResult> {
        self.trades.record_trade(TradeSide::Buy, req).await
    }

    pub async fn sell_asset(&self, req: &TradeRequest) -> MarketResult<TradeResult> {
        self.trades.record_trade(TradeSide::Sell, req).await
    }
}

/// Receiving end of a `check_market` subscription.
pub struct MarketStream {
    rx: mpsc::Receiver<MarketSnapshot>,
    registry: Arc<SessionRegistry>,
    team_id: String,
    subscriber_id: Uuid,
    closed: bool,
}

impl MarketStream {
    /// None once the session is gone (last subscriber left elsewhere, or
    /// shutdown) or after `close`.
    pub async fn next(&mut self) -> Option<MarketSnapshot> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn subscriber_id(&self) -> Uuid {
        self.subscriber_id
    }

    /// Leave the session. Idempotent; also done on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rx.close();
        self.registry.unsubscribe(&self.team_id, self.subscriber_id);
        debug!(team = %self.team_id, subscriber = %self.subscriber_id, "market stream closed");
    }
}

impl fmt::Debug for MarketStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketStream")
            .field("team_id", &self.team_id)
            .field("subscriber_id", &self.subscriber_id)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for MarketStream {
    fn drop(&mut self) {
        self.close();
    }
}
