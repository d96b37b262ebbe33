//! Persistence seams.
//!
//! Both traits are implemented by `memory::MemoryStore` (in-process) and
//! `postgres::PgStore` (sqlx). Errors are plain `anyhow` errors; callers decide
//! whether a failure is fatal (trades) or skippable (price ticks).

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::TradeSide;

/// Price history + current price of one team asset.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn append_observation(&self, team_asset_id: i64, price: f64) -> Result<()>;
    async fn update_current_price(&self, team_asset_id: i64, price: f64) -> Result<()>;
}

/// Movement + transaction pair, written as one unit.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Either both rows become visible or neither does.
    async fn record_trade(&self, trade: &NewTrade) -> Result<RecordedTrade>;
}

/// A validated trade, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub team_id: Uuid,
    pub asset_id: Uuid,
    pub user_id: Uuid,
    pub quantity: f64,
    pub side: TradeSide,
    // Unsigned; the store applies `side.signed_price`.
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl NewTrade {
    pub fn transaction_price(&self) -> f64 {
        self.side.signed_price(self.price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrade {
    pub movement_id: i64,
    pub movement_public_id: Uuid,
    pub transaction_id: i64,
    pub transaction_public_id: Uuid,
    pub transaction_price: f64,
    pub is_buy: bool,
}
