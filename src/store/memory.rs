use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{NewTrade, PriceStore, RecordedTrade, TradeStore};

#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub movement_id: i64,
    pub public_id: Uuid,
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub team_id: Uuid,
    pub quantity: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_id: i64,
    pub public_id: Uuid,
    pub movement_id: i64,
    pub transaction_price: f64,
    pub is_buy: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub team_asset_id: i64,
    pub price: f64,
}

#[derive(Debug, Default)]
struct Tables {
    movements: Vec<Movement>,
    transactions: Vec<Transaction>,
    observations: Vec<PriceObservation>,
    current_prices: HashMap<i64, f64>,
    next_movement_id: i64,
    next_transaction_id: i64,
}

/// In-process store. Used when no database is configured and in tests.
///
/// One mutex covers every table, so a trade is staged and committed while
/// holding it: readers never see a movement without its transaction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // Tables are only mutated after staging, so a poisoned lock is still consistent.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn movements(&self) -> Vec<Movement> {
        self.lock().movements.clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    pub fn observations(&self) -> Vec<PriceObservation> {
        self.lock().observations.clone()
    }

    pub fn observation_count(&self) -> usize {
        self.lock().observations.len()
    }

    pub fn current_price(&self, team_asset_id: i64) -> Option<f64> {
        self.lock().current_prices.get(&team_asset_id).copied()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn append_observation(&self, team_asset_id: i64, price: f64) -> Result<()> {
        self.lock().observations.push(PriceObservation { team_asset_id, price });
        Ok(())
    }

    async fn update_current_price(&self, team_asset_id: i64, price: f64) -> Result<()> {
        self.lock().current_prices.insert(team_asset_id, price);
        Ok(())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn record_trade(&self, trade: &NewTrade) -> Result<RecordedTrade> {
        if trade.quantity <= 0.0 || trade.price <= 0.0 || trade.quantity.is_nan() || trade.price.is_nan() {
            return Err(anyhow!(
                "refusing trade with quantity={} price={}",
                trade.quantity,
                trade.price
            ));
        }

        let mut t = self.lock();

        // Stage both rows before touching the tables.
        let movement = Movement {
            movement_id: t.next_movement_id + 1,
            public_id: Uuid::new_v4(),
            user_id: trade.user_id,
            asset_id: trade.asset_id,
            team_id: trade.team_id,
            quantity: trade.quantity,
            created_at: trade.created_at,
        };
        let transaction = Transaction {
            transaction_id: t.next_transaction_id + 1,
            public_id: Uuid::new_v4(),
            movement_id: movement.movement_id,
            transaction_price: trade.transaction_price(),
            is_buy: trade.side.is_buy(),
            created_at: trade.created_at,
        };

        let recorded = RecordedTrade {
            movement_id: movement.movement_id,
            movement_public_id: movement.public_id,
            transaction_id: transaction.transaction_id,
            transaction_public_id: transaction.public_id,
            transaction_price: transaction.transaction_price,
            is_buy: transaction.is_buy,
        };

        t.next_movement_id = movement.movement_id;
        t.next_transaction_id = transaction.transaction_id;
        t.movements.push(movement);
        t.transactions.push(transaction);

        Ok(recorded)
    }
}
