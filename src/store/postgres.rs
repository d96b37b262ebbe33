//! PostgreSQL store.
//!
//! Tables: movements, transactions, historicalprices, teamassets.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::{NewTrade, PriceStore, RecordedTrade, TradeStore};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(1)
            .max_lifetime(Duration::from_secs(3600))
            .connect(url)
            .await
            .context("connecting to market database")?;
        info!("market database pool ready");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PriceStore for PgStore {
    async fn append_observation(&self, team_asset_id: i64, price: f64) -> Result<()> {
        sqlx::query("INSERT INTO historicalprices (price, teamassetid) VALUES ($1, $2)")
            .bind(price)
            .bind(team_asset_id)
            .execute(&self.pool)
            .await
            .context("insert historicalprices")?;
        Ok(())
    }

    async fn update_current_price(&self, team_asset_id: i64, price: f64) -> Result<()> {
        sqlx::query("UPDATE teamassets SET currentprice = $1 WHERE teamassetid = $2")
            .bind(price)
            .bind(team_asset_id)
            .execute(&self.pool)
            .await
            .context("update teamassets.currentprice")?;
        Ok(())
    }
}

#[async_trait]
impl TradeStore for PgStore {
    async fn record_trade(&self, trade: &NewTrade) -> Result<RecordedTrade> {
        let created = trade.created_at.naive_utc();
        let transaction_price = trade.transaction_price();
        let is_buy = trade.side.is_buy();

        // Dropping `tx` without commit rolls back.
        let mut tx = self.pool.begin().await.context("begin trade transaction")?;

        let mov = sqlx::query(
            r"
            INSERT INTO movements (userid, assetid, teamid, quantity, createddate)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING movementid, publicid
            ",
        )
        .bind(trade.user_id)
        .bind(trade.asset_id)
        .bind(trade.team_id)
        .bind(trade.quantity)
        .bind(created)
        .fetch_one(&mut *tx)
        .await
        .context("insert movement")?;

        let movement_id: i32 = mov.try_get("movementid")?;
        let movement_public_id: Uuid = mov.try_get("publicid")?;

        let trx = sqlx::query(
            r"
            INSERT INTO transactions (movementid, transactionprice, isbuy, createddate)
            VALUES ($1, $2, $3, $4)
            RETURNING transactionid, publicid
            ",
        )
        .bind(movement_id)
        .bind(transaction_price)
        .bind(is_buy)
        .bind(created)
        .fetch_one(&mut *tx)
        .await
        .context("insert transaction")?;

        let transaction_id: i32 = trx.try_get("transactionid")?;
        let transaction_public_id: Uuid = trx.try_get("publicid")?;

        tx.commit().await.context("commit trade transaction")?;

        debug!(movement_id, transaction_id, is_buy, "trade committed");

        Ok(RecordedTrade {
            movement_id: movement_id.into(),
            movement_public_id,
            transaction_id: transaction_id.into(),
            transaction_public_id,
            transaction_price,
            is_buy,
        })
    }
}
