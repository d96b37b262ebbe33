use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FanoutPolicy;
use crate::errors::{MarketError, MarketResult};
use crate::exec::notify::{alert_message, forward_to_portfolio, members_excluding};
use crate::state::SessionRegistry;
use crate::store::{NewTrade, TradeStore};
use crate::types::{Notification, PortfolioTrade, TradeRequest, TradeResult, TradeSide};
use crate::upstream::{MembershipDirectory, PortfolioSink};

pub struct TradeProcessor {
    store: Arc<dyn TradeStore>,
    registry: Arc<SessionRegistry>,
    portfolio: Arc<dyn PortfolioSink>,
    members: Arc<dyn MembershipDirectory>,
    policy: FanoutPolicy,
}

impl TradeProcessor {
    pub fn new(
        store: Arc<dyn TradeStore>,
        registry: Arc<SessionRegistry>,
        portfolio: Arc<dyn PortfolioSink>,
        members: Arc<dyn MembershipDirectory>,
        policy: FanoutPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            portfolio,
            members,
            policy,
        }
    }

    pub fn policy(&self) -> FanoutPolicy {
        self.policy
    }

    /// Validate, commit, alert, forward.
    ///
    /// Nothing is enqueued or forwarded unless the commit succeeded.
    pub async fn record_trade(&self, side: TradeSide, req: &TradeRequest) -> MarketResult<TradeResult> {
        let trade = validate(side, req, Utc::now())?;

        let recorded = self.store.record_trade(&trade).await.map_err(|e| {
            warn!(
                team = %req.team_id,
                asset = %req.asset_id,
                user = %req.user_id,
                side = side.as_str(),
                "trade commit failed: {e:#}"
            );
            MarketError::Persistence(e)
        })?;

        info!(
            team = %req.team_id,
            asset = %req.asset_id,
            user = %req.user_id,
            side = side.as_str(),
            quantity = req.quantity,
            price = recorded.transaction_price,
            movement = %recorded.movement_public_id,
            "trade recorded"
        );

        // Same keys `check_market` subscribes under.
        let team_id = trade.team_id.to_string();
        let user_id = trade.user_id.to_string();
        let asset_id = trade.asset_id.to_string();

        let message = alert_message(side, &user_id, &asset_id);
        let notifications = self.recipients(&team_id, &user_id, &message).await;
        self.registry.enqueue_notifications(&team_id, &notifications);

        forward_to_portfolio(
            self.portfolio.clone(),
            PortfolioTrade {
                user_id,
                asset_id,
                team_id: team_id.clone(),
                quantity: req.quantity,
                price: req.price,
                is_buy: side.is_buy(),
            },
        );

        Ok(TradeResult {
            movement_public_id: recorded.movement_public_id.to_string(),
            transaction_public_id: recorded.transaction_public_id.to_string(),
            transaction_price: recorded.transaction_price,
            quantity: req.quantity,
            notifications,
            team_id,
        })
    }

    async fn recipients(&self, team_id: &str, actor: &str, message: &str) -> Vec<Notification> {
        match self.policy {
            FanoutPolicy::LiveSubscribers => {
                self.registry.build_notifications_excluding(team_id, actor, message)
            }
            FanoutPolicy::GroupMembers => match self.members.fetch_members(team_id).await {
                Ok(members) => members_excluding(&members, actor, message),
                Err(e) => {
                    warn!(team = %team_id, "membership fetch failed, no alerts sent: {e:#}");
                    Vec::new()
                }
            },
        }
    }
}

fn parse_id(field: &str, value: &str) -> MarketResult<Uuid> {
    let v = value.trim();
    if v.is_empty() {
        return Err(MarketError::validation(format!("{field} is required")));
    }
    Uuid::parse_str(v).map_err(|_| MarketError::validation(format!("{field} is not a valid id: {value:?}")))
}

fn positive(field: &str, v: f64) -> MarketResult<f64> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(MarketError::validation(format!("{field} must be greater than zero")))
    }
}

/// Check a request and turn it into a store-ready trade. No side effects.
pub fn validate(side: TradeSide, req: &TradeRequest, now: DateTime<Utc>) -> MarketResult<NewTrade> {
    Ok(NewTrade {
        team_id: parse_id("teamId", &req.team_id)?,
        asset_id: parse_id("assetId", &req.asset_id)?,
        user_id: parse_id("userId", &req.user_id)?,
        quantity: positive("quantity", req.quantity)?,
        side,
        price: positive("price", req.price)?,
        created_at: now,
    })
}
