use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::types::{Membership, Notification, PortfolioTrade, TradeSide};
use crate::upstream::PortfolioSink;

pub fn alert_message(side: TradeSide, user_id: &str, asset_id: &str) -> String {
    format!("user {user_id} {} asset {asset_id}", side.past_tense())
}

/// One notification per distinct member, skipping the actor.
pub fn members_excluding(members: &[Membership], actor_user_id: &str, message: &str) -> Vec<Notification> {
    let mut seen = HashSet::new();
    members
        .iter()
        .map(|m| m.user_id.as_str())
        .filter(|u| !u.is_empty() && *u != actor_user_id)
        .filter(|u| seen.insert(*u))
        .map(|u| Notification::new(u, message))
        .collect()
}

/// Fire-and-forget. The trade is already committed; a failed forward is
/// only logged.
pub fn forward_to_portfolio(sink: Arc<dyn PortfolioSink>, trade: PortfolioTrade) {
    tokio::spawn(async move {
        match sink.notify_trade(&trade).await {
            Ok(()) => debug!(user = %trade.user_id, asset = %trade.asset_id, "trade forwarded"),
            Err(e) => warn!(
                user = %trade.user_id,
                asset = %trade.asset_id,
                team = %trade.team_id,
                is_buy = trade.is_buy,
                "portfolio forward failed: {e:#}"
            ),
        }
    });
}
