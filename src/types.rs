use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Volatility used when an asset reports none (keeps prices moving).
pub const MIN_VOLATILITY: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn is_buy(self) -> bool {
        matches!(self, TradeSide::Buy)
    }

    /// Cash-flow convention: buys are stored as outflows, sells as inflows.
    pub fn signed_price(self, price: f64) -> f64 {
        match self {
            TradeSide::Buy => -price,
            TradeSide::Sell => price,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            TradeSide::Buy => "bought",
            TradeSide::Sell => "sold",
        }
    }
}

/// Immutable simulation parameters for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDescriptor {
    pub symbol: String,
    pub name: String,
    pub base_price: f64,
    pub volatility: f64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

fn positive(v: f64) -> Option<f64> {
    (v > 0.0).then_some(v)
}

/// Registry key for a client-supplied id: trimmed, and in canonical
/// lowercase hyphenated form when it is a UUID.
pub fn canonical_id(raw: &str) -> String {
    let v = raw.trim();
    match Uuid::parse_str(v) {
        Ok(id) => id.to_string(),
        Err(_) => v.to_string(),
    }
}

/// Nullable catalog columns arrive as `null`; read them like a missing key.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Asset definition as the catalog service reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogAssetInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub asset_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub asset_symbol: String,
    #[serde(deserialize_with = "null_as_default")]
    pub asset_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub asset_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub base_price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub volatility: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub drift: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub max_price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub min_price: f64,
}

/// One row of `GET /team-assets/team/{teamId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogAsset {
    #[serde(deserialize_with = "null_as_default")]
    pub team_asset_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub public_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub team_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub asset_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub current_price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub asset: CatalogAssetInfo,
}

impl CatalogAsset {
    /// Catalog reports unset bounds as zero.
    pub fn descriptor(&self) -> AssetDescriptor {
        AssetDescriptor {
            symbol: self.asset.asset_symbol.clone(),
            name: self.asset.asset_name.clone(),
            base_price: self.asset.base_price,
            volatility: self.asset.volatility,
            min_price: positive(self.asset.min_price),
            max_price: positive(self.asset.max_price),
        }
    }

    /// Last known price, falling back to the base price.
    pub fn initial_price(&self) -> Option<f64> {
        positive(self.current_price).or_else(|| positive(self.asset.base_price))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(alias = "userid")]
    pub user_id: String,
    #[serde(alias = "teamid", alias = "courseId", default)]
    pub team_id: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub message: String,
}

impl Notification {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub base_price: f64,
    pub volatility: f64,
}

/// One tick as seen by one subscriber: shared quotes plus that
/// subscriber's own notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub timestamp_millis: i64,
    pub assets: Arc<[AssetQuote]>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub team_id: String,
    pub asset_id: String,
    pub user_id: String,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResult {
    pub movement_public_id: String,
    pub transaction_public_id: String,
    pub transaction_price: f64,
    pub quantity: f64,
    pub notifications: Vec<Notification>,
    pub team_id: String,
}

/// Body of `POST /api/portfolio/transaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTrade {
    pub user_id: String,
    pub asset_id: String,
    pub team_id: String,
    pub quantity: f64,
    pub price: f64,
    pub is_buy: bool,
}
