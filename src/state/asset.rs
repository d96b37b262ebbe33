use tracing::warn;

use crate::engine::price::next_price;
use crate::types::{AssetDescriptor, AssetQuote, CatalogAsset};

/// Live simulation state of one asset inside one team session.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPriceState {
    pub descriptor: AssetDescriptor,
    // Storage-side row id, used for persistence only.
    pub team_asset_id: i64,
    // Id exposed to clients.
    pub public_id: String,
    pub current_price: f64,
}

impl AssetPriceState {
    /// None when the catalog gives neither a current nor a base price.
    pub fn from_catalog(row: &CatalogAsset) -> Option<Self> {
        let current_price = row.initial_price()?;
        Some(Self {
            descriptor: row.descriptor(),
            team_asset_id: row.team_asset_id,
            public_id: row.asset_id.clone(),
            current_price,
        })
    }

    pub fn advance(&mut self) -> f64 {
        self.current_price = next_price(self.current_price, &self.descriptor);
        self.current_price
    }

    pub fn quote(&self) -> AssetQuote {
        AssetQuote {
            id: self.public_id.clone(),
            symbol: self.descriptor.symbol.clone(),
            name: self.descriptor.name.clone(),
            price: self.current_price,
            base_price: self.descriptor.base_price,
            volatility: self.descriptor.volatility,
        }
    }
}

/// Build the initial state list for a team, skipping unpriceable rows.
pub fn states_from_catalog(team_id: &str, rows: &[CatalogAsset]) -> Vec<AssetPriceState> {
    rows.iter()
        .filter_map(|row| {
            let state = AssetPriceState::from_catalog(row);
            if state.is_none() {
                warn!(
                    team = %team_id,
                    team_asset_id = row.team_asset_id,
                    symbol = %row.asset.asset_symbol,
                    "asset has no positive price, skipping"
                );
            }
            state
        })
        .collect()
}
