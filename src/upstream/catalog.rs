use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use super::{AssetCatalog, endpoint_for, get_json};
use crate::types::CatalogAsset;

const TEAM_ASSETS: &[&str] = &["team-assets", "team"];

#[derive(Debug, Clone)]
pub struct AssetCatalogClient {
    http: Client,
    base_url: String,
}

impl AssetCatalogClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn team_assets_url(&self, team_id: &str) -> Result<String> {
        endpoint_for(&self.base_url, TEAM_ASSETS, team_id)
    }
}

#[async_trait]
impl AssetCatalog for AssetCatalogClient {
    async fn fetch_assets(&self, team_id: &str) -> Result<Vec<CatalogAsset>> {
        get_json(&self.http, &self.team_assets_url(team_id)?).await
    }
}
