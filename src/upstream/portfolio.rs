use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{PortfolioSink, endpoint};
use crate::types::PortfolioTrade;

const PORTFOLIO_TRANSACTION: &str = "/api/portfolio/transaction";

#[derive(Debug, Clone)]
pub struct PortfolioClient {
    http: Client,
    base_url: String,
}

impl PortfolioClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn transaction_url(&self) -> String {
        endpoint(&self.base_url, PORTFOLIO_TRANSACTION)
    }
}

#[async_trait]
impl PortfolioSink for PortfolioClient {
    async fn notify_trade(&self, trade: &PortfolioTrade) -> Result<()> {
        let url = self.transaction_url();
        let resp = self
            .http
            .post(&url)
            .json(trade)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            bail!("portfolio service returned HTTP {status}: {body}");
        }

        debug!(user = %trade.user_id, is_buy = trade.is_buy, "portfolio service updated");
        Ok(())
    }
}
