//! HTTP collaborators: asset catalog, membership service, portfolio service.

pub mod catalog;
pub mod membership;
pub mod portfolio;

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::types::{CatalogAsset, Membership, PortfolioTrade};

pub use catalog::AssetCatalogClient;
pub use membership::MembershipClient;
pub use portfolio::PortfolioClient;

#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Tradable assets of a team with their last known prices.
    async fn fetch_assets(&self, team_id: &str) -> Result<Vec<CatalogAsset>>;
}

#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn fetch_members(&self, team_id: &str) -> Result<Vec<Membership>>;
}

#[async_trait]
pub trait PortfolioSink: Send + Sync {
    async fn notify_trade(&self, trade: &PortfolioTrade) -> Result<()>;
}

pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("building http client")
}

/// Join a configured base URL and an absolute path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Append `segments` and a caller-supplied `id` to the base URL's path.
/// Each piece is percent-encoded as a single segment.
pub(crate) fn endpoint_for(base_url: &str, segments: &[&str], id: &str) -> Result<String> {
    if matches!(id, "" | "." | "..") {
        bail!("invalid path segment {id:?}");
    }
    let mut url = Url::parse(base_url).with_context(|| format!("parsing base url {base_url}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("{base_url} cannot be a base url"))?
        .pop_if_empty()
        .extend(segments)
        .push(id);
    Ok(url.to_string())
}

/// GET + status check + JSON decode.
pub(crate) async fn get_json<T: DeserializeOwned>(http: &Client, url: &str) -> Result<T> {
    let resp = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    let body = resp.text().await.with_context(|| format!("reading body of {url}"))?;
    if !status.is_success() {
        bail!("GET {url} returned HTTP {status}: {body}");
    }
    serde_json::from_str(&body).with_context(|| format!("decoding response of {url}"))
}
