use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use std::sync::Arc;

use team_market::config::Config;
use team_market::exec::TradeProcessor;
use team_market::gateway;
use team_market::service::MarketService;
use team_market::state::SessionRegistry;
use team_market::store::memory::MemoryStore;
use team_market::store::postgres::PgStore;
use team_market::store::{PriceStore, TradeStore};
use team_market::upstream::{self, AssetCatalogClient, MembershipClient, PortfolioClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Set RUST_LOG=info (or debug) to see output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Config::from_env();
    info!(
        listen = %cfg.listen_addr,
        tick_secs = cfg.tick_secs,
        fanout = ?cfg.fanout,
        "starting market service"
    );

    let http = upstream::http_client(cfg.http_timeout())?;
    let catalog = Arc::new(AssetCatalogClient::new(http.clone(), cfg.asset_service_url.clone()));
    let members = Arc::new(MembershipClient::new(http.clone(), cfg.course_service_url.clone()));
    let portfolio = Arc::new(PortfolioClient::new(http, cfg.portfolio_service_url.clone()));

    let (prices, trades): (Arc<dyn PriceStore>, Arc<dyn TradeStore>) = match &cfg.database_url {
        Some(url) => {
            let pg = Arc::new(PgStore::connect(url).await?);
            (pg.clone() as Arc<dyn PriceStore>, pg as Arc<dyn TradeStore>)
        }
        None => {
            warn!("MARKET_DATABASE_URL not set, using in-memory store");
            let mem = Arc::new(MemoryStore::new());
            (mem.clone() as Arc<dyn PriceStore>, mem as Arc<dyn TradeStore>)
        }
    };

    let registry = Arc::new(SessionRegistry::new(catalog, prices, cfg.tick_interval()));
    let processor = TradeProcessor::new(trades, registry.clone(), portfolio, members, cfg.fanout);
    let service = Arc::new(MarketService::new(registry.clone(), processor, cfg.subscriber_buffer));

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;

    tokio::select! {
        res = gateway::serve(listener, service) => {
            if let Err(e) = res {
                error!("gateway stopped: {e:#}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    registry.shutdown().await;
    Ok(())
}
