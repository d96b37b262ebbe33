use std::env;
use std::time::Duration;

pub const DEFAULT_TICK_SECS: u64 = 4;

/// Who receives the alert produced by a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutPolicy {
    /// Every viewer currently streaming the team's market, except the actor.
    LiveSubscribers,
    /// Every team member known to the membership service, except the actor.
    GroupMembers,
}

impl FanoutPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subscribers" | "live" => Some(FanoutPolicy::LiveSubscribers),
            "members" | "membership" => Some(FanoutPolicy::GroupMembers),
            _ => None,
        }
    }
}

/// Service settings. Everything has a usable default except the upstream
/// URLs, which are empty until configured.
#[derive(Debug, Clone)]
pub struct Config {
    // Address the websocket gateway binds to.
    pub listen_addr: String,

    // Upstream services.
    pub asset_service_url: String,
    pub course_service_url: String,
    pub portfolio_service_url: String,
    pub http_timeout_ms: u64,

    // How often every live session advances prices and broadcasts.
    pub tick_secs: u64,

    // None => in-memory store (nothing survives a restart).
    pub database_url: Option<String>,

    // Per-subscriber queue depth; a viewer this far behind misses ticks.
    pub subscriber_buffer: usize,

    pub fanout: FanoutPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),

            asset_service_url: String::new(),
            course_service_url: String::new(),
            portfolio_service_url: String::new(),
            http_timeout_ms: 5_000,

            tick_secs: DEFAULT_TICK_SECS,

            database_url: None,

            subscriber_buffer: 32,

            fanout: FanoutPolicy::LiveSubscribers,
        }
    }
}

impl Config {
    /// Read settings from the process environment (call `dotenv()` first if
    /// a `.env` file should be honoured).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let d = Self::default();

        let tick_secs = get("TICK_INTERVAL_SECONDS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(|v| v as u64)
            .unwrap_or(DEFAULT_TICK_SECS);

        let fanout = match get("FANOUT_POLICY") {
            Some(v) => FanoutPolicy::parse(&v).unwrap_or_else(|| {
                tracing::warn!(value = %v, "unknown FANOUT_POLICY, using live subscribers");
                d.fanout
            }),
            None => d.fanout,
        };

        Self {
            listen_addr: get("LISTEN_ADDR")
                .or_else(|| get("PORT").map(|p| listen_on_port(&p)))
                .unwrap_or(d.listen_addr),
            asset_service_url: get("ASSET_SERVICE_URL").unwrap_or(d.asset_service_url),
            course_service_url: get("COURSE_SERVICE_URL").unwrap_or(d.course_service_url),
            portfolio_service_url: get("PORTFOLIO_SERVICE_URL").unwrap_or(d.portfolio_service_url),
            http_timeout_ms: get("HTTP_TIMEOUT_MS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(d.http_timeout_ms),
            tick_secs,
            database_url: get("MARKET_DATABASE_URL"),
            subscriber_buffer: get("SUBSCRIBER_BUFFER")
                .and_then(|v| v.trim().parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(d.subscriber_buffer),
            fanout,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// `PORT` may be given as `50051` or `:50051`.
fn listen_on_port(port: &str) -> String {
    let port = port.trim();
    let port = port.strip_prefix(':').unwrap_or(port);
    format!("0.0.0.0:{port}")
}
