use std::collections::HashMap;
use std::time::Duration;

use team_market::config::{Config, FanoutPolicy};

fn from(vars: &[(&str, &str)]) -> Config {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    Config::from_lookup(|k| map.get(k).cloned())
}

#[test]
fn test_defaults() {
    let c = from(&[]);
    assert_eq!(c.listen_addr, "0.0.0.0:50051");
    assert_eq!(c.tick_interval(), Duration::from_secs(4));
    assert_eq!(c.http_timeout(), Duration::from_secs(5));
    assert_eq!(c.database_url, None);
    assert_eq!(c.subscriber_buffer, 32);
    assert_eq!(c.fanout, FanoutPolicy::LiveSubscribers);
}

#[test]
fn test_tick_interval_fallbacks() {
    for bad in ["0", "-3", "abc", "", "  "] {
        assert_eq!(from(&[("TICK_INTERVAL_SECONDS", bad)]).tick_secs, 4, "value {bad:?}");
    }
    assert_eq!(from(&[("TICK_INTERVAL_SECONDS", "10")]).tick_interval(), Duration::from_secs(10));
}

#[test]
fn test_reads_service_urls_and_database() {
    let c = from(&[
        ("ASSET_SERVICE_URL", "http://assets"),
        ("COURSE_SERVICE_URL", "http://course"),
        ("PORTFOLIO_SERVICE_URL", "http://portfolio"),
        ("MARKET_DATABASE_URL", "postgres://localhost/market"),
        ("SUBSCRIBER_BUFFER", "4"),
    ]);
    assert_eq!(c.asset_service_url, "http://assets");
    assert_eq!(c.course_service_url, "http://course");
    assert_eq!(c.portfolio_service_url, "http://portfolio");
    assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/market"));
    assert_eq!(c.subscriber_buffer, 4);
}

#[test]
fn test_fanout_policy() {
    assert_eq!(from(&[("FANOUT_POLICY", "members")]).fanout, FanoutPolicy::GroupMembers);
    assert_eq!(from(&[("FANOUT_POLICY", "Subscribers")]).fanout, FanoutPolicy::LiveSubscribers);
    assert_eq!(from(&[("FANOUT_POLICY", "everyone")]).fanout, FanoutPolicy::LiveSubscribers);
}
