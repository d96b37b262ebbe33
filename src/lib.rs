pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod gateway;
pub mod service;
pub mod state;
pub mod store;
pub mod types;
pub mod upstream;

pub use config::{Config, FanoutPolicy};
pub use errors::{MarketError, MarketResult};
pub use service::{MarketService, MarketStream};
pub use state::SessionRegistry;
