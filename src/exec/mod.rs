//! Trade execution: validation, the all-or-nothing commit, and everything
//! that happens after it (alerts, portfolio forward).

pub mod notify;
pub mod trade;

pub use trade::TradeProcessor;
