use thiserror::Error;

/// Failures surfaced to callers of the market service.
///
/// Everything else (per-tick persistence, portfolio forwarding, delivery to a
/// single subscriber) is logged and swallowed where it happens.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("upstream dependency failed: {0}")]
    Upstream(String),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::Validation(msg.into())
    }

    pub fn is_client_fault(&self) -> bool {
        matches!(self, MarketError::Validation(_))
    }

    /// Wire status code, gRPC-style.
    pub fn code(&self) -> &'static str {
        if self.is_client_fault() {
            "invalid_argument"
        } else {
            "internal"
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
