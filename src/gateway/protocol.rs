use serde::{Deserialize, Serialize};

use crate::errors::MarketError;
use crate::types::{MarketSnapshot, TradeRequest, TradeResult};

/// Client -> server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    CheckMarket { team_id: String, user_id: String },
    BuyAsset(TradeRequest),
    SellAsset(TradeRequest),
}

impl ClientRequest {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Server -> client frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Snapshot(MarketSnapshot),
    TradeResult(TradeResult),
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_request(e: &serde_json::Error) -> Self {
        Self::error("invalid_argument", format!("malformed request: {e}"))
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&MarketError> for ServerMessage {
    fn from(e: &MarketError) -> Self {
        Self::error(e.code(), e.to_string())
    }
}
