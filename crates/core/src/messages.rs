//! Typed push messages delivered by the transport.
//!
//! Frames look like `{"type": "portfolio_positions", "data": {...}}`. Record
//! payloads are kept as raw JSON values so a single malformed record can be
//! dropped without rejecting the whole frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};

/// A push message from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushMessage {
    /// Full account list
    Accounts(Vec<Value>),
    /// Full portfolio summary list
    PortfolioValues(Vec<Value>),
    /// Positions of one portfolio, possibly one chunk of several
    PortfolioPositions(PositionsPush),
    /// Passed through to the host untouched
    LastFileUpdate(Value),
}

impl PushMessage {
    /// Parses a raw transport frame.
    pub fn from_json(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| Error::Message(e.to_string()))
    }
}

/// Payload of a `portfolio_positions` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionsPush {
    #[serde(alias = "portfolioUuid")]
    pub portfolio_uuid: String,
    #[serde(default)]
    pub positions: Vec<Value>,
    /// 1-based index of this chunk
    #[serde(default, alias = "chunkIndex", skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<Value>,
    #[serde(default, alias = "chunkCount", skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<Value>,
    /// Provider error sent instead of positions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PositionsPush {
    pub fn chunk_index(&self) -> Option<i64> {
        self.chunk_index.as_ref().and_then(as_chunk_number)
    }

    /// Returns the announced chunk count, `None` when absent or not an integer.
    pub fn chunk_count(&self) -> Option<i64> {
        self.chunk_count.as_ref().and_then(as_chunk_number)
    }

    /// Returns the provider error, ignoring blank strings.
    pub fn error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}

/// Accepts integers, integral floats and numeric strings.
fn as_chunk_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
