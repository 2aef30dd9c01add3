//! Portfolio summary domain models.

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::positions_model::{NestedObject, PositionRecord};
use crate::errors::{Error, Result, ValidationError};
use crate::patch::Patch;

/// Aggregate view of one portfolio, as held by the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_value: Option<Decimal>,
    #[serde(default)]
    pub purchase_sum: Option<Decimal>,
    #[serde(default)]
    pub position_count: Option<i64>,
    #[serde(default)]
    pub missing_value_positions: Option<i64>,
    #[serde(default)]
    pub has_current_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<NestedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_run_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Positions embedded by providers that push them alongside the summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<PositionRecord>>,
    /// Provider keys without a dedicated field, kept so updates stay lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A possibly partial portfolio summary as received from the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummaryUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub uuid: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub current_value: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub purchase_sum: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub position_count: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub missing_value_positions: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub has_current_value: Patch<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Value>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub coverage_ratio: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub provenance: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub metric_run_uuid: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub generated_at: Patch<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PortfolioSummaryUpdate {
    /// Parses one raw record of a `portfolio_values` push.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid
            .as_value()
            .map(String::as_str)
            .filter(|uuid| !uuid.is_empty())
    }

    /// A summary is only admitted when it carries its identity.
    pub fn validate(&self) -> Result<()> {
        if self.uuid().is_none() {
            return Err(Error::Validation(ValidationError::MissingField(
                "uuid".to_string(),
            )));
        }
        Ok(())
    }
}

/// Parses a `portfolio_values` push, dropping records that do not
/// deserialize. Identity is checked when the summaries are merged.
pub fn parse_summary_updates(values: Vec<Value>) -> Vec<PortfolioSummaryUpdate> {
    values
        .into_iter()
        .filter_map(|value| match PortfolioSummaryUpdate::from_value(value) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!("Dropping unparseable portfolio summary: {}", e);
                None
            }
        })
        .collect()
}
