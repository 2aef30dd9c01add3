//! Position domain models.

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result, ValidationError};
use crate::patch::Patch;

/// Nested provider object (average cost, performance, aggregation, data state).
pub type NestedObject = Map<String, Value>;

/// One holding of a security inside one portfolio, as held by the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub security_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    pub current_holdings: Decimal,
    pub purchase_value: Decimal,
    pub current_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<NestedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<NestedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<NestedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_state: Option<NestedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_run_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Set by the backend when no FX rate was available to value the position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx_unavailable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price_native: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price_eur: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_close_native: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_close_eur: Option<Decimal>,
}

/// A possibly partial position as received from the provider.
///
/// Scalar fields are tri-state. Nested objects are only merged when the
/// provider sends an object; `null` or any other shape keeps what is cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub security_uuid: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub portfolio_uuid: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub currency_code: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub current_holdings: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub purchase_value: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub current_value: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub coverage_ratio: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub provenance: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub metric_run_uuid: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub generated_at: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub fx_unavailable: Patch<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub last_price_native: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub last_price_eur: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub last_close_native: Patch<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub last_close_eur: Patch<Decimal>,
}

impl PositionUpdate {
    /// Parses one raw record of a positions push.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the security identifier if one was sent.
    pub fn security_uuid(&self) -> Option<&str> {
        self.security_uuid
            .as_value()
            .map(String::as_str)
            .filter(|uuid| !uuid.is_empty())
    }

    /// Validates that the record can be admitted to the cache.
    ///
    /// A position needs its identity and the three required numerics.
    /// A record failing this check is never partially admitted.
    pub fn validate(&self) -> Result<()> {
        if self.security_uuid().is_none() {
            return Err(missing("securityUuid"));
        }
        if self.current_holdings.as_value().is_none() {
            return Err(missing("currentHoldings"));
        }
        if self.purchase_value.as_value().is_none() {
            return Err(missing("purchaseValue"));
        }
        if self.current_value.as_value().is_none() {
            return Err(missing("currentValue"));
        }
        Ok(())
    }
}

fn missing(field: &str) -> Error {
    Error::Validation(ValidationError::MissingField(field.to_string()))
}

/// Parses a batch of raw position records, dropping the ones that do not
/// deserialize. Validation of required fields happens on admission.
pub fn parse_position_updates(values: Vec<Value>) -> Vec<PositionUpdate> {
    values
        .into_iter()
        .filter_map(|value| match PositionUpdate::from_value(value) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!("Dropping unparseable position record: {}", e);
                None
            }
        })
        .collect()
}
