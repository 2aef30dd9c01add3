//! Account domain models.

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result, ValidationError};

/// Domain model representing one cash account pushed by the backend.
///
/// Accounts have no merge semantics: every `accounts` push replaces the
/// whole list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub balance: Option<Decimal>,
    /// Balance converted to EUR, missing when no FX rate was available
    #[serde(default)]
    pub balance_eur: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_run_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountRecord {
    /// Parses and validates one raw record of an `accounts` push.
    pub fn from_value(value: Value) -> Result<Self> {
        let account: AccountRecord = serde_json::from_value(value)?;
        account.validate()?;
        Ok(account)
    }

    pub fn validate(&self) -> Result<()> {
        if self.uuid.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "uuid".to_string(),
            )));
        }
        Ok(())
    }
}

/// Parses an `accounts` push, dropping malformed records.
pub fn parse_accounts(values: Vec<Value>) -> Vec<AccountRecord> {
    values
        .into_iter()
        .filter_map(|value| match AccountRecord::from_value(value) {
            Ok(account) => Some(account),
            Err(e) => {
                warn!("Dropping malformed account record: {}", e);
                None
            }
        })
        .collect()
}
