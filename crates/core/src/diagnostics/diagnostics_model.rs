//! Diagnostics snapshot and event types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::accounts::AccountRecord;
use crate::constants::message_types;
use crate::portfolio::{PortfolioSummary, PositionRecord};

/// Kind of entity a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Portfolio,
    Position,
}

/// Message type that triggered an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    Accounts,
    PortfolioValues,
    PortfolioPositions,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSource::Accounts => message_types::ACCOUNTS,
            MessageSource::PortfolioValues => message_types::PORTFOLIO_VALUES,
            MessageSource::PortfolioPositions => message_types::PORTFOLIO_POSITIONS,
        }
    }
}

/// Fields tracked for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedField {
    CoverageRatio,
    Provenance,
    MetricRunUuid,
    GeneratedAt,
}

impl TrackedField {
    pub const ALL: [TrackedField; 4] = [
        TrackedField::CoverageRatio,
        TrackedField::Provenance,
        TrackedField::MetricRunUuid,
        TrackedField::GeneratedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::CoverageRatio => "coverageRatio",
            TrackedField::Provenance => "provenance",
            TrackedField::MetricRunUuid => "metricRunUuid",
            TrackedField::GeneratedAt => "generatedAt",
        }
    }
}

/// The tracked metadata of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub coverage_ratio: Option<f64>,
    pub provenance: Option<String>,
    pub metric_run_uuid: Option<String>,
    pub generated_at: Option<String>,
}

impl DiagnosticsSnapshot {
    pub fn is_empty(&self) -> bool {
        TrackedField::ALL.iter().all(|field| self.value(*field).is_none())
    }

    /// Returns the value of a field as JSON, `None` when unset.
    pub fn value(&self, field: TrackedField) -> Option<Value> {
        match field {
            TrackedField::CoverageRatio => self.coverage_ratio.map(Value::from),
            TrackedField::Provenance => self.provenance.clone().map(Value::from),
            TrackedField::MetricRunUuid => self.metric_run_uuid.clone().map(Value::from),
            TrackedField::GeneratedAt => self.generated_at.clone().map(Value::from),
        }
    }

    fn from_fields(
        coverage_ratio: Option<f64>,
        provenance: Option<&String>,
        metric_run_uuid: Option<&String>,
        generated_at: Option<&String>,
    ) -> Option<Self> {
        let snapshot = Self {
            coverage_ratio,
            provenance: provenance.cloned(),
            metric_run_uuid: metric_run_uuid.cloned(),
            generated_at: generated_at.cloned(),
        };
        (!snapshot.is_empty()).then_some(snapshot)
    }
}

/// Records that expose tracked diagnostics metadata.
pub trait HasDiagnostics {
    /// Returns the tracked snapshot, `None` when no tracked field is set.
    fn diagnostics_snapshot(&self) -> Option<DiagnosticsSnapshot>;
}

impl HasDiagnostics for PositionRecord {
    fn diagnostics_snapshot(&self) -> Option<DiagnosticsSnapshot> {
        DiagnosticsSnapshot::from_fields(
            self.coverage_ratio,
            self.provenance.as_ref(),
            self.metric_run_uuid.as_ref(),
            self.generated_at.as_ref(),
        )
    }
}

impl HasDiagnostics for PortfolioSummary {
    fn diagnostics_snapshot(&self) -> Option<DiagnosticsSnapshot> {
        DiagnosticsSnapshot::from_fields(
            self.coverage_ratio,
            self.provenance.as_ref(),
            self.metric_run_uuid.as_ref(),
            self.generated_at.as_ref(),
        )
    }
}

impl HasDiagnostics for AccountRecord {
    fn diagnostics_snapshot(&self) -> Option<DiagnosticsSnapshot> {
        DiagnosticsSnapshot::from_fields(
            self.coverage_ratio,
            self.provenance.as_ref(),
            self.metric_run_uuid.as_ref(),
            self.generated_at.as_ref(),
        )
    }
}

/// Previous and current value of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

/// Emitted when the tracked metadata of an entity changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEvent {
    pub kind: EntityKind,
    pub uuid: String,
    pub source: MessageSource,
    /// True when the entity stopped carrying any tracked metadata
    pub cleared: bool,
    /// Only the fields that changed
    pub changes: BTreeMap<TrackedField, FieldChange>,
    pub timestamp: DateTime<Utc>,
}
