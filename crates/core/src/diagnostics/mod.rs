//! Diagnostics module - change detection over tracked record metadata.
//!
//! Every value admitted to the cache (and every account) is shown to the
//! [`ChangeDetector`], which publishes a [`DiagnosticEvent`] on a
//! [`DiagnosticsSink`] only when `coverageRatio`, `provenance`,
//! `metricRunUuid` or `generatedAt` actually changed.

mod change_detector;
mod diagnostics_model;
mod sink;


pub use change_detector::ChangeDetector;
pub use diagnostics_model::{
    DiagnosticEvent, DiagnosticsSnapshot, EntityKind, FieldChange, HasDiagnostics,
    MessageSource, TrackedField,
};
pub use sink::{DiagnosticsSink, LogDiagnosticsSink, MockDiagnosticsSink, NoOpDiagnosticsSink};
