//! Diagnostics sink trait and implementations.

use std::sync::{Arc, Mutex};

use log::debug;

use super::{DiagnosticEvent, EntityKind};

/// Trait for receiving diagnostic events.
///
/// # Design Rules
///
/// - `emit()` must be fast and non-blocking (no network calls)
/// - Delivery is fire-and-forget, no acknowledgement is expected
/// - Failure to emit must not affect reconciliation (best-effort)
pub trait DiagnosticsSink: Send + Sync {
    /// Emit a single diagnostic event.
    fn emit(&self, event: DiagnosticEvent);

    /// Emit multiple diagnostic events.
    ///
    /// Default implementation calls `emit()` for each event.
    fn emit_batch(&self, events: Vec<DiagnosticEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// No-op implementation for hosts that don't consume diagnostics.
#[derive(Clone, Default)]
pub struct NoOpDiagnosticsSink;

impl DiagnosticsSink for NoOpDiagnosticsSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

/// Writes every event to the `log` facade at debug level.
#[derive(Clone, Default)]
pub struct LogDiagnosticsSink;

impl DiagnosticsSink for LogDiagnosticsSink {
    fn emit(&self, event: DiagnosticEvent) {
        let fields: Vec<&str> = event
            .changes
            .keys()
            .map(|field| field.as_str())
            .collect();
        debug!(
            "[diagnostics] {:?} {} via {}: {} {:?}",
            event.kind,
            event.uuid,
            event.source.as_str(),
            if event.cleared { "cleared" } else { "changed" },
            fields
        );
    }
}

/// Mock sink for testing - collects emitted events so tests can assert on
/// them per entity kind and entity.
#[derive(Clone, Default)]
pub struct MockDiagnosticsSink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl MockDiagnosticsSink {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events emitted for one entity kind, in emission order.
    pub fn events_for(&self, kind: EntityKind) -> Vec<DiagnosticEvent> {
        self.filtered(|event| event.kind == kind)
    }

    /// Events emitted for one entity, e.g. `events_for_entity(Position, "P1:S1")`.
    pub fn events_for_entity(&self, kind: EntityKind, uuid: &str) -> Vec<DiagnosticEvent> {
        self.filtered(|event| event.kind == kind && event.uuid == uuid)
    }

    /// Events reporting that an entity's metadata went away.
    pub fn cleared_events(&self) -> Vec<DiagnosticEvent> {
        self.filtered(|event| event.cleared)
    }

    fn filtered(&self, keep: impl Fn(&DiagnosticEvent) -> bool) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| keep(event))
            .cloned()
            .collect()
    }

    /// Clears collected events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Returns the number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Returns true if no events have been collected.
    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl DiagnosticsSink for MockDiagnosticsSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}
