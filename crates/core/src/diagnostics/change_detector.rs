//! Field-level change detection over tracked diagnostics metadata.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use log::debug;

use super::diagnostics_model::{
    DiagnosticEvent, DiagnosticsSnapshot, EntityKind, FieldChange, MessageSource, TrackedField,
};
use super::sink::DiagnosticsSink;

/// Keeps the last tracked snapshot per `(kind, uuid)` and publishes an
/// event only when a tracked field actually changed.
///
/// The detector is a pure observer: it never rejects or alters the records
/// it is shown.
pub struct ChangeDetector {
    snapshots: HashMap<(EntityKind, String), DiagnosticsSnapshot>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl ChangeDetector {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            snapshots: HashMap::new(),
            sink,
        }
    }

    /// Compares `incoming` with the stored snapshot and emits the delta.
    ///
    /// Returns the emitted event, if any. An empty snapshot is treated like
    /// a missing one.
    pub fn observe(
        &mut self,
        kind: EntityKind,
        source: MessageSource,
        uuid: &str,
        incoming: Option<&DiagnosticsSnapshot>,
    ) -> Option<DiagnosticEvent> {
        let key = (kind, uuid.to_string());
        let incoming = incoming.filter(|snapshot| !snapshot.is_empty());

        let event = match (self.snapshots.get(&key), incoming) {
            (None, None) => return None,
            (Some(_), None) => {
                let previous = self.snapshots.remove(&key)?;
                let changes: BTreeMap<TrackedField, FieldChange> = TrackedField::ALL
                    .iter()
                    .filter_map(|field| {
                        previous.value(*field).map(|value| {
                            (
                                *field,
                                FieldChange {
                                    previous: Some(value),
                                    current: None,
                                },
                            )
                        })
                    })
                    .collect();
                build_event(kind, source, uuid, true, changes)
            }
            (previous, Some(incoming)) => {
                let changes = diff(previous, incoming);
                if changes.is_empty() {
                    return None;
                }
                self.snapshots.insert(key, incoming.clone());
                build_event(kind, source, uuid, false, changes)
            }
        };

        debug!(
            "Diagnostics for {:?} {} changed ({} field(s), source {})",
            kind,
            uuid,
            event.changes.len(),
            source.as_str()
        );
        self.sink.emit(event.clone());
        Some(event)
    }

    /// Returns the stored snapshot of an entity.
    pub fn snapshot(&self, kind: EntityKind, uuid: &str) -> Option<DiagnosticsSnapshot> {
        self.snapshots.get(&(kind, uuid.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

fn diff(
    previous: Option<&DiagnosticsSnapshot>,
    incoming: &DiagnosticsSnapshot,
) -> BTreeMap<TrackedField, FieldChange> {
    TrackedField::ALL
        .iter()
        .filter_map(|field| {
            let before = previous.and_then(|p| p.value(*field));
            let after = incoming.value(*field);
            (before != after).then_some((
                *field,
                FieldChange {
                    previous: before,
                    current: after,
                },
            ))
        })
        .collect()
}

fn build_event(
    kind: EntityKind,
    source: MessageSource,
    uuid: &str,
    cleared: bool,
    changes: BTreeMap<TrackedField, FieldChange>,
) -> DiagnosticEvent {
    DiagnosticEvent {
        kind,
        uuid: uuid.to_string(),
        source,
        cleared,
        changes,
        timestamp: Utc::now(),
    }
}
