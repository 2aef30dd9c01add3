//! Folio Sync Core - incremental synchronization of pushed portfolio data.
//!
//! The backend pushes accounts, portfolio summaries and per-portfolio
//! position lists. This crate reassembles chunked pushes, merges partial
//! records into a cache, paints the result onto a presentation surface
//! (retrying while the surface is not ready) and reports diagnostics only
//! when tracked metadata actually changed.
//!
//! Everything hangs off one [`SyncEngine`] per dashboard instance. The host
//! provides the [`PresentationSurface`], a [`RetryScheduler`] and a
//! [`DiagnosticsSink`].

pub mod accounts;
pub mod cache;
pub mod chunks;
pub mod config;
pub mod constants;
pub mod deferred;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod messages;
pub mod patch;
pub mod portfolio;

pub use config::SyncConfig;
pub use deferred::{
    ApplyOutcome, ManualScheduler, PositionsView, PresentationSurface, RetryScheduler, RetryTick,
    TimerHandle, TokioRetryScheduler,
};
pub use diagnostics::{DiagnosticEvent, DiagnosticsSink, LogDiagnosticsSink, NoOpDiagnosticsSink};
pub use engine::{HandleOutcome, PositionsOutcome, SyncEngine};
pub use messages::{PositionsPush, PushMessage};
pub use patch::Patch;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
