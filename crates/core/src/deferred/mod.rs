//! Deferred application queue.
//!
//! When the presentation surface cannot take an update yet, the update is
//! queued and retried on a fixed delay until it is applied or its retry
//! budget runs out. Each entry moves through
//! `Idle -> Scheduled -> Attempting -> {Applied | Scheduled | Abandoned}`.

mod deferred_queue;
mod scheduler;
mod surface_traits;

#[cfg(test)]
mod deferred_queue_tests;

pub use deferred_queue::{DeferredQueue, PendingApplication, PendingState};
pub use scheduler::{
    ArmedTimer, ManualScheduler, RetryScheduler, RetryTick, TimerHandle, TokioRetryScheduler,
};
pub use surface_traits::{ApplyOutcome, MockSurface, PositionsView, PresentationSurface};
