//! Deferred application of computed updates to the presentation surface.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};

use super::scheduler::{RetryScheduler, TimerHandle};
use super::surface_traits::{ApplyOutcome, PositionsView, PresentationSurface};
use crate::config::SyncConfig;

/// Where a pending entry is in its retry cycle.
///
/// `Applied` and `Abandoned` are terminal and never stored: reaching them
/// removes the entry from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// Queued, no timer armed
    Idle,
    /// Waiting for the timer to fire
    Scheduled(TimerHandle),
    /// A timer fired and the surface is being asked again
    Attempting,
}

/// An update waiting for its presentation surface.
#[derive(Debug, Clone)]
pub struct PendingApplication {
    pub view: PositionsView,
    /// Timer-driven retries consumed so far
    pub attempts: u32,
    pub state: PendingState,
    pub last_outcome: ApplyOutcome,
}

/// Queue of updates whose surface was not ready, retried on a fixed delay
/// with a bounded number of attempts.
///
/// At most one timer is armed per portfolio.
pub struct DeferredQueue<C: RetryScheduler> {
    retry_delay: Duration,
    max_attempts: u32,
    scheduler: C,
    entries: HashMap<String, PendingApplication>,
}

impl<C: RetryScheduler> DeferredQueue<C> {
    pub fn new(config: &SyncConfig, scheduler: C) -> Self {
        Self {
            retry_delay: config.retry_delay(),
            max_attempts: config.max_retry_attempts,
            scheduler,
            entries: HashMap::new(),
        }
    }

    /// Hands `view` to the surface, queueing it for retry if the surface is
    /// not ready. A newer view replaces a queued one without resetting its
    /// retry budget or arming a second timer.
    ///
    /// Returns true if the view was applied.
    pub fn submit<S: PresentationSurface + ?Sized>(
        &mut self,
        portfolio_uuid: &str,
        view: PositionsView,
        surface: &mut S,
    ) -> bool {
        let outcome = surface.apply(portfolio_uuid, &view);

        if outcome.is_retryable() {
            let entry = self
                .entries
                .entry(portfolio_uuid.to_string())
                .or_insert_with(|| PendingApplication {
                    view: PositionsView::default(),
                    attempts: 0,
                    state: PendingState::Idle,
                    last_outcome: outcome,
                });
            entry.view = view;
        }

        self.settle(portfolio_uuid, outcome, false)
    }

    /// Retries a queued portfolio once, outside of the timer cycle.
    ///
    /// Returns true if the surface accepted the update. A portfolio with
    /// nothing queued returns false.
    pub fn try_apply<S: PresentationSurface + ?Sized>(
        &mut self,
        portfolio_uuid: &str,
        surface: &mut S,
    ) -> bool {
        let Some(entry) = self.entries.get(portfolio_uuid) else {
            return false;
        };
        let outcome = surface.apply(portfolio_uuid, &entry.view);
        self.settle(portfolio_uuid, outcome, false)
    }

    /// Handles an elapsed retry timer.
    ///
    /// Ticks for a handle that is no longer the entry's armed timer are
    /// ignored. Returns true if the retry applied the update.
    pub fn on_timer<S: PresentationSurface + ?Sized>(
        &mut self,
        portfolio_uuid: &str,
        handle: TimerHandle,
        surface: &mut S,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(portfolio_uuid) else {
            debug!("Retry tick for portfolio {} with nothing queued", portfolio_uuid);
            return false;
        };
        if entry.state != PendingState::Scheduled(handle) {
            debug!(
                "Ignoring stale retry tick {} for portfolio {}",
                handle.id(),
                portfolio_uuid
            );
            return false;
        }

        entry.state = PendingState::Attempting;
        entry.attempts += 1;
        let outcome = surface.apply(portfolio_uuid, &entry.view);
        self.settle(portfolio_uuid, outcome, true)
    }

    /// Attempts every queued portfolio once without consuming retry budget.
    ///
    /// Returns the number of portfolios applied.
    pub fn flush_all<S: PresentationSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        let mut uuids: Vec<String> = self.entries.keys().cloned().collect();
        uuids.sort();

        let mut applied = 0;
        for uuid in &uuids {
            if self.try_apply(uuid, surface) {
                applied += 1;
            }
        }
        if applied > 0 {
            debug!("Flushed {} deferred update(s)", applied);
        }
        applied
    }

    fn settle(&mut self, portfolio_uuid: &str, outcome: ApplyOutcome, from_timer: bool) -> bool {
        match outcome {
            ApplyOutcome::Applied => {
                if let Some(entry) = self.entries.remove(portfolio_uuid) {
                    self.disarm(&entry);
                    debug!(
                        "Deferred update for portfolio {} applied after {} retry(ies)",
                        portfolio_uuid, entry.attempts
                    );
                }
                true
            }
            ApplyOutcome::Invalid => {
                warn!(
                    "Presentation surface rejected portfolio {}, not retrying",
                    portfolio_uuid
                );
                if let Some(entry) = self.entries.remove(portfolio_uuid) {
                    self.disarm(&entry);
                }
                false
            }
            ApplyOutcome::Missing | ApplyOutcome::Hidden => {
                let Some(entry) = self.entries.get_mut(portfolio_uuid) else {
                    return false;
                };
                entry.last_outcome = outcome;

                if from_timer && entry.attempts >= self.max_attempts {
                    warn!(
                        "Giving up on portfolio {} after {} retry(ies), last outcome {:?}",
                        portfolio_uuid, entry.attempts, outcome
                    );
                    self.entries.remove(portfolio_uuid);
                    return false;
                }

                if !matches!(entry.state, PendingState::Scheduled(_)) {
                    let handle = self.scheduler.schedule(portfolio_uuid, self.retry_delay);
                    entry.state = PendingState::Scheduled(handle);
                    debug!(
                        "Portfolio {} not ready ({:?}), retry {} armed",
                        portfolio_uuid,
                        outcome,
                        entry.attempts + 1
                    );
                }
                false
            }
        }
    }

    fn disarm(&mut self, entry: &PendingApplication) {
        if let PendingState::Scheduled(handle) = entry.state {
            self.scheduler.cancel(handle);
        }
    }

    pub fn contains(&self, portfolio_uuid: &str) -> bool {
        self.entries.contains_key(portfolio_uuid)
    }

    pub fn pending(&self, portfolio_uuid: &str) -> Option<&PendingApplication> {
        self.entries.get(portfolio_uuid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn scheduler(&self) -> &C {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut C {
        &mut self.scheduler
    }

    /// Cancels every armed timer and drops every queued update.
    pub fn clear(&mut self) {
        let entries: Vec<PendingApplication> =
            self.entries.drain().map(|(_, entry)| entry).collect();
        for entry in &entries {
            self.disarm(entry);
        }
    }
}
