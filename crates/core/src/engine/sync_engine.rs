//! The sync engine - dispatches push messages through reassembly, merge,
//! change detection and presentation.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::accounts::{parse_accounts, AccountRecord};
use crate::cache::RecordCache;
use crate::chunks::ChunkBuffer;
use crate::config::SyncConfig;
use crate::constants::position_key;
use crate::deferred::{
    DeferredQueue, PositionsView, PresentationSurface, RetryScheduler, RetryTick, TimerHandle,
};
use crate::diagnostics::{
    ChangeDetector, DiagnosticsSink, EntityKind, HasDiagnostics, MessageSource,
};
use crate::errors::Result;
use crate::messages::{PositionsPush, PushMessage};
use crate::portfolio::{
    parse_position_updates, parse_summary_updates, PortfolioSummary, PositionRecord,
    PositionUpdate,
};

/// How a fully reassembled position list is folded into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionsMode {
    ReplaceAll,
    ApplyPartial,
}

/// What happened to a positions push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionsOutcome {
    /// Chunk stored, the rest of the set has not arrived yet
    Buffered,
    /// Merged and written to the presentation surface
    Applied,
    /// Merged, queued until the presentation surface is ready
    Deferred,
    /// Merged, but the presentation surface refused the update
    Rejected,
    /// Nothing usable in the push, cached state left as it was
    Dropped,
}

/// Result of dispatching one push message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Number of accounts admitted
    Accounts(usize),
    /// Number of portfolio summaries admitted
    PortfolioValues(usize),
    Positions {
        portfolio_uuid: String,
        outcome: PositionsOutcome,
    },
    /// Not handled by the engine, returned to the host untouched
    LastFileUpdate(Value),
}

/// Owns the reconciliation state of one dashboard instance.
///
/// Every store is keyed per entity and owned here; several engines can run
/// side by side without sharing anything. All methods take `&mut self`, the
/// host drives the engine from a single event loop.
pub struct SyncEngine<S: PresentationSurface, C: RetryScheduler> {
    config: SyncConfig,
    cache: RecordCache,
    chunks: ChunkBuffer<Value>,
    deferred: DeferredQueue<C>,
    detector: ChangeDetector,
    surface: S,
}

impl<S: PresentationSurface, C: RetryScheduler> SyncEngine<S, C> {
    pub fn new(
        config: SyncConfig,
        surface: S,
        scheduler: C,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: RecordCache::new(),
            chunks: ChunkBuffer::new(),
            deferred: DeferredQueue::new(&config, scheduler),
            detector: ChangeDetector::new(sink),
            surface,
        })
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Parses a raw transport frame and dispatches it.
    pub fn handle_json(&mut self, frame: &str) -> Result<HandleOutcome> {
        let message = PushMessage::from_json(frame)?;
        Ok(self.handle_message(message))
    }

    pub fn handle_message(&mut self, message: PushMessage) -> HandleOutcome {
        match message {
            PushMessage::Accounts(values) => HandleOutcome::Accounts(self.ingest_accounts(values)),
            PushMessage::PortfolioValues(values) => {
                HandleOutcome::PortfolioValues(self.ingest_portfolio_values(values))
            }
            PushMessage::PortfolioPositions(push) => {
                let portfolio_uuid = push.portfolio_uuid.clone();
                let outcome = self.ingest_positions(push);
                HandleOutcome::Positions {
                    portfolio_uuid,
                    outcome,
                }
            }
            PushMessage::LastFileUpdate(value) => HandleOutcome::LastFileUpdate(value),
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Replaces the account list. Returns the number of accounts admitted.
    ///
    /// Accounts missing from the new list have their tracked metadata
    /// released.
    pub fn ingest_accounts(&mut self, values: Vec<Value>) -> usize {
        let accounts = parse_accounts(values);
        let previous: Vec<String> = self
            .cache
            .accounts()
            .into_iter()
            .map(|account| account.uuid)
            .collect();
        let current: HashSet<&str> = accounts.iter().map(|a| a.uuid.as_str()).collect();
        let vanished: Vec<String> = previous
            .into_iter()
            .filter(|uuid| !current.contains(uuid.as_str()))
            .collect();
        self.release_diagnostics(EntityKind::Account, MessageSource::Accounts, &vanished);

        for account in &accounts {
            self.detector.observe(
                EntityKind::Account,
                MessageSource::Accounts,
                &account.uuid,
                account.diagnostics_snapshot().as_ref(),
            );
        }
        let admitted = accounts.len();
        self.cache.replace_accounts(accounts);
        admitted
    }

    // =========================================================================
    // Portfolio summaries
    // =========================================================================

    /// Replaces the summary list. Summaries not in `values` are dropped,
    /// together with their tracked metadata.
    pub fn ingest_portfolio_values(&mut self, values: Vec<Value>) -> usize {
        let updates = parse_summary_updates(values);
        let previous = self.cache.summaries();
        let merged = self.cache.replace_all_summaries(&updates);

        let current: HashSet<&str> = merged.iter().map(|s| s.uuid.as_str()).collect();
        let vanished: Vec<String> = previous
            .into_iter()
            .map(|summary| summary.uuid)
            .filter(|uuid| !current.contains(uuid.as_str()))
            .collect();
        self.release_diagnostics(EntityKind::Portfolio, MessageSource::PortfolioValues, &vanished);

        self.observe_summaries(&merged);
        merged.len()
    }

    /// Merges summary updates into the cached list, keeping summaries not
    /// named by `values`.
    pub fn apply_partial_summaries(&mut self, values: Vec<Value>) -> usize {
        let updates = parse_summary_updates(values);
        let merged = self.cache.apply_partial_summaries(&updates);
        self.observe_summaries(&merged);
        merged.len()
    }

    /// Clears the stored snapshots of entities that left the cache.
    fn release_diagnostics(&mut self, kind: EntityKind, source: MessageSource, keys: &[String]) {
        for key in keys {
            self.detector.observe(kind, source, key, None);
        }
    }

    fn observe_summaries(&mut self, summaries: &[PortfolioSummary]) {
        for summary in summaries {
            self.detector.observe(
                EntityKind::Portfolio,
                MessageSource::PortfolioValues,
                &summary.uuid,
                summary.diagnostics_snapshot().as_ref(),
            );
        }
    }

    // =========================================================================
    // Positions
    // =========================================================================

    /// Runs one positions push through chunk reassembly, the cache and the
    /// presentation surface.
    ///
    /// A provider error discards any partial chunk set and becomes the
    /// portfolio's content until the next successful push.
    pub fn ingest_positions(&mut self, push: PositionsPush) -> PositionsOutcome {
        let portfolio_uuid = push.portfolio_uuid.trim().to_string();
        if portfolio_uuid.is_empty() {
            warn!("Dropping positions push without a portfolio uuid");
            return PositionsOutcome::Dropped;
        }

        if let Some(error) = push.error() {
            let error = error.to_string();
            if self.chunks.discard(&portfolio_uuid) {
                debug!(
                    "Provider error for portfolio {} discarded a partial chunk set",
                    portfolio_uuid
                );
            }
            warn!("Provider error for portfolio {}: {}", portfolio_uuid, error);
            self.cache.set_position_error(&portfolio_uuid, &error);
            let view = PositionsView {
                positions: self.cache.positions(&portfolio_uuid),
                error: Some(error),
            };
            return self.present(&portfolio_uuid, view);
        }

        let chunk_index = push.chunk_index();
        let chunk_count = push.chunk_count();

        let Some(complete) =
            self.chunks
                .ingest(&portfolio_uuid, chunk_index, chunk_count, push.positions)
        else {
            return if self.chunks.is_pending(&portfolio_uuid) {
                PositionsOutcome::Buffered
            } else {
                PositionsOutcome::Dropped
            };
        };

        self.store_positions(&portfolio_uuid, complete, PositionsMode::ApplyPartial)
    }

    /// Full load of a portfolio's positions, bypassing chunk reassembly.
    pub fn load_positions(
        &mut self,
        portfolio_uuid: &str,
        values: Vec<Value>,
    ) -> PositionsOutcome {
        self.store_positions(portfolio_uuid, values, PositionsMode::ReplaceAll)
    }

    /// Parses a complete position list and folds it into the cache.
    ///
    /// A non-empty list without a single admissible record is dropped: the
    /// cached positions and any provider error stay in place and the surface
    /// is not touched. An empty list is an intentional clear.
    fn store_positions(
        &mut self,
        portfolio_uuid: &str,
        values: Vec<Value>,
        mode: PositionsMode,
    ) -> PositionsOutcome {
        let received = values.len();
        let updates: Vec<PositionUpdate> = parse_position_updates(values);
        if received > 0 && updates.is_empty() {
            warn!(
                "Dropping positions push for portfolio {}: none of {} record(s) could be parsed",
                portfolio_uuid, received
            );
            return PositionsOutcome::Dropped;
        }

        let previous: Vec<String> = self
            .cache
            .positions(portfolio_uuid)
            .into_iter()
            .map(|position| position.security_uuid)
            .collect();
        let merged = match mode {
            PositionsMode::ReplaceAll => self.cache.replace_all_positions(portfolio_uuid, &updates),
            PositionsMode::ApplyPartial => {
                self.cache.apply_partial_positions(portfolio_uuid, &updates)
            }
        };
        let Some(merged) = merged else {
            return PositionsOutcome::Dropped;
        };

        let current: HashSet<&str> = merged.iter().map(|p| p.security_uuid.as_str()).collect();
        let vanished: Vec<String> = previous
            .iter()
            .filter(|security_uuid| !current.contains(security_uuid.as_str()))
            .map(|security_uuid| position_key(portfolio_uuid, security_uuid))
            .collect();
        self.release_diagnostics(
            EntityKind::Position,
            MessageSource::PortfolioPositions,
            &vanished,
        );

        self.admit_positions(portfolio_uuid, merged)
    }

    fn admit_positions(
        &mut self,
        portfolio_uuid: &str,
        positions: Vec<PositionRecord>,
    ) -> PositionsOutcome {
        for position in &positions {
            self.detector.observe(
                EntityKind::Position,
                MessageSource::PortfolioPositions,
                &position_key(portfolio_uuid, &position.security_uuid),
                position.diagnostics_snapshot().as_ref(),
            );
        }
        let view = PositionsView {
            positions,
            error: None,
        };
        self.present(portfolio_uuid, view)
    }

    fn present(&mut self, portfolio_uuid: &str, view: PositionsView) -> PositionsOutcome {
        if self.deferred.submit(portfolio_uuid, view, &mut self.surface) {
            PositionsOutcome::Applied
        } else if self.deferred.contains(portfolio_uuid) {
            PositionsOutcome::Deferred
        } else {
            PositionsOutcome::Rejected
        }
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    /// Hands a portfolio's pending update, or else its cached positions, to
    /// the presentation surface.
    ///
    /// Returns false when nothing is known about the portfolio or the surface
    /// did not accept the update.
    pub fn try_apply(&mut self, portfolio_uuid: &str) -> bool {
        if self.deferred.contains(portfolio_uuid) {
            return self.deferred.try_apply(portfolio_uuid, &mut self.surface);
        }

        let error = self.cache.position_error(portfolio_uuid);
        if error.is_none() && !self.cache.has_positions(portfolio_uuid) {
            return false;
        }
        let view = PositionsView {
            positions: self.cache.positions(portfolio_uuid),
            error,
        };
        self.deferred.submit(portfolio_uuid, view, &mut self.surface)
    }

    /// Feeds an elapsed retry timer back into the queue.
    pub fn on_retry_timer(&mut self, portfolio_uuid: &str, handle: TimerHandle) -> bool {
        self.deferred.on_timer(portfolio_uuid, handle, &mut self.surface)
    }

    /// Convenience for hosts driving a [`crate::deferred::TokioRetryScheduler`].
    pub fn on_retry_tick(&mut self, tick: RetryTick) -> bool {
        self.on_retry_timer(&tick.portfolio_uuid, tick.handle)
    }

    /// Called by the host after the presentation tree changed, e.g. when a
    /// details row was expanded. Attempts every deferred update once.
    pub fn on_surface_ready(&mut self) -> usize {
        self.deferred.flush_all(&mut self.surface)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn accounts(&self) -> Vec<AccountRecord> {
        self.cache.accounts()
    }

    pub fn summaries(&self) -> Vec<PortfolioSummary> {
        self.cache.summaries()
    }

    pub fn summary(&self, uuid: &str) -> Option<PortfolioSummary> {
        self.cache.summary(uuid)
    }

    pub fn positions(&self, portfolio_uuid: &str) -> Vec<PositionRecord> {
        self.cache.positions(portfolio_uuid)
    }

    pub fn position_error(&self, portfolio_uuid: &str) -> Option<String> {
        self.cache.position_error(portfolio_uuid)
    }

    /// Portfolios with an incomplete chunk set as
    /// `(portfolio_uuid, received, expected)`.
    pub fn pending_chunks(&self) -> Vec<(String, usize, usize)> {
        self.chunks.pending_portfolios()
    }

    pub fn is_deferred(&self, portfolio_uuid: &str) -> bool {
        self.deferred.contains(portfolio_uuid)
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn diagnostics(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn scheduler(&self) -> &C {
        self.deferred.scheduler()
    }

    pub fn scheduler_mut(&mut self) -> &mut C {
        self.deferred.scheduler_mut()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Tears the engine down: cancels every retry timer and drops all
    /// buffered, cached and tracked state.
    pub fn shutdown(&mut self) {
        self.deferred.clear();
        self.chunks.clear();
        self.cache.clear();
        self.detector.clear();
        debug!("Sync engine shut down");
    }
}
