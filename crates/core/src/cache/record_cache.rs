//! The record merge cache.

use std::collections::HashMap;

use log::{debug, warn};

use crate::accounts::AccountRecord;
use crate::portfolio::{
    merge_position_set, merge_summary_set, PortfolioSummary, PortfolioSummaryUpdate,
    PositionRecord, PositionUpdate,
};

/// Authoritative, continuously merged view of accounts, portfolio summaries
/// and portfolio positions.
///
/// Every read returns an owned copy; nothing outside the cache can hold a
/// reference into its storage.
#[derive(Debug, Default)]
pub struct RecordCache {
    accounts: Vec<AccountRecord>,
    summaries: Vec<PortfolioSummary>,
    positions: HashMap<String, Vec<PositionRecord>>,
    position_errors: HashMap<String, String>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Replaces the whole account list.
    pub fn replace_accounts(&mut self, accounts: Vec<AccountRecord>) {
        debug!("Replacing account list with {} account(s)", accounts.len());
        self.accounts = accounts;
    }

    pub fn accounts(&self) -> Vec<AccountRecord> {
        self.accounts.clone()
    }

    // =========================================================================
    // Positions
    // =========================================================================

    /// Full load of a portfolio's positions.
    ///
    /// Still merges against the prior snapshot: providers may send narrower
    /// payloads on refresh and fields they omit must survive.
    pub fn replace_all_positions(
        &mut self,
        portfolio_uuid: &str,
        updates: &[PositionUpdate],
    ) -> Option<Vec<PositionRecord>> {
        self.store_positions(portfolio_uuid, updates)
    }

    /// Incremental update of a portfolio's positions against the cache.
    pub fn apply_partial_positions(
        &mut self,
        portfolio_uuid: &str,
        updates: &[PositionUpdate],
    ) -> Option<Vec<PositionRecord>> {
        self.store_positions(portfolio_uuid, updates)
    }

    /// Returns `None` and leaves the positions and any provider error
    /// untouched when `updates` is non-empty but no record is admissible. An
    /// empty `updates` list clears the portfolio.
    fn store_positions(
        &mut self,
        portfolio_uuid: &str,
        updates: &[PositionUpdate],
    ) -> Option<Vec<PositionRecord>> {
        let previous = self
            .positions
            .get(portfolio_uuid)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let merged = merge_position_set(previous, updates);
        if merged.is_empty() && !updates.is_empty() {
            warn!(
                "None of {} position update(s) for portfolio {} was admissible, keeping cached state",
                updates.len(),
                portfolio_uuid
            );
            return None;
        }
        debug!(
            "Merged {} position update(s) for portfolio {} into {} record(s)",
            updates.len(),
            portfolio_uuid,
            merged.len()
        );

        self.position_errors.remove(portfolio_uuid);
        self.positions
            .insert(portfolio_uuid.to_string(), merged.clone());
        Some(merged)
    }

    /// Positions of a portfolio, empty when none are cached.
    pub fn positions(&self, portfolio_uuid: &str) -> Vec<PositionRecord> {
        self.positions
            .get(portfolio_uuid)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_positions(&self, portfolio_uuid: &str) -> bool {
        self.positions.contains_key(portfolio_uuid)
    }

    /// Records a provider error for a portfolio. The error stays the
    /// authoritative content until the next successful positions push.
    pub fn set_position_error(&mut self, portfolio_uuid: &str, message: &str) {
        self.position_errors
            .insert(portfolio_uuid.to_string(), message.to_string());
    }

    pub fn position_error(&self, portfolio_uuid: &str) -> Option<String> {
        self.position_errors.get(portfolio_uuid).cloned()
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    /// Replaces the summary list, merging each summary against its previous
    /// version. Summaries missing from `updates` are dropped.
    pub fn replace_all_summaries(
        &mut self,
        updates: &[PortfolioSummaryUpdate],
    ) -> Vec<PortfolioSummary> {
        let merged = merge_summary_set(&self.summaries, updates);
        debug!(
            "Replaced portfolio summaries: {} update(s), {} summary(ies) kept",
            updates.len(),
            merged.len()
        );
        self.summaries = merged.clone();
        merged
    }

    /// Merges summary updates into the cached list. Summaries not named by
    /// `updates` are kept; new ones are appended.
    ///
    /// Returns the merged versions of the named summaries.
    pub fn apply_partial_summaries(
        &mut self,
        updates: &[PortfolioSummaryUpdate],
    ) -> Vec<PortfolioSummary> {
        let merged = merge_summary_set(&self.summaries, updates);
        for summary in &merged {
            match self.summaries.iter_mut().find(|s| s.uuid == summary.uuid) {
                Some(slot) => *slot = summary.clone(),
                None => self.summaries.push(summary.clone()),
            }
        }
        debug!(
            "Applied {} partial summary update(s), {} summary(ies) cached",
            merged.len(),
            self.summaries.len()
        );
        merged
    }

    pub fn summaries(&self) -> Vec<PortfolioSummary> {
        self.summaries.clone()
    }

    pub fn summary(&self, uuid: &str) -> Option<PortfolioSummary> {
        self.summaries.iter().find(|s| s.uuid == uuid).cloned()
    }

    /// Drops everything, used on engine teardown.
    pub fn clear(&mut self) {
        self.accounts.clear();
        self.summaries.clear();
        self.positions.clear();
        self.position_errors.clear();
    }
}
