//! Presentation surface contract.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::portfolio::PositionRecord;

/// Result of handing content to the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Content was written into the details container
    Applied,
    /// No details container exists in the current presentation tree
    Missing,
    /// The container exists but is collapsed or inactive
    Hidden,
    /// Bad arguments, retrying cannot help
    Invalid,
}

impl ApplyOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApplyOutcome::Missing | ApplyOutcome::Hidden)
    }
}

/// What the surface renders for one portfolio: its positions, or the
/// provider error that replaced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsView {
    pub positions: Vec<PositionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The presentation surface the engine paints positions into.
///
/// Implementations look up the details container of a portfolio and write
/// the positions list or error markup into it.
pub trait PresentationSurface {
    fn apply(&mut self, portfolio_uuid: &str, view: &PositionsView) -> ApplyOutcome;
}

/// Mock surface for testing - returns scripted outcomes and records every
/// view it was handed.
#[derive(Debug, Clone)]
pub struct MockSurface {
    default_outcome: ApplyOutcome,
    outcomes: HashMap<String, ApplyOutcome>,
    scripted: VecDeque<ApplyOutcome>,
    calls: Vec<(String, PositionsView)>,
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new(ApplyOutcome::Applied)
    }
}

impl MockSurface {
    pub fn new(default_outcome: ApplyOutcome) -> Self {
        Self {
            default_outcome,
            outcomes: HashMap::new(),
            scripted: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    /// Sets the outcome returned for every portfolio without an override.
    pub fn set_default(&mut self, outcome: ApplyOutcome) {
        self.default_outcome = outcome;
    }

    /// Sets the outcome returned for one portfolio.
    pub fn set_outcome(&mut self, portfolio_uuid: &str, outcome: ApplyOutcome) {
        self.outcomes.insert(portfolio_uuid.to_string(), outcome);
    }

    /// Queues outcomes consumed one per call before any other rule applies.
    pub fn script(&mut self, outcomes: impl IntoIterator<Item = ApplyOutcome>) {
        self.scripted.extend(outcomes);
    }

    pub fn calls(&self) -> &[(String, PositionsView)] {
        &self.calls
    }

    pub fn call_count(&self, portfolio_uuid: &str) -> usize {
        self.calls
            .iter()
            .filter(|(uuid, _)| uuid == portfolio_uuid)
            .count()
    }

    /// The last view handed over for a portfolio.
    pub fn last_view(&self, portfolio_uuid: &str) -> Option<&PositionsView> {
        self.calls
            .iter()
            .rev()
            .find(|(uuid, _)| uuid == portfolio_uuid)
            .map(|(_, view)| view)
    }
}

impl PresentationSurface for MockSurface {
    fn apply(&mut self, portfolio_uuid: &str, view: &PositionsView) -> ApplyOutcome {
        self.calls.push((portfolio_uuid.to_string(), view.clone()));
        if let Some(outcome) = self.scripted.pop_front() {
            return outcome;
        }
        self.outcomes
            .get(portfolio_uuid)
            .copied()
            .unwrap_or(self.default_outcome)
    }
}
