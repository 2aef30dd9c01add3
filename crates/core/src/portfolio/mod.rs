//! Portfolio module - summary and position models and their merge rules.

mod merge;
mod portfolio_model;
mod positions_model;

#[cfg(test)]
mod merge_tests;

pub use merge::{
    merge_nested, merge_position, merge_position_set, merge_summary, merge_summary_set,
};
pub use portfolio_model::{parse_summary_updates, PortfolioSummary, PortfolioSummaryUpdate};
pub use positions_model::{
    parse_position_updates, NestedObject, PositionRecord, PositionUpdate,
};
