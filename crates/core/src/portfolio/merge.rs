//! Field-level merge of partial records into cached records.
//!
//! The merge never blindly overwrites: a field is only written when the
//! incoming record explicitly specifies it. Membership is the opposite: the
//! incoming list decides which records survive, so anything the provider
//! stopped sending disappears from the result.

use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use super::portfolio_model::{PortfolioSummary, PortfolioSummaryUpdate};
use super::positions_model::{NestedObject, PositionRecord, PositionUpdate};

/// Shallow merge of a nested object: `{...previous, ...incoming}`.
///
/// Anything other than an incoming object keeps the previous value.
pub fn merge_nested(
    previous: Option<&NestedObject>,
    incoming: Option<&Value>,
) -> Option<NestedObject> {
    match incoming {
        Some(Value::Object(incoming)) => {
            let mut merged = previous.cloned().unwrap_or_default();
            for (key, value) in incoming {
                merged.insert(key.clone(), value.clone());
            }
            Some(merged)
        }
        _ => previous.cloned(),
    }
}

/// Merges one validated position update into its previous record.
pub fn merge_position(
    previous: Option<&PositionRecord>,
    update: &PositionUpdate,
) -> PositionRecord {
    let mut record = previous.cloned().unwrap_or_default();

    if let Some(security_uuid) = update.security_uuid.as_value() {
        record.security_uuid = security_uuid.clone();
    }
    update.portfolio_uuid.apply_to(&mut record.portfolio_uuid);
    update.name.apply_to(&mut record.name);
    update.currency_code.apply_to(&mut record.currency_code);
    if let Some(holdings) = update.current_holdings.as_value() {
        record.current_holdings = *holdings;
    }
    if let Some(purchase_value) = update.purchase_value.as_value() {
        record.purchase_value = *purchase_value;
    }
    if let Some(current_value) = update.current_value.as_value() {
        record.current_value = *current_value;
    }
    update.coverage_ratio.apply_to(&mut record.coverage_ratio);
    update.provenance.apply_to(&mut record.provenance);
    update.metric_run_uuid.apply_to(&mut record.metric_run_uuid);
    update.generated_at.apply_to(&mut record.generated_at);
    update.fx_unavailable.apply_to(&mut record.fx_unavailable);
    update.last_price_native.apply_to(&mut record.last_price_native);
    update.last_price_eur.apply_to(&mut record.last_price_eur);
    update.last_close_native.apply_to(&mut record.last_close_native);
    update.last_close_eur.apply_to(&mut record.last_close_eur);

    record.average_cost = merge_nested(
        previous.and_then(|p| p.average_cost.as_ref()),
        update.average_cost.as_ref(),
    );
    record.performance = merge_nested(
        previous.and_then(|p| p.performance.as_ref()),
        update.performance.as_ref(),
    );
    record.aggregation = merge_nested(
        previous.and_then(|p| p.aggregation.as_ref()),
        update.aggregation.as_ref(),
    );
    record.data_state = merge_nested(
        previous.and_then(|p| p.data_state.as_ref()),
        update.data_state.as_ref(),
    );

    record
}

/// Merges a batch of position updates against the previous position set.
///
/// Invalid updates are dropped without affecting their siblings. The result
/// follows the order of the incoming list; a security repeated in the same
/// batch is merged into its first slot.
pub fn merge_position_set(
    previous: &[PositionRecord],
    updates: &[PositionUpdate],
) -> Vec<PositionRecord> {
    let previous_by_uuid: HashMap<&str, &PositionRecord> = previous
        .iter()
        .map(|record| (record.security_uuid.as_str(), record))
        .collect();

    let mut merged: Vec<PositionRecord> = Vec::with_capacity(updates.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for update in updates {
        if let Err(e) = update.validate() {
            warn!("Dropping malformed position record: {}", e);
            continue;
        }
        let Some(security_uuid) = update.security_uuid() else {
            continue;
        };

        match slots.get(security_uuid) {
            Some(&slot) => {
                let record = merge_position(Some(&merged[slot]), update);
                merged[slot] = record;
            }
            None => {
                let prior = previous_by_uuid.get(security_uuid).copied();
                slots.insert(security_uuid.to_string(), merged.len());
                merged.push(merge_position(prior, update));
            }
        }
    }

    merged
}

/// Builds position records for a list embedded in a summary. Embedded lists
/// are replaced wholesale, never merged with the previous list.
fn embedded_positions(values: &[Value]) -> Vec<PositionRecord> {
    let updates: Vec<PositionUpdate> = values
        .iter()
        .filter_map(|value| match PositionUpdate::from_value(value.clone()) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!("Dropping unparseable embedded position: {}", e);
                None
            }
        })
        .collect();
    merge_position_set(&[], &updates)
}

/// Merges one validated summary update into its previous summary.
///
/// Specified scalars and unknown keys overwrite. `performance` and the
/// embedded position list are replaced by a copy when supplied, otherwise
/// retained.
pub fn merge_summary(
    previous: Option<&PortfolioSummary>,
    update: &PortfolioSummaryUpdate,
) -> PortfolioSummary {
    let mut summary = previous.cloned().unwrap_or_default();

    if let Some(uuid) = update.uuid.as_value() {
        summary.uuid = uuid.clone();
    }
    update.name.apply_to(&mut summary.name);
    update.current_value.apply_to(&mut summary.current_value);
    update.purchase_sum.apply_to(&mut summary.purchase_sum);
    update.position_count.apply_to(&mut summary.position_count);
    update
        .missing_value_positions
        .apply_to(&mut summary.missing_value_positions);
    update.has_current_value.apply_to(&mut summary.has_current_value);
    update.coverage_ratio.apply_to(&mut summary.coverage_ratio);
    update.provenance.apply_to(&mut summary.provenance);
    update.metric_run_uuid.apply_to(&mut summary.metric_run_uuid);
    update.generated_at.apply_to(&mut summary.generated_at);

    for (key, value) in &update.extra {
        summary.extra.insert(key.clone(), value.clone());
    }

    if let Some(Value::Object(performance)) = &update.performance {
        summary.performance = Some(performance.clone());
    }
    if let Some(positions) = &update.positions {
        summary.positions = Some(embedded_positions(positions));
    }

    summary
}

/// Merges a batch of summary updates against the previous summaries.
///
/// Returns only the summaries named by the batch, in batch order. Callers
/// decide whether unnamed summaries survive.
pub fn merge_summary_set(
    previous: &[PortfolioSummary],
    updates: &[PortfolioSummaryUpdate],
) -> Vec<PortfolioSummary> {
    let previous_by_uuid: HashMap<&str, &PortfolioSummary> = previous
        .iter()
        .map(|summary| (summary.uuid.as_str(), summary))
        .collect();

    let mut merged: Vec<PortfolioSummary> = Vec::with_capacity(updates.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for update in updates {
        if let Err(e) = update.validate() {
            warn!("Dropping malformed portfolio summary: {}", e);
            continue;
        }
        let Some(uuid) = update.uuid() else {
            continue;
        };

        match slots.get(uuid) {
            Some(&slot) => {
                let summary = merge_summary(Some(&merged[slot]), update);
                merged[slot] = summary;
            }
            None => {
                let prior = previous_by_uuid.get(uuid).copied();
                slots.insert(uuid.to_string(), merged.len());
                merged.push(merge_summary(prior, update));
            }
        }
    }

    merged
}
