//! Tests for the position and summary merge rules.

#[cfg(test)]
mod tests {
    use crate::patch::Patch;
    use crate::portfolio::{
        merge_nested, merge_position, merge_position_set, merge_summary, merge_summary_set,
        PortfolioSummary, PortfolioSummaryUpdate, PositionRecord, PositionUpdate,
    };
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn update(value: Value) -> PositionUpdate {
        PositionUpdate::from_value(value).unwrap()
    }

    fn summary_update(value: Value) -> PortfolioSummaryUpdate {
        PortfolioSummaryUpdate::from_value(value).unwrap()
    }

    fn full_position(security_uuid: &str) -> PositionUpdate {
        update(json!({
            "securityUuid": security_uuid,
            "name": "Alpha",
            "currencyCode": "USD",
            "currentHoldings": 10,
            "purchaseValue": 100,
            "currentValue": 120,
            "averageCost": { "native": 9.5, "eur": 8.75 },
            "performance": { "gainAbs": 20, "gainPct": 20 },
            "metricRunUuid": "run-1",
            "provenance": "backend"
        }))
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_requires_identity_and_numerics() {
        assert!(full_position("S1").validate().is_ok());

        let no_uuid = update(json!({ "currentHoldings": 1, "purchaseValue": 1, "currentValue": 1 }));
        assert!(no_uuid.validate().is_err());

        let empty_uuid = update(json!({
            "securityUuid": "", "currentHoldings": 1, "purchaseValue": 1, "currentValue": 1
        }));
        assert!(empty_uuid.validate().is_err());

        let missing_value = update(json!({ "securityUuid": "S1", "currentHoldings": 1, "purchaseValue": 1 }));
        assert!(missing_value.validate().is_err());

        let null_holdings = update(json!({
            "securityUuid": "S1", "currentHoldings": null, "purchaseValue": 1, "currentValue": 1
        }));
        assert!(null_holdings.validate().is_err());
    }

    #[test]
    fn test_non_numeric_holdings_fail_to_parse() {
        let parsed = PositionUpdate::from_value(json!({
            "securityUuid": "S1", "currentHoldings": true, "purchaseValue": 1, "currentValue": 1
        }));
        assert!(parsed.is_err());
    }

    // ==================== Nested Merge Tests ====================

    #[test]
    fn test_merge_nested_spreads_incoming_over_previous() {
        let previous = json!({ "gainAbs": 1, "gainPct": 2, "dayChange": 3 });
        let previous = previous.as_object().unwrap();
        let merged = merge_nested(Some(previous), Some(&json!({ "gainAbs": 5 }))).unwrap();
        assert_eq!(
            Value::Object(merged),
            json!({ "gainAbs": 5, "gainPct": 2, "dayChange": 3 })
        );
    }

    #[test]
    fn test_merge_nested_keeps_previous_for_non_objects() {
        let previous = json!({ "native": 1 });
        let previous = previous.as_object().unwrap();
        assert_eq!(merge_nested(Some(previous), None).as_ref(), Some(previous));
        assert_eq!(
            merge_nested(Some(previous), Some(&Value::Null)).as_ref(),
            Some(previous)
        );
        assert_eq!(
            merge_nested(Some(previous), Some(&json!(42))).as_ref(),
            Some(previous)
        );
        assert_eq!(merge_nested(None, None), None);
    }

    // ==================== Position Merge Tests ====================

    #[test]
    fn test_merge_position_from_scratch() {
        let record = merge_position(None, &full_position("S1"));
        assert_eq!(record.security_uuid, "S1");
        assert_eq!(record.name.as_deref(), Some("Alpha"));
        assert_eq!(record.current_holdings, dec!(10));
        assert_eq!(record.purchase_value, dec!(100));
        assert_eq!(record.current_value, dec!(120));
        assert_eq!(record.metric_run_uuid.as_deref(), Some("run-1"));
        assert!(record.average_cost.is_some());
    }

    #[test]
    fn test_absent_fields_leave_previous_untouched() {
        let previous = merge_position(None, &full_position("S1"));
        let partial = update(json!({
            "securityUuid": "S1", "currentHoldings": 10, "purchaseValue": 100, "currentValue": 130
        }));

        let merged = merge_position(Some(&previous), &partial);
        assert_eq!(merged.current_value, dec!(130));
        assert_eq!(merged.name.as_deref(), Some("Alpha"));
        assert_eq!(merged.currency_code.as_deref(), Some("USD"));
        assert_eq!(merged.provenance.as_deref(), Some("backend"));
        assert_eq!(merged.metric_run_uuid.as_deref(), Some("run-1"));
    }

    #[test]
    fn test_explicit_null_clears_scalar() {
        let previous = merge_position(None, &full_position("S1"));
        let partial = update(json!({
            "securityUuid": "S1", "currentHoldings": 10, "purchaseValue": 100, "currentValue": 120,
            "metricRunUuid": null
        }));
        assert_eq!(partial.metric_run_uuid, Patch::Null);

        let merged = merge_position(Some(&previous), &partial);
        assert_eq!(merged.metric_run_uuid, None);
        assert_eq!(merged.provenance.as_deref(), Some("backend"));
    }

    #[test]
    fn test_performance_update_preserves_average_cost() {
        let previous = merge_position(None, &full_position("S1"));
        let partial = update(json!({
            "securityUuid": "S1", "currentHoldings": 10, "purchaseValue": 100, "currentValue": 125,
            "performance": { "gainAbs": 25, "gainPct": 25 }
        }));

        let merged = merge_position(Some(&previous), &partial);
        assert_eq!(merged.average_cost, previous.average_cost);
        let performance = Value::Object(merged.performance.unwrap());
        assert_eq!(performance, json!({ "gainAbs": 25, "gainPct": 25 }));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let previous = vec![merge_position(None, &full_position("S1"))];
        let partial = vec![update(json!({
            "securityUuid": "S1", "currentHoldings": 12, "purchaseValue": 110, "currentValue": 140,
            "performance": { "gainPct": 27.3 },
            "dataState": { "stale": false }
        }))];

        let once = merge_position_set(&previous, &partial);
        let twice = merge_position_set(&once, &partial);
        assert_eq!(once, twice);
    }

    // ==================== Position Set Tests ====================

    #[test]
    fn test_position_set_drops_records_not_in_batch() {
        let previous = merge_position_set(&[], &[full_position("S1"), full_position("S2")]);
        assert_eq!(previous.len(), 2);

        let merged = merge_position_set(&previous, &[full_position("S2")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].security_uuid, "S2");
    }

    #[test]
    fn test_position_set_skips_malformed_siblings() {
        let batch = vec![
            full_position("S1"),
            update(json!({ "securityUuid": "BROKEN", "currentHoldings": 1 })),
            full_position("S3"),
        ];
        let merged = merge_position_set(&[], &batch);
        let uuids: Vec<&str> = merged.iter().map(|r| r.security_uuid.as_str()).collect();
        assert_eq!(uuids, vec!["S1", "S3"]);
    }

    #[test]
    fn test_position_set_follows_incoming_order_and_folds_duplicates() {
        let batch = vec![
            full_position("S2"),
            full_position("S1"),
            update(json!({
                "securityUuid": "S2", "currentHoldings": 3, "purchaseValue": 30, "currentValue": 33
            })),
        ];
        let merged = merge_position_set(&[], &batch);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].security_uuid, "S2");
        assert_eq!(merged[0].current_holdings, dec!(3));
        assert_eq!(merged[0].name.as_deref(), Some("Alpha"));
        assert_eq!(merged[1].security_uuid, "S1");
    }

    #[test]
    fn test_last_price_fields_are_merged() {
        let previous = PositionRecord {
            security_uuid: "S1".to_string(),
            last_price_native: Some(dec!(12.5)),
            last_close_eur: Some(dec!(11)),
            ..PositionRecord::default()
        };
        let partial = update(json!({
            "securityUuid": "S1", "currentHoldings": 1, "purchaseValue": 1, "currentValue": 1,
            "lastPriceNative": 13, "lastCloseEur": null
        }));
        let merged = merge_position(Some(&previous), &partial);
        assert_eq!(merged.last_price_native, Some(dec!(13)));
        assert_eq!(merged.last_close_eur, None);
    }

    // ==================== Summary Merge Tests ====================

    #[test]
    fn test_summary_merge_keeps_unsent_fields_and_spreads_extra() {
        let previous = merge_summary(
            None,
            &summary_update(json!({
                "uuid": "P1",
                "name": "Main",
                "currentValue": 1000,
                "purchaseSum": 800,
                "positionCount": 4,
                "hasCurrentValue": true,
                "performance": { "gainAbs": 200, "gainPct": 25 },
                "customField": "a"
            })),
        );
        assert_eq!(previous.extra.get("customField"), Some(&json!("a")));

        let merged = merge_summary(
            Some(&previous),
            &summary_update(json!({ "uuid": "P1", "currentValue": 1100, "customField": "b" })),
        );
        assert_eq!(merged.current_value, Some(dec!(1100)));
        assert_eq!(merged.purchase_sum, Some(dec!(800)));
        assert_eq!(merged.name.as_deref(), Some("Main"));
        assert_eq!(merged.performance, previous.performance);
        assert_eq!(merged.extra.get("customField"), Some(&json!("b")));
    }

    #[test]
    fn test_summary_performance_is_replaced_not_merged() {
        let previous = merge_summary(
            None,
            &summary_update(json!({
                "uuid": "P1", "performance": { "gainAbs": 200, "gainPct": 25 }
            })),
        );
        let merged = merge_summary(
            Some(&previous),
            &summary_update(json!({ "uuid": "P1", "performance": { "gainAbs": 300 } })),
        );
        assert_eq!(
            Value::Object(merged.performance.unwrap()),
            json!({ "gainAbs": 300 })
        );
    }

    #[test]
    fn test_summary_embedded_positions_retained_unless_supplied() {
        let previous = merge_summary(
            None,
            &summary_update(json!({
                "uuid": "P1",
                "positions": [
                    { "securityUuid": "S1", "currentHoldings": 1, "purchaseValue": 1, "currentValue": 2 },
                    { "securityUuid": "BAD" }
                ]
            })),
        );
        assert_eq!(previous.positions.as_ref().map(Vec::len), Some(1));

        let merged = merge_summary(
            Some(&previous),
            &summary_update(json!({ "uuid": "P1", "name": "Renamed" })),
        );
        assert_eq!(merged.positions, previous.positions);
    }

    #[test]
    fn test_summary_set_drops_records_without_uuid() {
        let previous: Vec<PortfolioSummary> = Vec::new();
        let merged = merge_summary_set(
            &previous,
            &[
                summary_update(json!({ "name": "No identity" })),
                summary_update(json!({ "uuid": "P2", "name": "Second" })),
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].uuid, "P2");
    }
}
