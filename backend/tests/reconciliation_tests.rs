//! Stock reconciliation tests
//!
//! Tests for the daily variance calculation including:
//! - Derived goods-out (keluar form) from stock counts and the ledger
//! - Variance classification against tolerance bands
//! - Lookback-buffer handling at the window edges
//! - Join behavior across untrimmed branch names and missing streams

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use resto_backoffice_backend::services::lookup::{LookupIndex, SourceRows};
use resto_backoffice_backend::services::reconciliation::{compute_results, reconcile_snapshot};
use shared::models::{
    classify_variance, keluar_form, tolerance_value, variance, Branch, Product,
    ProductionConsumption, ProductionConversion, SalesRecord, StockSnapshot, ToleranceBand,
    ToleranceSetting, VarianceStatus, WarehouseEntry, WarehouseSource,
};
use shared::types::DateRange;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn product(id: i64, name: &str) -> Product {
    Product {
        id,
        code: Some(format!("RM-{:04}", id)),
        name: name.to_string(),
        unit: Some("kg".to_string()),
        active: true,
        created_at: Utc::now(),
    }
}

fn branch(id: i64, code: &str, name: &str) -> Branch {
    Branch {
        id,
        code: code.to_string(),
        name: name.to_string(),
        active: true,
        created_at: Utc::now(),
    }
}

fn snapshot(
    id: i64,
    product_id: i64,
    branch_id: i64,
    day: NaiveDate,
    ready: &str,
    waste: &str,
) -> StockSnapshot {
    StockSnapshot {
        id,
        product_id,
        branch_id,
        date: day,
        on_hand_qty: dec(ready),
        waste_qty: dec(waste),
    }
}

fn wh_entry(
    id: i64,
    product_id: i64,
    branch_code: &str,
    day: NaiveDate,
    hour: u32,
    qty_in: &str,
    balance: &str,
) -> WarehouseEntry {
    WarehouseEntry {
        id,
        product_id,
        branch_code: branch_code.to_string(),
        date: day,
        qty_in: dec(qty_in),
        qty_out: Decimal::ZERO,
        running_balance: dec(balance),
        source_type: WarehouseSource::PurchaseOrder,
        source_reference: Some("PO-2024-00001".to_string()),
        created_by: None,
        created_at: Utc
            .with_ymd_and_hms(day.year(), day.month(), day.day(), hour, 0, 0)
            .unwrap(),
    }
}

/// Two days of data for product 7 at branch 1 (JKT01 / Kemang):
/// day 8 is the lookback buffer, day 9 is the reporting day.
fn worked_example() -> SourceRows {
    SourceRows {
        products: vec![product(7, "Tomat")],
        branches: vec![branch(1, "JKT01", "Kemang")],
        tolerances: vec![ToleranceSetting {
            product_id: 7,
            branch_id: 1,
            tolerance_percentage: dec("5"),
        }],
        warehouse_entries: vec![
            wh_entry(1, 7, "JKT01", date(2024, 3, 8), 9, "100", "100"),
            wh_entry(2, 7, "JKT01", date(2024, 3, 9), 8, "20", "120"),
        ],
        sales: vec![SalesRecord {
            date: date(2024, 3, 9),
            product_id: 7,
            branch_name: "Kemang".to_string(),
            qty_sold: dec("60"),
        }],
        production: vec![ProductionConsumption {
            product_id: 7,
            date: date(2024, 3, 9),
            branch_name: "Kemang".to_string(),
            qty_used: dec("3"),
        }],
        conversions: vec![ProductionConversion {
            product_id: 7,
            date: date(2024, 3, 9),
            qty_converted: dec("5"),
        }],
        snapshots: vec![
            snapshot(1, 7, 1, date(2024, 3, 8), "40", "0"),
            snapshot(2, 7, 1, date(2024, 3, 9), "10", "2"),
        ],
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_worked_example_full_row() {
        let rows = worked_example();
        let index = LookupIndex::build(&rows);
        let result = reconcile_snapshot(&index, &rows.snapshots[1]);

        // stock_yesterday = ready(8th) 40 + warehouse balance as of the 8th 100
        assert_eq!(result.stock_yesterday, dec("140"));
        // stock_today = ready(9th) 10 + warehouse balance as of the 9th 120
        assert_eq!(result.stock_today, dec("130"));
        assert_eq!(result.warehouse_qty, dec("120"));
        assert_eq!(result.inbound_qty, dec("20"));
        // keluar = (140 + 20) - (130 + 2) + 5
        assert_eq!(result.keluar_form, dec("33"));
        assert_eq!(result.sold_qty, dec("60"));
        assert_eq!(result.production_qty, dec("3"));
        assert_eq!(result.conversion_qty, dec("5"));
        // selisih = 60 - 33 + 3
        assert_eq!(result.selisih, dec("30"));
        // 5% of 60 sold
        assert_eq!(result.tolerance_percentage, dec("5"));
        assert_eq!(result.tolerance_range, ToleranceBand::from_value(dec("3")));
        assert_eq!(result.status, VarianceStatus::Lebih);

        assert_eq!(result.branch_code.as_deref(), Some("JKT01"));
        assert_eq!(result.product_name.display(), "Tomat");
        assert_eq!(result.branch_name.display(), "Kemang");
        assert!(result.product_name.is_resolved());
    }

    #[test]
    fn test_buffer_day_feeds_yesterday_but_is_not_reported() {
        let rows = worked_example();
        let index = LookupIndex::build(&rows);
        let range = DateRange {
            start: date(2024, 3, 9),
            end: date(2024, 3, 9),
        };

        let results = compute_results(&index, &rows.snapshots, range);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].date, date(2024, 3, 9));
        // The excluded buffer row still supplied yesterday's stock
        assert_eq!(results[0].stock_yesterday, dec("140"));
    }

    #[test]
    fn test_window_start_of_history_reads_zero_yesterday() {
        let rows = worked_example();
        let index = LookupIndex::build(&rows);
        let range = DateRange {
            start: date(2024, 3, 8),
            end: date(2024, 3, 9),
        };

        let results = compute_results(&index, &rows.snapshots, range);

        assert_eq!(results.len(), 2);
        // Nothing exists before the 8th, so every d-1 component is zero
        assert_eq!(results[0].date, date(2024, 3, 8));
        assert_eq!(results[0].stock_yesterday, Decimal::ZERO);
    }

    #[test]
    fn test_variance_exactly_at_tolerance_is_ok() {
        let rows = SourceRows {
            products: vec![product(7, "Tomat")],
            branches: vec![branch(1, "JKT01", "Kemang")],
            sales: vec![SalesRecord {
                date: date(2024, 3, 9),
                product_id: 7,
                branch_name: "Kemang".to_string(),
                qty_sold: dec("60"),
            }],
            snapshots: vec![
                snapshot(1, 7, 1, date(2024, 3, 8), "100", "0"),
                snapshot(2, 7, 1, date(2024, 3, 9), "43", "0"),
            ],
            ..Default::default()
        };
        let index = LookupIndex::build(&rows);
        let result = reconcile_snapshot(&index, &rows.snapshots[1]);

        // keluar = 100 - 43 = 57, selisih = 60 - 57 = 3, default tolerance 5% of 60 = 3
        assert_eq!(result.selisih, dec("3"));
        assert_eq!(result.status, VarianceStatus::Ok);
    }

    #[test]
    fn test_missing_streams_read_as_zero() {
        let rows = SourceRows {
            snapshots: vec![snapshot(1, 7, 9, date(2024, 3, 9), "10", "0")],
            ..Default::default()
        };
        let index = LookupIndex::build(&rows);
        let result = reconcile_snapshot(&index, &rows.snapshots[0]);

        assert_eq!(result.stock_yesterday, Decimal::ZERO);
        assert_eq!(result.inbound_qty, Decimal::ZERO);
        assert_eq!(result.sold_qty, Decimal::ZERO);
        assert_eq!(result.keluar_form, dec("-10"));
        assert_eq!(result.selisih, dec("10"));
        // No sales means a zero-width band
        assert_eq!(result.tolerance_range, ToleranceBand::from_value(Decimal::ZERO));
        assert_eq!(result.status, VarianceStatus::Lebih);

        // Unknown registry ids degrade to placeholders, not errors
        assert_eq!(result.branch_code, None);
        assert_eq!(result.product_name.display(), "Product 7");
        assert_eq!(result.branch_name.display(), "Branch 9");
    }

    #[test]
    fn test_unknown_branch_still_receives_conversion() {
        // Conversions are keyed by product and date only, so a snapshot whose
        // branch is missing from the registry still gets the conversion term.
        let rows = SourceRows {
            conversions: vec![ProductionConversion {
                product_id: 7,
                date: date(2024, 3, 9),
                qty_converted: dec("5"),
            }],
            snapshots: vec![snapshot(1, 7, 9, date(2024, 3, 9), "10", "0")],
            ..Default::default()
        };
        let index = LookupIndex::build(&rows);
        let result = reconcile_snapshot(&index, &rows.snapshots[0]);

        assert_eq!(result.conversion_qty, dec("5"));
        assert_eq!(result.keluar_form, dec("-5"));
    }

    #[test]
    fn test_untrimmed_names_still_join() {
        // Registry name carries a trailing space, feed names carry leading
        // and trailing spaces; the joins normalize both sides.
        let rows = SourceRows {
            branches: vec![branch(1, "JKT01", "Kemang ")],
            sales: vec![SalesRecord {
                date: date(2024, 3, 9),
                product_id: 7,
                branch_name: " Kemang".to_string(),
                qty_sold: dec("60"),
            }],
            production: vec![ProductionConsumption {
                product_id: 7,
                date: date(2024, 3, 9),
                branch_name: " Kemang ".to_string(),
                qty_used: dec("3"),
            }],
            snapshots: vec![snapshot(1, 7, 1, date(2024, 3, 9), "10", "0")],
            ..Default::default()
        };
        let index = LookupIndex::build(&rows);
        let result = reconcile_snapshot(&index, &rows.snapshots[0]);

        assert_eq!(result.sold_qty, dec("60"));
        assert_eq!(result.production_qty, dec("3"));
    }

    #[test]
    fn test_results_ordered_by_date_branch_product() {
        let rows = SourceRows {
            branches: vec![branch(1, "JKT01", "Kemang"), branch(2, "BDG02", "Dago")],
            snapshots: vec![
                snapshot(1, 8, 1, date(2024, 3, 10), "1", "0"),
                snapshot(2, 7, 2, date(2024, 3, 9), "1", "0"),
                snapshot(3, 7, 1, date(2024, 3, 10), "1", "0"),
                snapshot(4, 7, 1, date(2024, 3, 9), "1", "0"),
            ],
            ..Default::default()
        };
        let index = LookupIndex::build(&rows);
        let range = DateRange {
            start: date(2024, 3, 9),
            end: date(2024, 3, 10),
        };

        let results = compute_results(&index, &rows.snapshots, range);
        let order: Vec<(NaiveDate, Option<String>, i64)> = results
            .iter()
            .map(|r| (r.date, r.branch_code.clone(), r.product_id))
            .collect();

        assert_eq!(
            order,
            vec![
                (date(2024, 3, 9), Some("BDG02".to_string()), 7),
                (date(2024, 3, 9), Some("JKT01".to_string()), 7),
                (date(2024, 3, 10), Some("JKT01".to_string()), 7),
                (date(2024, 3, 10), Some("JKT01".to_string()), 8),
            ]
        );
    }

    #[test]
    fn test_shortage_is_classified_kurang() {
        // Stock left the branch without matching sales or production
        let rows = SourceRows {
            products: vec![product(7, "Tomat")],
            branches: vec![branch(1, "JKT01", "Kemang")],
            sales: vec![SalesRecord {
                date: date(2024, 3, 9),
                product_id: 7,
                branch_name: "Kemang".to_string(),
                qty_sold: dec("10"),
            }],
            snapshots: vec![
                snapshot(1, 7, 1, date(2024, 3, 8), "50", "0"),
                snapshot(2, 7, 1, date(2024, 3, 9), "30", "0"),
            ],
            ..Default::default()
        };
        let index = LookupIndex::build(&rows);
        let result = reconcile_snapshot(&index, &rows.snapshots[1]);

        // keluar = 50 - 30 = 20 but only 10 were sold
        assert_eq!(result.selisih, dec("-10"));
        assert_eq!(result.status, VarianceStatus::Kurang);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for non-negative quantities with two decimal places
    fn qty_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=1_000_000).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for signed quantities with two decimal places
    fn signed_qty_strategy() -> impl Strategy<Value = Decimal> {
        (-1_000_000i64..=1_000_000).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for tolerance percentages (0.00 to 100.00)
    fn pct_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=10_000).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Status is OK exactly when |selisih| fits the tolerance value
        #[test]
        fn prop_status_partitions_on_tolerance(
            sold in signed_qty_strategy(),
            keluar in signed_qty_strategy(),
            production in qty_strategy(),
            pct in pct_strategy()
        ) {
            let selisih = variance(sold, keluar, production);
            let tolerance = tolerance_value(sold, pct);
            let status = classify_variance(selisih, tolerance);

            if selisih.abs() <= tolerance {
                prop_assert_eq!(status, VarianceStatus::Ok);
            } else if selisih < Decimal::ZERO {
                prop_assert_eq!(status, VarianceStatus::Kurang);
            } else {
                prop_assert_eq!(status, VarianceStatus::Lebih);
            }
        }

        /// Shifting both stock levels by the same amount leaves keluar unchanged
        #[test]
        fn prop_keluar_translation_invariant(
            stock_yesterday in signed_qty_strategy(),
            inbound in qty_strategy(),
            stock_today in signed_qty_strategy(),
            waste in qty_strategy(),
            conversion in qty_strategy(),
            delta in signed_qty_strategy()
        ) {
            let base = keluar_form(stock_yesterday, inbound, stock_today, waste, conversion);
            let shifted = keluar_form(
                stock_yesterday + delta,
                inbound,
                stock_today + delta,
                waste,
                conversion,
            );
            prop_assert_eq!(base, shifted);
        }

        /// Records that account for every unit reconcile to OK at any tolerance
        #[test]
        fn prop_consistent_records_are_ok(
            keluar in signed_qty_strategy(),
            production in qty_strategy(),
            pct in pct_strategy()
        ) {
            let sold = keluar - production;
            let selisih = variance(sold, keluar, production);
            prop_assert_eq!(selisih, Decimal::ZERO);

            let status = classify_variance(selisih, tolerance_value(sold, pct));
            prop_assert_eq!(status, VarianceStatus::Ok);
        }

        /// The tolerance value ignores the sign of the sales figure
        #[test]
        fn prop_tolerance_sign_independent(
            sold in signed_qty_strategy(),
            pct in pct_strategy()
        ) {
            let tolerance = tolerance_value(sold, pct);
            prop_assert!(tolerance >= Decimal::ZERO);
            prop_assert_eq!(tolerance, tolerance_value(-sold, pct));
        }

        /// The reported band is symmetric around zero
        #[test]
        fn prop_band_symmetric(value in qty_strategy()) {
            let band = ToleranceBand::from_value(value);
            prop_assert_eq!(band.lower, -band.upper);
            prop_assert_eq!(band.upper, value.round_dp(1));
        }

        /// A snapshot with no other data reconciles to selisih = ready + waste
        #[test]
        fn prop_lone_snapshot_variance(
            ready in qty_strategy(),
            waste in qty_strategy()
        ) {
            let rows = SourceRows {
                snapshots: vec![StockSnapshot {
                    id: 1,
                    product_id: 7,
                    branch_id: 1,
                    date: date(2024, 3, 9),
                    on_hand_qty: ready,
                    waste_qty: waste,
                }],
                ..Default::default()
            };
            let index = LookupIndex::build(&rows);
            let result = reconcile_snapshot(&index, &rows.snapshots[0]);

            prop_assert_eq!(result.selisih, ready + waste);
            if ready + waste == Decimal::ZERO {
                prop_assert_eq!(result.status, VarianceStatus::Ok);
            } else {
                prop_assert_eq!(result.status, VarianceStatus::Lebih);
            }
        }
    }
}
