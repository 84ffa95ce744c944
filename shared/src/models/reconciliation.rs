//! Reconciliation result models and the variance formulas
//!
//! The daily reconciliation joins four independently recorded data streams
//! (stock counts, warehouse ledger, POS sales, production usage) and derives
//! how much stock actually left each branch. The formulas live here so the
//! backend and reporting jobs agree on the arithmetic.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A registry name lookup that may have missed
///
/// Reconciliation never fails on an unknown product or branch id; it reports
/// a synthetic placeholder instead. The variant keeps placeholders
/// distinguishable from genuine registry data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedName {
    Known(String),
    Fallback { id: i64, placeholder: String },
}

impl ResolvedName {
    pub fn fallback_product(id: i64) -> Self {
        ResolvedName::Fallback {
            id,
            placeholder: format!("Product {id}"),
        }
    }

    pub fn fallback_branch(id: i64) -> Self {
        ResolvedName::Fallback {
            id,
            placeholder: format!("Branch {id}"),
        }
    }

    pub fn display(&self) -> &str {
        match self {
            ResolvedName::Known(name) => name,
            ResolvedName::Fallback { placeholder, .. } => placeholder,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolvedName::Known(_))
    }
}

/// Outcome of the tolerance check for one reconciliation row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VarianceStatus {
    /// Variance within the tolerance band
    Ok,
    /// Shortage: less stock left than the records account for
    Kurang,
    /// Surplus: more stock left than the records account for
    Lebih,
}

impl VarianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarianceStatus::Ok => "OK",
            VarianceStatus::Kurang => "KURANG",
            VarianceStatus::Lebih => "LEBIH",
        }
    }
}

impl std::fmt::Display for VarianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symmetric allowed-variance window, rounded to one decimal for reporting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToleranceBand {
    pub lower: Decimal,
    pub upper: Decimal,
}

impl ToleranceBand {
    pub fn from_value(tolerance_value: Decimal) -> Self {
        let rounded = tolerance_value.round_dp(1);
        Self {
            lower: -rounded,
            upper: rounded,
        }
    }
}

impl std::fmt::Display for ToleranceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.1}, {:.1}]", self.lower, self.upper)
    }
}

/// One reconciled (product, branch, day) row
///
/// Derived on every query from the source streams; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub date: NaiveDate,
    pub product_id: i64,
    pub product_name: ResolvedName,
    pub branch_id: i64,
    /// Absent when the branch id is missing from the registry
    pub branch_code: Option<String>,
    pub branch_name: ResolvedName,
    /// Sellable stock counted at the branch today
    pub ready_qty: Decimal,
    pub waste_qty: Decimal,
    /// Warehouse running balance as of today ("gudang")
    pub warehouse_qty: Decimal,
    /// Warehouse receipts dated exactly today
    pub inbound_qty: Decimal,
    pub stock_yesterday: Decimal,
    pub stock_today: Decimal,
    /// Recorded POS sales ("hasil ESB")
    pub sold_qty: Decimal,
    /// Branch-level production usage
    pub production_qty: Decimal,
    /// Cross-branch production conversion for this product and day
    pub conversion_qty: Decimal,
    pub keluar_form: Decimal,
    pub selisih: Decimal,
    pub tolerance_percentage: Decimal,
    pub tolerance_range: ToleranceBand,
    pub status: VarianceStatus,
}

/// Derived goods-out for one (product, branch, day)
///
/// `(stock_yesterday + inbound_today) - (stock_today + waste) + conversion_today`.
/// Stock figures combine branch counts with the warehouse running balance;
/// the conversion term re-adds stock that central production transformed
/// rather than sold.
pub fn keluar_form(
    stock_yesterday: Decimal,
    inbound_today: Decimal,
    stock_today: Decimal,
    waste: Decimal,
    conversion_today: Decimal,
) -> Decimal {
    (stock_yesterday + inbound_today) - (stock_today + waste) + conversion_today
}

/// Signed variance between recorded outflows and the derived goods-out
///
/// `sold - keluar_form + production`. Zero in a perfectly reconciled system;
/// negative means a shortage, positive a surplus.
pub fn variance(sold: Decimal, keluar_form: Decimal, production: Decimal) -> Decimal {
    sold - keluar_form + production
}

/// Allowed absolute variance, anchored to sales volume (not to the variance
/// itself)
pub fn tolerance_value(sold: Decimal, tolerance_percentage: Decimal) -> Decimal {
    sold.abs() * tolerance_percentage / Decimal::from(100)
}

/// Classify a variance against an allowed absolute tolerance
pub fn classify_variance(selisih: Decimal, tolerance_value: Decimal) -> VarianceStatus {
    if selisih.abs() <= tolerance_value {
        VarianceStatus::Ok
    } else if selisih < Decimal::ZERO {
        VarianceStatus::Kurang
    } else {
        VarianceStatus::Lebih
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_keluar_form_formula() {
        // stock dropped from 140 to 130 with 20 inbound, 2 waste, 5 converted
        let out = keluar_form(dec("140"), dec("20"), dec("130"), dec("2"), dec("5"));
        assert_eq!(out, dec("33"));
    }

    #[test]
    fn test_keluar_form_translation_invariant() {
        let base = keluar_form(dec("140"), dec("20"), dec("130"), dec("2"), dec("5"));
        let shifted = keluar_form(
            dec("140") + dec("37.5"),
            dec("20"),
            dec("130") + dec("37.5"),
            dec("2"),
            dec("5"),
        );
        assert_eq!(base, shifted);
    }

    #[test]
    fn test_variance_formula() {
        assert_eq!(variance(dec("60"), dec("33"), dec("3")), dec("30"));
        assert_eq!(variance(dec("10"), dec("15"), dec("2")), dec("-3"));
    }

    #[test]
    fn test_tolerance_anchored_to_sales() {
        assert_eq!(tolerance_value(dec("60"), dec("5")), dec("3"));
        // negative sales still give a positive band
        assert_eq!(tolerance_value(dec("-60"), dec("5")), dec("3"));
        assert_eq!(tolerance_value(dec("0"), dec("5")), dec("0"));
    }

    #[test]
    fn test_classify_variance_boundaries() {
        let tol = dec("3");
        assert_eq!(classify_variance(dec("0"), tol), VarianceStatus::Ok);
        assert_eq!(classify_variance(dec("3"), tol), VarianceStatus::Ok);
        assert_eq!(classify_variance(dec("-3"), tol), VarianceStatus::Ok);
        assert_eq!(classify_variance(dec("3.01"), tol), VarianceStatus::Lebih);
        assert_eq!(classify_variance(dec("-3.01"), tol), VarianceStatus::Kurang);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(VarianceStatus::Ok.to_string(), "OK");
        assert_eq!(VarianceStatus::Kurang.to_string(), "KURANG");
        assert_eq!(VarianceStatus::Lebih.to_string(), "LEBIH");
    }

    #[test]
    fn test_tolerance_band_rounding_and_display() {
        let band = ToleranceBand::from_value(dec("3.04"));
        assert_eq!(band.lower, dec("-3.0"));
        assert_eq!(band.upper, dec("3.0"));
        assert_eq!(band.to_string(), "[-3.0, 3.0]");

        let band = ToleranceBand::from_value(dec("2"));
        assert_eq!(band.to_string(), "[-2.0, 2.0]");
    }

    #[test]
    fn test_resolved_name_fallbacks() {
        let name = ResolvedName::fallback_product(7);
        assert_eq!(name.display(), "Product 7");
        assert!(!name.is_resolved());

        let name = ResolvedName::fallback_branch(12);
        assert_eq!(name.display(), "Branch 12");

        let name = ResolvedName::Known("Tomat".to_string());
        assert_eq!(name.display(), "Tomat");
        assert!(name.is_resolved());
    }
}
