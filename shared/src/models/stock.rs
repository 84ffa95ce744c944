//! Daily stock data streams feeding reconciliation
//!
//! Four independent sources are joined by the reconciliation engine: branch
//! stock counts, POS sales exports, kitchen production usage, and central
//! production conversions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily stock count submitted by a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub id: i64,
    pub product_id: i64,
    pub branch_id: i64,
    pub date: NaiveDate,
    /// Sellable stock on hand at the branch ("ready")
    pub on_hand_qty: Decimal,
    /// Quantity discarded during the day ("waste")
    pub waste_qty: Decimal,
}

/// One day of POS sales for a product at a branch
///
/// `branch_name` comes from the POS export and may carry stray whitespace;
/// lookup keys trim it before matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub product_id: i64,
    pub branch_name: String,
    pub qty_sold: Decimal,
}

/// Raw material consumed by kitchen production at a branch on a given day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConsumption {
    pub product_id: i64,
    pub date: NaiveDate,
    pub branch_name: String,
    pub qty_used: Decimal,
}

/// Product quantity converted by central production on a given day
///
/// Conversions are recorded per product and date only; they are not tied to
/// a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConversion {
    pub product_id: i64,
    pub date: NaiveDate,
    pub qty_converted: Decimal,
}

/// Variance tolerance configured for a product at a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceSetting {
    pub product_id: i64,
    pub branch_id: i64,
    /// Allowed variance as a percentage of sold quantity
    pub tolerance_percentage: Decimal,
}

/// Tolerance applied when no per-product setting exists (percent)
pub fn default_tolerance_percentage() -> Decimal {
    Decimal::from(5)
}
