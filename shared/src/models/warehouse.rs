//! Warehouse ledger models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origin of a warehouse ledger entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseSource {
    /// Goods received against a purchase order
    PurchaseOrder,
    /// Goods bought ad hoc through petty cash
    PettyCash,
    /// Manual correction entered by back-office staff
    Manual,
}

impl WarehouseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseSource::PurchaseOrder => "PO",
            WarehouseSource::PettyCash => "PETTY_CASH",
            WarehouseSource::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PO" => Some(WarehouseSource::PurchaseOrder),
            "PETTY_CASH" => Some(WarehouseSource::PettyCash),
            "MANUAL" => Some(WarehouseSource::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for WarehouseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One movement in the warehouse stock ledger
///
/// `running_balance` is the on-hand quantity for this product at this branch
/// immediately after the movement was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseEntry {
    pub id: i64,
    pub product_id: i64,
    pub branch_code: String,
    pub date: NaiveDate,
    pub qty_in: Decimal,
    pub qty_out: Decimal,
    pub running_balance: Decimal,
    pub source_type: WarehouseSource,
    /// PO number or petty-cash expense id, depending on `source_type`
    pub source_reference: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Payload for appending a movement to the warehouse ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWarehouseEntry {
    pub product_id: i64,
    pub branch_code: String,
    pub date: NaiveDate,
    pub qty_in: Decimal,
    pub qty_out: Decimal,
    pub running_balance: Decimal,
    pub source_type: WarehouseSource,
    pub source_reference: Option<String>,
    pub created_by: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_codes_round_trip() {
        for source in [
            WarehouseSource::PurchaseOrder,
            WarehouseSource::PettyCash,
            WarehouseSource::Manual,
        ] {
            assert_eq!(WarehouseSource::parse(source.as_str()), Some(source));
            assert_eq!(source.to_string(), source.as_str());
        }
        assert_eq!(WarehouseSource::parse("UNKNOWN"), None);
    }
}
