//! Purchase order and goods receiving models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purchase order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    /// Sent to the supplier, goods not yet fully received
    Ordered,
    /// Every line has been posted to the warehouse ledger
    InWarehouse,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Ordered => "ordered",
            OrderStatus::InWarehouse => "in_warehouse",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(OrderStatus::Draft),
            "ordered" => Some(OrderStatus::Ordered),
            "in_warehouse" => Some(OrderStatus::InWarehouse),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Where a receiving line came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceivingSource {
    /// Delivery against a purchase order line
    PurchaseOrder { po_number: String },
    /// Ad hoc purchase paid from petty cash
    PettyCash { expense_id: i64 },
}

impl ReceivingSource {
    /// Reference string stored on warehouse entries created from this line
    pub fn reference(&self) -> String {
        match self {
            ReceivingSource::PurchaseOrder { po_number } => po_number.clone(),
            ReceivingSource::PettyCash { expense_id } => expense_id.to_string(),
        }
    }

    pub fn po_number(&self) -> Option<&str> {
        match self {
            ReceivingSource::PurchaseOrder { po_number } => Some(po_number),
            ReceivingSource::PettyCash { .. } => None,
        }
    }
}

/// A received-goods line awaiting (or after) posting to the warehouse ledger
///
/// `product_id` is optional because legacy receiving rows exist without a
/// product mapping; posting rejects such lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivingLine {
    pub id: i64,
    pub source: ReceivingSource,
    pub product_id: Option<i64>,
    pub branch_id: i64,
    pub qty: Decimal,
    pub unit_price: Option<Decimal>,
    pub received_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
