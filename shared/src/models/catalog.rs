//! Product and branch registry models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw material or menu item tracked by the warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    /// Internal SKU, e.g. "RM-0042"
    pub code: Option<String>,
    pub name: String,
    /// Stock-keeping unit of measure, e.g. "kg", "pcs", "liter"
    pub unit: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A restaurant branch (outlet)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    /// Short branch code, e.g. "JKT01"
    pub code: String,
    /// Display name as it appears in POS exports, e.g. "Kemang"
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
