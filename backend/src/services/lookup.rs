//! In-memory lookup indices for the reconciliation calculator
//!
//! One reconciliation query bulk-fetches every row set it could touch, then
//! builds typed keyed maps so the per-snapshot computation never goes back to
//! the database. Join keys are structs rather than composed strings so the
//! equality semantics (notably trimmed branch names) are type-checked.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use shared::models::{
    default_tolerance_percentage, Branch, Product, ProductionConsumption, ProductionConversion,
    ResolvedName, SalesRecord, StockSnapshot, ToleranceSetting, WarehouseEntry,
};

/// Sales join key: (date, product, branch display name)
///
/// The POS sales feed and the branch registry are maintained independently
/// and whitespace drift between them is expected, so names are trimmed on
/// both sides of the join.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SalesKey {
    pub date: NaiveDate,
    pub product_id: i64,
    pub branch_name: String,
}

impl SalesKey {
    pub fn new(date: NaiveDate, product_id: i64, branch_name: &str) -> Self {
        Self {
            date,
            product_id,
            branch_name: branch_name.trim().to_string(),
        }
    }
}

/// Production-usage join key: (product, date, branch display name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductionKey {
    pub product_id: i64,
    pub date: NaiveDate,
    pub branch_name: String,
}

impl ProductionKey {
    pub fn new(product_id: i64, date: NaiveDate, branch_name: &str) -> Self {
        Self {
            product_id,
            date,
            branch_name: branch_name.trim().to_string(),
        }
    }
}

/// Warehouse grouping key: (product, branch code)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StockKey {
    pub product_id: i64,
    pub branch_code: String,
}

impl StockKey {
    pub fn new(product_id: i64, branch_code: &str) -> Self {
        Self {
            product_id,
            branch_code: branch_code.to_string(),
        }
    }
}

/// Bulk-fetched row sets for one reconciliation query
#[derive(Debug, Default)]
pub struct SourceRows {
    pub products: Vec<Product>,
    pub branches: Vec<Branch>,
    pub tolerances: Vec<ToleranceSetting>,
    pub warehouse_entries: Vec<WarehouseEntry>,
    pub sales: Vec<SalesRecord>,
    pub production: Vec<ProductionConsumption>,
    pub conversions: Vec<ProductionConversion>,
    pub snapshots: Vec<StockSnapshot>,
}

/// Keyed indices over one query's row sets
///
/// Pure data structure; building it has no side effects. Every accessor
/// treats a missing row as zero (or a placeholder name), never as an error.
pub struct LookupIndex {
    products: HashMap<i64, Product>,
    branches: HashMap<i64, Branch>,
    name_by_code: HashMap<String, String>,
    code_by_name: HashMap<String, String>,
    tolerances: HashMap<(i64, i64), Decimal>,
    /// Sorted latest-first by (date, created_at) for cutoff retrieval
    warehouse: HashMap<StockKey, Vec<WarehouseEntry>>,
    sales: HashMap<SalesKey, Decimal>,
    production: HashMap<ProductionKey, Decimal>,
    conversions: HashMap<(i64, NaiveDate), Decimal>,
    ready: HashMap<(i64, i64, NaiveDate), Decimal>,
}

impl LookupIndex {
    pub fn build(rows: &SourceRows) -> Self {
        let products: HashMap<i64, Product> =
            rows.products.iter().map(|p| (p.id, p.clone())).collect();
        let branches: HashMap<i64, Branch> =
            rows.branches.iter().map(|b| (b.id, b.clone())).collect();

        let mut name_by_code = HashMap::new();
        let mut code_by_name = HashMap::new();
        for branch in rows.branches.iter() {
            name_by_code.insert(branch.code.clone(), branch.name.clone());
            code_by_name.insert(branch.name.trim().to_string(), branch.code.clone());
        }

        let tolerances: HashMap<(i64, i64), Decimal> = rows
            .tolerances
            .iter()
            .map(|t| ((t.product_id, t.branch_id), t.tolerance_percentage))
            .collect();

        let mut warehouse: HashMap<StockKey, Vec<WarehouseEntry>> = HashMap::new();
        for entry in rows.warehouse_entries.iter() {
            warehouse
                .entry(StockKey::new(entry.product_id, &entry.branch_code))
                .or_default()
                .push(entry.clone());
        }
        for entries in warehouse.values_mut() {
            entries.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
        }

        let mut sales: HashMap<SalesKey, Decimal> = HashMap::new();
        for record in rows.sales.iter() {
            let key = SalesKey::new(record.date, record.product_id, &record.branch_name);
            *sales.entry(key).or_insert(Decimal::ZERO) += record.qty_sold;
        }

        let mut production: HashMap<ProductionKey, Decimal> = HashMap::new();
        for row in rows.production.iter() {
            let key = ProductionKey::new(row.product_id, row.date, &row.branch_name);
            *production.entry(key).or_insert(Decimal::ZERO) += row.qty_used;
        }

        let mut conversions: HashMap<(i64, NaiveDate), Decimal> = HashMap::new();
        for row in rows.conversions.iter() {
            *conversions
                .entry((row.product_id, row.date))
                .or_insert(Decimal::ZERO) += row.qty_converted;
        }

        let ready: HashMap<(i64, i64, NaiveDate), Decimal> = rows
            .snapshots
            .iter()
            .map(|s| ((s.product_id, s.branch_id, s.date), s.on_hand_qty))
            .collect();

        Self {
            products,
            branches,
            name_by_code,
            code_by_name,
            tolerances,
            warehouse,
            sales,
            production,
            conversions,
            ready,
        }
    }

    pub fn product_name(&self, id: i64) -> ResolvedName {
        match self.products.get(&id) {
            Some(p) => ResolvedName::Known(p.name.clone()),
            None => ResolvedName::fallback_product(id),
        }
    }

    pub fn branch(&self, id: i64) -> Option<&Branch> {
        self.branches.get(&id)
    }

    pub fn branch_name(&self, id: i64) -> ResolvedName {
        match self.branches.get(&id) {
            Some(b) => ResolvedName::Known(b.name.clone()),
            None => ResolvedName::fallback_branch(id),
        }
    }

    /// Branch display name for a branch code, from the registry map
    pub fn branch_name_for_code(&self, code: &str) -> Option<&str> {
        self.name_by_code.get(code).map(String::as_str)
    }

    /// Branch code for a (trimmed) branch display name
    pub fn branch_code_for_name(&self, name: &str) -> Option<&str> {
        self.code_by_name.get(name.trim()).map(String::as_str)
    }

    /// Tolerance percentage for (product, branch), falling back to the
    /// platform default
    pub fn tolerance_percentage(&self, product_id: i64, branch_id: i64) -> Decimal {
        self.tolerances
            .get(&(product_id, branch_id))
            .copied()
            .unwrap_or_else(default_tolerance_percentage)
    }

    /// Warehouse running balance as of `cutoff` (inclusive)
    ///
    /// Picks the entry with the maximum (date, created_at) among entries
    /// dated on or before the cutoff; zero when no entry qualifies.
    pub fn warehouse_on_hand(&self, product_id: i64, branch_code: &str, cutoff: NaiveDate) -> Decimal {
        self.warehouse
            .get(&StockKey::new(product_id, branch_code))
            .and_then(|entries| entries.iter().find(|e| e.date <= cutoff))
            .map(|e| e.running_balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of warehouse receipts dated exactly `date`
    pub fn inbound_on(&self, product_id: i64, branch_code: &str, date: NaiveDate) -> Decimal {
        self.warehouse
            .get(&StockKey::new(product_id, branch_code))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.date == date)
                    .map(|e| e.qty_in)
                    .sum()
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Recorded POS sales for (date, product, branch name); zero if absent
    pub fn sold_qty(&self, date: NaiveDate, product_id: i64, branch_name: &str) -> Decimal {
        self.sales
            .get(&SalesKey::new(date, product_id, branch_name))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Branch-level production usage for (product, date, branch name)
    pub fn production_qty(&self, product_id: i64, date: NaiveDate, branch_name: &str) -> Decimal {
        self.production
            .get(&ProductionKey::new(product_id, date, branch_name))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Cross-branch production conversion for (product, date)
    pub fn conversion_qty(&self, product_id: i64, date: NaiveDate) -> Decimal {
        self.conversions
            .get(&(product_id, date))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Branch stock count ("ready") for (product, branch, date); zero if the
    /// branch submitted no count that day
    pub fn ready_qty(&self, product_id: i64, branch_id: i64, date: NaiveDate) -> Decimal {
        self.ready
            .get(&(product_id, branch_id, date))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
