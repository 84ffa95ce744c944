//! Daily stock reconciliation service
//!
//! Joins stock counts, the warehouse ledger, POS sales and production usage
//! into per-(product, branch, day) variance rows. Results are derived on
//! every query and never persisted.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use shared::models::{
    classify_variance, keluar_form, tolerance_value, variance, Branch, Product,
    ProductionConsumption, ProductionConversion, ReconciliationResult, SalesRecord, StockSnapshot,
    ToleranceBand, ToleranceSetting,
};
use shared::types::{DateRange, PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::validate_date_range;

use crate::error::{AppError, AppResult};
use crate::services::lookup::{LookupIndex, SourceRows};
use crate::services::warehouse::WarehouseEntryRow;

/// Reconciliation service joining the four stock data streams
#[derive(Clone)]
pub struct ReconciliationService {
    db: PgPool,
}

/// Parameters for one reconciliation query
#[derive(Debug, Clone)]
pub struct ReconciliationQuery {
    pub range: DateRange,
    /// Restrict results to these branch codes; `None` means all branches
    pub branch_codes: Option<Vec<String>>,
    pub pagination: Pagination,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    code: Option<String>,
    name: String,
    unit: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            code: row.code,
            name: row.name,
            unit: row.unit,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BranchRow {
    id: i64,
    code: String,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            code: row.code,
            name: row.name,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ToleranceRow {
    product_id: i64,
    branch_id: i64,
    tolerance_percentage: Decimal,
}

#[derive(Debug, FromRow)]
struct SalesRow {
    date: NaiveDate,
    product_id: i64,
    branch_name: String,
    qty_sold: Decimal,
}

#[derive(Debug, FromRow)]
struct ProductionRow {
    product_id: i64,
    date: NaiveDate,
    branch_name: String,
    qty_used: Decimal,
}

#[derive(Debug, FromRow)]
struct ConversionRow {
    product_id: i64,
    date: NaiveDate,
    qty_converted: Decimal,
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: i64,
    product_id: i64,
    branch_id: i64,
    date: NaiveDate,
    on_hand_qty: Decimal,
    waste_qty: Decimal,
}

impl From<SnapshotRow> for StockSnapshot {
    fn from(row: SnapshotRow) -> Self {
        StockSnapshot {
            id: row.id,
            product_id: row.product_id,
            branch_id: row.branch_id,
            date: row.date,
            on_hand_qty: row.on_hand_qty,
            waste_qty: row.waste_qty,
        }
    }
}

impl ReconciliationService {
    /// Create a new ReconciliationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Run the reconciliation for a date range
    pub async fn reconcile(
        &self,
        query: ReconciliationQuery,
    ) -> AppResult<PaginatedResponse<ReconciliationResult>> {
        validate_date_range(query.range.start, query.range.end).map_err(|msg| {
            AppError::Validation {
                field: "date_range".to_string(),
                message: msg.to_string(),
                message_id: "Tanggal akhir tidak boleh sebelum tanggal mulai".to_string(),
            }
        })?;

        let rows = self.fetch_rows(query.range).await?;

        // A window with no stock counts at all is "no data", not
        // reconciled-to-zero. Buffer-day rows do not count.
        if !rows.snapshots.iter().any(|s| query.range.contains(s.date)) {
            return Err(AppError::NotFound("Stock count data".to_string()));
        }

        tracing::debug!(
            "Reconciliation fan-out complete: {} snapshots, {} warehouse entries, {} sales rows",
            rows.snapshots.len(),
            rows.warehouse_entries.len(),
            rows.sales.len()
        );

        let index = LookupIndex::build(&rows);
        let mut results = compute_results(&index, &rows.snapshots, query.range);

        if let Some(codes) = &query.branch_codes {
            results.retain(|r| {
                r.branch_code
                    .as_deref()
                    .map(|code| codes.iter().any(|c| c == code))
                    .unwrap_or(false)
            });
        }

        let total_items = results.len() as u64;
        let data: Vec<ReconciliationResult> = results
            .into_iter()
            .skip(query.pagination.offset() as usize)
            .take(query.pagination.per_page as usize)
            .collect();

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&query.pagination, total_items),
        })
    }

    /// Bulk-fetch every row set for the query window concurrently
    ///
    /// All date-bounded streams include a one-day lookback buffer so the
    /// calculator's `d - 1` lookups never fall outside the fetched window.
    /// Warehouse entries are fetched for the whole history up to the window
    /// end because the running-balance cutoff may reach arbitrarily far back.
    async fn fetch_rows(&self, range: DateRange) -> AppResult<SourceRows> {
        let buffer_start = range
            .start
            .checked_sub_days(Days::new(1))
            .unwrap_or(range.start);
        let end = range.end;

        let (products, branches, tolerances, warehouse_rows, sales, production, conversions, snapshots) =
            tokio::try_join!(
                async {
                    sqlx::query_as::<_, ProductRow>(
                        "SELECT id, code, name, unit, active, created_at FROM products",
                    )
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, BranchRow>(
                        "SELECT id, code, name, active, created_at FROM branches",
                    )
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, ToleranceRow>(
                        "SELECT product_id, branch_id, tolerance_percentage FROM tolerance_settings",
                    )
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, WarehouseEntryRow>(
                        r#"
                        SELECT id, product_id, branch_code, date, qty_in, qty_out,
                               running_balance, source_type, source_reference,
                               created_by, created_at
                        FROM warehouse_entries
                        WHERE date <= $1
                        "#,
                    )
                    .bind(end)
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, SalesRow>(
                        r#"
                        SELECT date, product_id, branch_name, qty_sold
                        FROM sales_records
                        WHERE date BETWEEN $1 AND $2
                        "#,
                    )
                    .bind(buffer_start)
                    .bind(end)
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, ProductionRow>(
                        r#"
                        SELECT product_id, date, branch_name, qty_used
                        FROM production_consumption
                        WHERE date BETWEEN $1 AND $2
                        "#,
                    )
                    .bind(buffer_start)
                    .bind(end)
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, ConversionRow>(
                        r#"
                        SELECT product_id, date, qty_converted
                        FROM production_conversions
                        WHERE date BETWEEN $1 AND $2
                        "#,
                    )
                    .bind(buffer_start)
                    .bind(end)
                    .fetch_all(&self.db)
                    .await
                },
                async {
                    sqlx::query_as::<_, SnapshotRow>(
                        r#"
                        SELECT id, product_id, branch_id, date, on_hand_qty, waste_qty
                        FROM stock_snapshots
                        WHERE date BETWEEN $1 AND $2
                        "#,
                    )
                    .bind(buffer_start)
                    .bind(end)
                    .fetch_all(&self.db)
                    .await
                },
            )?;

        let warehouse_entries = warehouse_rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(SourceRows {
            products: products.into_iter().map(Into::into).collect(),
            branches: branches.into_iter().map(Into::into).collect(),
            tolerances: tolerances
                .into_iter()
                .map(|t| ToleranceSetting {
                    product_id: t.product_id,
                    branch_id: t.branch_id,
                    tolerance_percentage: t.tolerance_percentage,
                })
                .collect(),
            warehouse_entries,
            sales: sales
                .into_iter()
                .map(|s| SalesRecord {
                    date: s.date,
                    product_id: s.product_id,
                    branch_name: s.branch_name,
                    qty_sold: s.qty_sold,
                })
                .collect(),
            production: production
                .into_iter()
                .map(|p| ProductionConsumption {
                    product_id: p.product_id,
                    date: p.date,
                    branch_name: p.branch_name,
                    qty_used: p.qty_used,
                })
                .collect(),
            conversions: conversions
                .into_iter()
                .map(|c| ProductionConversion {
                    product_id: c.product_id,
                    date: c.date,
                    qty_converted: c.qty_converted,
                })
                .collect(),
            snapshots: snapshots.into_iter().map(Into::into).collect(),
        })
    }
}

/// Reconcile every snapshot in the window, excluding lookback-buffer rows
///
/// Output is ordered by (date, branch code, product id).
pub fn compute_results(
    index: &LookupIndex,
    snapshots: &[StockSnapshot],
    range: DateRange,
) -> Vec<ReconciliationResult> {
    let mut results: Vec<ReconciliationResult> = snapshots
        .iter()
        .filter(|s| range.contains(s.date))
        .map(|s| reconcile_snapshot(index, s))
        .collect();

    results.sort_by(|a, b| {
        (a.date, a.branch_code.as_deref(), a.product_id)
            .cmp(&(b.date, b.branch_code.as_deref(), b.product_id))
    });
    results
}

/// Reconcile a single stock snapshot against the other three data streams
pub fn reconcile_snapshot(index: &LookupIndex, snapshot: &StockSnapshot) -> ReconciliationResult {
    let product_id = snapshot.product_id;
    let branch_id = snapshot.branch_id;
    let today = snapshot.date;

    let branch = index.branch(branch_id);
    let branch_code = branch.map(|b| b.code.clone());
    let registry_branch_name = branch.map(|b| b.name.clone());

    // Calendar-day subtraction; dates carry no timezone so midnight drift
    // cannot occur. The far edge of the calendar leaves no previous day and
    // every d-1 component degrades to zero.
    let yesterday = today.checked_sub_days(Days::new(1));

    let warehouse_qty = match branch_code.as_deref() {
        Some(code) => index.warehouse_on_hand(product_id, code, today),
        None => Decimal::ZERO,
    };
    let inbound_qty = match branch_code.as_deref() {
        Some(code) => index.inbound_on(product_id, code, today),
        None => Decimal::ZERO,
    };

    let (ready_yesterday, warehouse_yesterday) = match yesterday {
        Some(prev) => {
            let ready = index.ready_qty(product_id, branch_id, prev);
            let warehouse = match branch_code.as_deref() {
                Some(code) => index.warehouse_on_hand(product_id, code, prev),
                None => Decimal::ZERO,
            };
            (ready, warehouse)
        }
        None => (Decimal::ZERO, Decimal::ZERO),
    };

    let stock_yesterday = ready_yesterday + warehouse_yesterday;
    let stock_today = snapshot.on_hand_qty + warehouse_qty;

    let sold_qty = match registry_branch_name.as_deref() {
        Some(name) => index.sold_qty(today, product_id, name),
        None => Decimal::ZERO,
    };

    // The production feed records branches by display name while snapshots
    // carry ids, so the name is resolved through the code -> name map.
    let production_qty = branch_code
        .as_deref()
        .and_then(|code| index.branch_name_for_code(code))
        .map(|name| index.production_qty(product_id, today, name))
        .unwrap_or(Decimal::ZERO);

    let conversion_qty = index.conversion_qty(product_id, today);

    let keluar = keluar_form(
        stock_yesterday,
        inbound_qty,
        stock_today,
        snapshot.waste_qty,
        conversion_qty,
    );
    let selisih = variance(sold_qty, keluar, production_qty);

    let tolerance_percentage = index.tolerance_percentage(product_id, branch_id);
    let tolerance = tolerance_value(sold_qty, tolerance_percentage);
    let status = classify_variance(selisih, tolerance);

    ReconciliationResult {
        date: today,
        product_id,
        product_name: index.product_name(product_id),
        branch_id,
        branch_code,
        branch_name: index.branch_name(branch_id),
        ready_qty: snapshot.on_hand_qty,
        waste_qty: snapshot.waste_qty,
        warehouse_qty,
        inbound_qty,
        stock_yesterday,
        stock_today,
        sold_qty,
        production_qty,
        conversion_qty,
        keluar_form: keluar,
        selisih,
        tolerance_percentage,
        tolerance_range: ToleranceBand::from_value(tolerance),
        status,
    }
}
