//! Warehouse ledger read side
//!
//! Listing and balance queries over the append-only warehouse ledger, plus
//! the receiving worklist with its posted/unposted flag.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{ReceivingSource, WarehouseEntry, WarehouseSource};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::validate_branch_code;

use crate::error::{AppError, AppResult};

/// Warehouse ledger query service
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Row for warehouse ledger queries
#[derive(Debug, FromRow)]
pub(crate) struct WarehouseEntryRow {
    pub id: i64,
    pub product_id: i64,
    pub branch_code: String,
    pub date: NaiveDate,
    pub qty_in: Decimal,
    pub qty_out: Decimal,
    pub running_balance: Decimal,
    pub source_type: String,
    pub source_reference: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WarehouseEntryRow> for WarehouseEntry {
    type Error = AppError;

    fn try_from(row: WarehouseEntryRow) -> Result<Self, Self::Error> {
        let source_type = WarehouseSource::parse(&row.source_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown warehouse source type: {}", row.source_type))
        })?;
        Ok(WarehouseEntry {
            id: row.id,
            product_id: row.product_id,
            branch_code: row.branch_code,
            date: row.date,
            qty_in: row.qty_in,
            qty_out: row.qty_out,
            running_balance: row.running_balance,
            source_type,
            source_reference: row.source_reference,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

/// Build a typed receiving source from the nullable DB pair
///
/// The schema enforces exactly one of the two references; seeing neither is
/// data corruption, not user error.
pub(crate) fn receiving_source(
    po_number: Option<String>,
    expense_id: Option<i64>,
) -> AppResult<ReceivingSource> {
    match (po_number, expense_id) {
        (Some(po_number), _) => Ok(ReceivingSource::PurchaseOrder { po_number }),
        (None, Some(expense_id)) => Ok(ReceivingSource::PettyCash { expense_id }),
        (None, None) => Err(AppError::Internal(
            "Receiving line has neither PO number nor expense id".to_string(),
        )),
    }
}

/// Filter for listing ledger entries
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub product_id: Option<i64>,
    pub branch_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Current running balance for a product at a branch
#[derive(Debug, Clone, Serialize)]
pub struct StockBalance {
    pub product_id: i64,
    pub branch_code: String,
    pub running_balance: Decimal,
    /// Date of the latest ledger entry; `None` when the ledger is empty
    pub as_of: Option<NaiveDate>,
}

/// Receiving worklist row with its posting state
#[derive(Debug, Clone, Serialize)]
pub struct ReceivingLineView {
    pub id: i64,
    pub source: ReceivingSource,
    pub product_id: Option<i64>,
    pub branch_id: i64,
    pub branch_code: String,
    pub qty: Decimal,
    pub unit_price: Option<Decimal>,
    pub received_date: NaiveDate,
    /// Whether a matching ledger entry already exists
    pub posted: bool,
}

#[derive(Debug, FromRow)]
struct ReceivingViewRow {
    id: i64,
    po_number: Option<String>,
    expense_id: Option<i64>,
    product_id: Option<i64>,
    branch_id: i64,
    branch_code: String,
    qty: Decimal,
    unit_price: Option<Decimal>,
    received_date: NaiveDate,
    posted: bool,
}

#[derive(Debug, FromRow)]
struct BalanceRow {
    running_balance: Decimal,
    date: NaiveDate,
}

impl WarehouseService {
    /// Create a new WarehouseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List ledger entries, newest first
    pub async fn list_entries(
        &self,
        filter: EntryFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<WarehouseEntry>> {
        let total_items = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM warehouse_entries
            WHERE ($1::bigint IS NULL OR product_id = $1)
              AND ($2::text IS NULL OR branch_code = $2)
              AND ($3::date IS NULL OR date >= $3)
              AND ($4::date IS NULL OR date <= $4)
            "#,
        )
        .bind(filter.product_id)
        .bind(&filter.branch_code)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, WarehouseEntryRow>(
            r#"
            SELECT id, product_id, branch_code, date, qty_in, qty_out,
                   running_balance, source_type, source_reference,
                   created_by, created_at
            FROM warehouse_entries
            WHERE ($1::bigint IS NULL OR product_id = $1)
              AND ($2::text IS NULL OR branch_code = $2)
              AND ($3::date IS NULL OR date >= $3)
              AND ($4::date IS NULL OR date <= $4)
            ORDER BY date DESC, created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.product_id)
        .bind(&filter.branch_code)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(i64::from(pagination.per_page))
        .bind(pagination.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<AppResult<Vec<WarehouseEntry>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total_items as u64),
        })
    }

    /// Current running balance for a product at a branch
    ///
    /// An empty ledger reads as a zero balance, matching the calculator.
    pub async fn current_balance(
        &self,
        product_id: i64,
        branch_code: &str,
    ) -> AppResult<StockBalance> {
        validate_branch_code(branch_code).map_err(|msg| AppError::Validation {
            field: "branch_code".to_string(),
            message: msg.to_string(),
            message_id: "Kode cabang tidak valid".to_string(),
        })?;

        let latest = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT running_balance, date
            FROM warehouse_entries
            WHERE product_id = $1 AND branch_code = $2
            ORDER BY date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(branch_code)
        .fetch_optional(&self.db)
        .await?;

        Ok(match latest {
            Some(row) => StockBalance {
                product_id,
                branch_code: branch_code.to_string(),
                running_balance: row.running_balance,
                as_of: Some(row.date),
            },
            None => StockBalance {
                product_id,
                branch_code: branch_code.to_string(),
                running_balance: Decimal::ZERO,
                as_of: None,
            },
        })
    }

    /// Receiving worklist for a date, with each line's posting state
    ///
    /// A line is "posted" when a ledger entry matches its full fingerprint
    /// (product, branch code, source, reference, quantity, date). Lines
    /// without a product mapping can never match and read as unposted.
    pub async fn list_receiving(
        &self,
        received_date: NaiveDate,
        branch_id: Option<i64>,
    ) -> AppResult<Vec<ReceivingLineView>> {
        let rows = sqlx::query_as::<_, ReceivingViewRow>(
            r#"
            SELECT rl.id, rl.po_number, rl.expense_id, rl.product_id, rl.branch_id,
                   b.code AS branch_code, rl.qty, rl.unit_price, rl.received_date,
                   EXISTS (
                       SELECT 1 FROM warehouse_entries we
                       WHERE we.product_id = rl.product_id
                         AND we.branch_code = b.code
                         AND we.source_type =
                             CASE WHEN rl.po_number IS NOT NULL THEN 'PO' ELSE 'PETTY_CASH' END
                         AND we.source_reference = COALESCE(rl.po_number, rl.expense_id::text)
                         AND we.qty_in = rl.qty
                         AND we.date = rl.received_date
                   ) AS posted
            FROM receiving_lines rl
            JOIN branches b ON b.id = rl.branch_id
            WHERE rl.received_date = $1
              AND ($2::bigint IS NULL OR rl.branch_id = $2)
            ORDER BY rl.id
            "#,
        )
        .bind(received_date)
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let source = receiving_source(row.po_number, row.expense_id)?;
                Ok(ReceivingLineView {
                    id: row.id,
                    source,
                    product_id: row.product_id,
                    branch_id: row.branch_id,
                    branch_code: row.branch_code,
                    qty: row.qty,
                    unit_price: row.unit_price,
                    received_date: row.received_date,
                    posted: row.posted,
                })
            })
            .collect()
    }
}
