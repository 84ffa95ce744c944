//! Posting saga for receiving goods into the warehouse
//!
//! Records a received line in the warehouse ledger and, when it completes a
//! purchase order, flips the order status. The two writes cross store-level
//! transaction boundaries, so the flow is an explicit saga: strictly
//! sequential steps, a duplicate guard up front, and a compensating delete
//! when the status update fails after the ledger insert committed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{
    NewWarehouseEntry, OrderStatus, ReceivingLine, ReceivingSource, WarehouseSource,
};
use shared::validation::validate_received_quantity;

use crate::error::{AppError, AppResult};
use crate::services::warehouse::receiving_source;

/// Duplicate-detection tuple for a posted receiving line
///
/// Two posting attempts collide exactly when every component matches. The
/// guard is advisory (check-then-act, no locking); a true concurrent
/// double-submission can still race it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryFingerprint {
    pub product_id: i64,
    pub branch_code: String,
    pub source_type: WarehouseSource,
    pub source_reference: String,
    pub qty_in: Decimal,
    pub date: NaiveDate,
}

/// Store operations the posting saga needs
///
/// Backed by PostgreSQL in production; tests substitute an in-memory store
/// with failure injection.
#[async_trait]
pub trait PostingStore: Send + Sync {
    async fn receiving_line(&self, id: i64) -> AppResult<Option<ReceivingLine>>;
    async fn branch_code(&self, branch_id: i64) -> AppResult<Option<String>>;
    /// Number of ledger entries matching the fingerprint
    async fn matching_entries(&self, fingerprint: &EntryFingerprint) -> AppResult<i64>;
    /// Latest running balance for (product, branch code); zero when the
    /// ledger has no entry yet
    async fn latest_balance(&self, product_id: i64, branch_code: &str) -> AppResult<Decimal>;
    async fn insert_entry(&self, entry: &NewWarehouseEntry) -> AppResult<i64>;
    async fn delete_entry(&self, entry_id: i64) -> AppResult<()>;
    async fn order_lines(&self, po_number: &str) -> AppResult<Vec<ReceivingLine>>;
    async fn set_order_status(&self, po_number: &str, status: OrderStatus) -> AppResult<()>;
}

/// Saga steps in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStep {
    Validate,
    DuplicateCheck,
    ReadBalance,
    InsertEntry,
    OrderBarrier,
    UpdateOrderStatus,
    CompensateEntry,
}

impl PostingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingStep::Validate => "validate",
            PostingStep::DuplicateCheck => "duplicate_check",
            PostingStep::ReadBalance => "read_balance",
            PostingStep::InsertEntry => "insert_entry",
            PostingStep::OrderBarrier => "order_barrier",
            PostingStep::UpdateOrderStatus => "update_order_status",
            PostingStep::CompensateEntry => "compensate_entry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// One audit record per attempted step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: PostingStep,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Terminal state of a posting attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingState {
    Committed,
    RolledBack,
}

/// Result of a committed posting
#[derive(Debug, Clone, Serialize)]
pub struct PostingOutcome {
    pub state: PostingState,
    pub entry_id: i64,
    /// True when this line completed its purchase order
    pub order_status_changed: bool,
    pub steps: Vec<StepRecord>,
}

#[derive(Debug, Default)]
struct SagaLog {
    steps: Vec<StepRecord>,
}

impl SagaLog {
    fn completed(&mut self, step: PostingStep) {
        self.steps.push(StepRecord {
            step,
            status: StepStatus::Completed,
            detail: None,
        });
    }

    fn completed_with(&mut self, step: PostingStep, detail: String) {
        self.steps.push(StepRecord {
            step,
            status: StepStatus::Completed,
            detail: Some(detail),
        });
    }

    fn failed(&mut self, step: PostingStep, detail: &str) {
        self.steps.push(StepRecord {
            step,
            status: StepStatus::Failed,
            detail: Some(detail.to_string()),
        });
    }
}

/// Validated inputs carried through the saga
struct PreparedLine {
    product_id: i64,
    branch_code: String,
    fingerprint: EntryFingerprint,
}

/// Posting transaction coordinator
pub struct PostingService<S: PostingStore> {
    store: S,
}

impl PostingService<PgPostingStore> {
    /// Create a PostingService backed by PostgreSQL
    pub fn new(db: PgPool) -> Self {
        Self {
            store: PgPostingStore::new(db),
        }
    }
}

impl<S: PostingStore> PostingService<S> {
    /// Create a PostingService over any store implementation
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Post one receiving line to the warehouse ledger
    ///
    /// Steps are strictly sequential; each precondition depends on the
    /// previous step's committed effect. Failures after the ledger insert
    /// trigger a compensating delete. Re-invoking for an already-posted line
    /// hits the duplicate guard and mutates nothing.
    pub async fn post_receiving_line(
        &self,
        actor: Uuid,
        line_id: i64,
    ) -> AppResult<PostingOutcome> {
        let mut log = SagaLog::default();

        let line = self
            .store
            .receiving_line(line_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Receiving line".to_string()))?;

        let prepared = match self.validate(actor, &line).await {
            Ok(prepared) => {
                log.completed(PostingStep::Validate);
                prepared
            }
            Err(e) => {
                log.failed(PostingStep::Validate, &e.to_string());
                self.log_rollback(line_id, &log);
                return Err(e);
            }
        };

        let duplicates = self.store.matching_entries(&prepared.fingerprint).await?;
        if duplicates > 0 {
            log.failed(PostingStep::DuplicateCheck, "matching ledger entry exists");
            self.log_rollback(line_id, &log);
            return Err(AppError::AlreadyPosted(format!(
                "{} ({})",
                prepared.fingerprint.source_reference, prepared.fingerprint.date
            )));
        }
        log.completed(PostingStep::DuplicateCheck);

        let previous_balance = self
            .store
            .latest_balance(prepared.product_id, &prepared.branch_code)
            .await?;
        let new_balance = previous_balance + line.qty;
        log.completed_with(
            PostingStep::ReadBalance,
            format!("balance {} -> {}", previous_balance, new_balance),
        );

        let entry = NewWarehouseEntry {
            product_id: prepared.product_id,
            branch_code: prepared.branch_code.clone(),
            date: line.received_date,
            qty_in: line.qty,
            qty_out: Decimal::ZERO,
            running_balance: new_balance,
            source_type: prepared.fingerprint.source_type,
            source_reference: Some(prepared.fingerprint.source_reference.clone()),
            created_by: actor,
        };

        let entry_id = match self.store.insert_entry(&entry).await {
            Ok(id) => {
                log.completed_with(PostingStep::InsertEntry, format!("entry {}", id));
                id
            }
            Err(e) => {
                // Nothing committed yet, nothing to compensate
                log.failed(PostingStep::InsertEntry, &e.to_string());
                self.log_rollback(line_id, &log);
                return Err(AppError::PostingFailed {
                    step: PostingStep::InsertEntry.as_str().to_string(),
                    message: e.to_string(),
                });
            }
        };

        let mut order_status_changed = false;
        if let ReceivingSource::PurchaseOrder { po_number } = &line.source {
            match self.order_complete(po_number).await {
                Ok(true) => {
                    log.completed_with(PostingStep::OrderBarrier, "all lines posted".to_string());
                    match self
                        .store
                        .set_order_status(po_number, OrderStatus::InWarehouse)
                        .await
                    {
                        Ok(()) => {
                            log.completed(PostingStep::UpdateOrderStatus);
                            order_status_changed = true;
                        }
                        Err(e) => {
                            return self
                                .roll_back(line_id, entry_id, PostingStep::UpdateOrderStatus, e, log)
                                .await;
                        }
                    }
                }
                Ok(false) => {
                    log.completed_with(
                        PostingStep::OrderBarrier,
                        "order has unposted lines".to_string(),
                    );
                }
                Err(e) => {
                    return self
                        .roll_back(line_id, entry_id, PostingStep::OrderBarrier, e, log)
                        .await;
                }
            }
        }

        tracing::info!(
            "Posted receiving line {} as warehouse entry {} (order closed: {})",
            line_id,
            entry_id,
            order_status_changed
        );

        Ok(PostingOutcome {
            state: PostingState::Committed,
            entry_id,
            order_status_changed,
            steps: log.steps,
        })
    }

    /// Precondition checks before any write
    async fn validate(&self, actor: Uuid, line: &ReceivingLine) -> AppResult<PreparedLine> {
        if actor.is_nil() {
            return Err(AppError::Validation {
                field: "actor".to_string(),
                message: "Actor identity is required".to_string(),
                message_id: "Identitas pengguna wajib diisi".to_string(),
            });
        }

        let product_id = line.product_id.ok_or_else(|| AppError::Validation {
            field: "product_id".to_string(),
            message: "Receiving line has no product mapping".to_string(),
            message_id: "Baris penerimaan tidak memiliki produk".to_string(),
        })?;

        validate_received_quantity(line.qty).map_err(|msg| AppError::Validation {
            field: "qty".to_string(),
            message: msg.to_string(),
            message_id: "Jumlah harus lebih dari nol".to_string(),
        })?;

        let branch_code = self
            .store
            .branch_code(line.branch_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Branch".to_string()))?;

        let fingerprint = line_fingerprint(line, product_id, &branch_code);

        Ok(PreparedLine {
            product_id,
            branch_code,
            fingerprint,
        })
    }

    /// Fan-in barrier: true when every line of the order has a matching
    /// ledger entry
    ///
    /// Lines without a product mapping or with an unknown branch can never
    /// match, so they hold the barrier open.
    async fn order_complete(&self, po_number: &str) -> AppResult<bool> {
        let lines = self.store.order_lines(po_number).await?;
        for line in &lines {
            let Some(product_id) = line.product_id else {
                return Ok(false);
            };
            let Some(branch_code) = self.store.branch_code(line.branch_id).await? else {
                return Ok(false);
            };
            let fingerprint = line_fingerprint(line, product_id, &branch_code);
            if self.store.matching_entries(&fingerprint).await? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compensate a committed ledger insert after a later step failed
    async fn roll_back(
        &self,
        line_id: i64,
        entry_id: i64,
        failed_step: PostingStep,
        original: AppError,
        mut log: SagaLog,
    ) -> AppResult<PostingOutcome> {
        log.failed(failed_step, &original.to_string());

        match self.store.delete_entry(entry_id).await {
            Ok(()) => {
                log.completed_with(
                    PostingStep::CompensateEntry,
                    format!("deleted entry {}", entry_id),
                );
                self.log_rollback(line_id, &log);
                Err(AppError::PostingFailed {
                    step: failed_step.as_str().to_string(),
                    message: format!("{}; ledger entry was rolled back", original),
                })
            }
            Err(compensation) => {
                log.failed(PostingStep::CompensateEntry, &compensation.to_string());
                self.log_rollback(line_id, &log);
                // Both failures surfaced together for manual reconciliation
                Err(AppError::CompensationFailed {
                    step: failed_step.as_str().to_string(),
                    original: original.to_string(),
                    compensation: compensation.to_string(),
                })
            }
        }
    }

    fn log_rollback(&self, line_id: i64, log: &SagaLog) {
        tracing::error!(
            "Posting saga for receiving line {} did not commit: {:?}",
            line_id,
            log.steps
        );
    }
}

/// Duplicate-detection fingerprint for one receiving line
fn line_fingerprint(line: &ReceivingLine, product_id: i64, branch_code: &str) -> EntryFingerprint {
    let source_type = match &line.source {
        ReceivingSource::PurchaseOrder { .. } => WarehouseSource::PurchaseOrder,
        ReceivingSource::PettyCash { .. } => WarehouseSource::PettyCash,
    };
    EntryFingerprint {
        product_id,
        branch_code: branch_code.to_string(),
        source_type,
        source_reference: line.source.reference(),
        qty_in: line.qty,
        date: line.received_date,
    }
}

/// PostgreSQL-backed posting store
#[derive(Clone)]
pub struct PgPostingStore {
    db: PgPool,
}

impl PgPostingStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct ReceivingLineRow {
    id: i64,
    po_number: Option<String>,
    expense_id: Option<i64>,
    product_id: Option<i64>,
    branch_id: i64,
    qty: Decimal,
    unit_price: Option<Decimal>,
    received_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReceivingLineRow> for ReceivingLine {
    type Error = AppError;

    fn try_from(row: ReceivingLineRow) -> Result<Self, Self::Error> {
        let source = receiving_source(row.po_number, row.expense_id)?;
        Ok(ReceivingLine {
            id: row.id,
            source,
            product_id: row.product_id,
            branch_id: row.branch_id,
            qty: row.qty,
            unit_price: row.unit_price,
            received_date: row.received_date,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PostingStore for PgPostingStore {
    async fn receiving_line(&self, id: i64) -> AppResult<Option<ReceivingLine>> {
        let row = sqlx::query_as::<_, ReceivingLineRow>(
            r#"
            SELECT id, po_number, expense_id, product_id, branch_id, qty,
                   unit_price, received_date, created_at
            FROM receiving_lines
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn branch_code(&self, branch_id: i64) -> AppResult<Option<String>> {
        let code = sqlx::query_scalar::<_, String>("SELECT code FROM branches WHERE id = $1")
            .bind(branch_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(code)
    }

    async fn matching_entries(&self, fingerprint: &EntryFingerprint) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM warehouse_entries
            WHERE product_id = $1
              AND branch_code = $2
              AND source_type = $3
              AND source_reference = $4
              AND qty_in = $5
              AND date = $6
            "#,
        )
        .bind(fingerprint.product_id)
        .bind(&fingerprint.branch_code)
        .bind(fingerprint.source_type.as_str())
        .bind(&fingerprint.source_reference)
        .bind(fingerprint.qty_in)
        .bind(fingerprint.date)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn latest_balance(&self, product_id: i64, branch_code: &str) -> AppResult<Decimal> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT running_balance
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
        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    async fn insert_entry(&self, entry: &NewWarehouseEntry) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO warehouse_entries (
                product_id, branch_code, date, qty_in, qty_out,
                running_balance, source_type, source_reference, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(entry.product_id)
        .bind(&entry.branch_code)
        .bind(entry.date)
        .bind(entry.qty_in)
        .bind(entry.qty_out)
        .bind(entry.running_balance)
        .bind(entry.source_type.as_str())
        .bind(&entry.source_reference)
        .bind(entry.created_by)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn delete_entry(&self, entry_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM warehouse_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn order_lines(&self, po_number: &str) -> AppResult<Vec<ReceivingLine>> {
        let rows = sqlx::query_as::<_, ReceivingLineRow>(
            r#"
            SELECT id, po_number, expense_id, product_id, branch_id, qty,
                   unit_price, received_date, created_at
            FROM receiving_lines
            WHERE po_number = $1
            ORDER BY id
            "#,
        )
        .bind(po_number)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_order_status(&self, po_number: &str, status: OrderStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE purchase_orders SET status = $2 WHERE po_number = $1")
            .bind(po_number)
            .bind(status.as_str())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Purchase order".to_string()));
        }
        Ok(())
    }
}
