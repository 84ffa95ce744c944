//! HTTP handlers for warehouse ledger and goods receiving endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use shared::models::WarehouseEntry;
use shared::types::{PaginatedResponse, Pagination};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::posting::{PostingOutcome, PostingService};
use crate::services::warehouse::{EntryFilter, ReceivingLineView, StockBalance, WarehouseService};
use crate::AppState;

/// Query parameters for listing ledger entries
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub product_id: Option<i64>,
    pub branch_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List warehouse ledger entries, newest first
pub async fn list_entries(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListEntriesQuery>,
) -> AppResult<Json<PaginatedResponse<WarehouseEntry>>> {
    let service = WarehouseService::new(state.db);
    let filter = EntryFilter {
        product_id: query.product_id,
        branch_code: query.branch_code,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(50),
    };

    let entries = service.list_entries(filter, pagination).await?;
    Ok(Json(entries))
}

/// Query parameters for the balance endpoint
#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub product_id: Option<i64>,
    pub branch_code: Option<String>,
}

/// Current warehouse balance for a product at a branch
pub async fn get_balance(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<BalanceQuery>,
) -> AppResult<Json<StockBalance>> {
    let product_id = query
        .product_id
        .ok_or_else(|| missing_param("product_id"))?;
    let branch_code = query
        .branch_code
        .ok_or_else(|| missing_param("branch_code"))?;

    let service = WarehouseService::new(state.db);
    let balance = service.current_balance(product_id, &branch_code).await?;
    Ok(Json(balance))
}

/// Query parameters for the receiving worklist
#[derive(Debug, Deserialize)]
pub struct ReceivingQuery {
    pub date: Option<NaiveDate>,
    pub branch_id: Option<i64>,
}

/// Receiving worklist for a date, with per-line posting state
pub async fn list_receiving(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ReceivingQuery>,
) -> AppResult<Json<Vec<ReceivingLineView>>> {
    let date = query.date.ok_or_else(|| missing_param("date"))?;

    let service = WarehouseService::new(state.db);
    let lines = service.list_receiving(date, query.branch_id).await?;
    Ok(Json(lines))
}

/// Post a receiving line to the warehouse ledger
pub async fn post_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(line_id): Path<i64>,
) -> AppResult<Json<PostingOutcome>> {
    let service = PostingService::new(state.db);
    let outcome = service
        .post_receiving_line(current_user.0.user_id, line_id)
        .await?;
    Ok(Json(outcome))
}

fn missing_param(field: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: format!("{} is required", field),
        message_id: format!("Parameter {} wajib diisi", field),
    }
}
