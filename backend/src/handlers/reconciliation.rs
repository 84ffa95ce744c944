//! HTTP handlers for stock reconciliation endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use shared::models::ReconciliationResult;
use shared::types::{DateRange, PaginatedResponse, Pagination};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::reconciliation::{ReconciliationQuery, ReconciliationService};
use crate::AppState;

/// Query parameters for the reconciliation report
#[derive(Debug, Deserialize)]
pub struct ReconciliationParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Comma-separated branch codes, e.g. `branches=JKT01,BDG02`
    pub branches: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Run the stock reconciliation for a date range
pub async fn get_reconciliation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(params): Query<ReconciliationParams>,
) -> AppResult<Json<PaginatedResponse<ReconciliationResult>>> {
    let start_date = params
        .start_date
        .ok_or_else(|| missing_date("start_date"))?;
    let end_date = params.end_date.ok_or_else(|| missing_date("end_date"))?;

    let branch_codes = params
        .branches
        .map(|raw| {
            raw.split(',')
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty())
                .collect::<Vec<String>>()
        })
        .filter(|codes| !codes.is_empty());

    let query = ReconciliationQuery {
        range: DateRange {
            start: start_date,
            end: end_date,
        },
        branch_codes,
        pagination: Pagination {
            page: params.page.unwrap_or(1),
            per_page: params.per_page.unwrap_or(50),
        },
    };

    let service = ReconciliationService::new(state.db);
    let results = service.reconcile(query).await?;
    Ok(Json(results))
}

fn missing_date(field: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: format!("{} is required", field),
        message_id: "Rentang tanggal wajib diisi".to_string(),
    }
}
