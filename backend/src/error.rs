//! Error handling for the Resto Back Office Platform
//!
//! Provides consistent error responses in English and Indonesian

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_id: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Posting errors
    #[error("Already posted: {0}")]
    AlreadyPosted(String),

    #[error("Posting failed at step {step}: {message}")]
    PostingFailed { step: String, message: String },

    #[error("Posting failed at step {step} and compensation failed: {original}; {compensation}")]
    CompensationFailed {
        step: String,
        original: String,
        compensation: String,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation {
                field,
                message,
                message_id,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_id: message_id.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_id: format!("{} tidak ditemukan", resource),
                    field: None,
                },
            ),
            AppError::AlreadyPosted(reference) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "ALREADY_POSTED".to_string(),
                    message_en: format!("Goods receipt already posted to warehouse: {}", reference),
                    message_id: format!("Penerimaan barang sudah diposting ke gudang: {}", reference),
                    field: None,
                },
            ),
            AppError::PostingFailed { step, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "POSTING_STEP_FAILED".to_string(),
                    message_en: format!("Posting failed at step '{}': {}", step, message),
                    message_id: format!("Posting gagal pada langkah '{}': {}", step, message),
                    field: Some(step.clone()),
                },
            ),
            AppError::CompensationFailed {
                step,
                original,
                compensation,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "COMPENSATION_FAILED".to_string(),
                    message_en: format!(
                        "Posting failed at step '{}' ({}) and the compensating delete also failed ({}); manual reconciliation required",
                        step, original, compensation
                    ),
                    message_id: format!(
                        "Posting gagal pada langkah '{}' ({}) dan pembatalan otomatis juga gagal ({}); perlu pemeriksaan manual",
                        step, original, compensation
                    ),
                    field: Some(step.clone()),
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_id: "Terjadi kesalahan pada basis data".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_id: "Terjadi kesalahan internal pada server".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_id: "Terjadi kesalahan internal pada server".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
