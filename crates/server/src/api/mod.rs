//! Domain-focused API endpoint modules.
//!
//! Each sub-module owns a single responsibility area.
//! Shared error types and helpers live here in mod.rs.

mod expressions;
mod health;
mod tasks;
mod users;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

// ── Helpers ──────────────────────────────────────────────────────

fn error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: msg.into() }))
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub(crate) fn not_found(msg: impl Into<String>) -> ApiError {
    error(StatusCode::NOT_FOUND, msg)
}

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    error(StatusCode::BAD_REQUEST, msg)
}

pub(crate) fn unprocessable(msg: impl Into<String>) -> ApiError {
    error(StatusCode::UNPROCESSABLE_ENTITY, msg)
}

pub(crate) fn unauthorized(msg: impl Into<String>) -> ApiError {
    error(StatusCode::UNAUTHORIZED, msg)
}

pub(crate) fn conflict(msg: impl Into<String>) -> ApiError {
    error(StatusCode::CONFLICT, msg)
}

/// Unwrap a JSON body, turning every rejection into a 422.
pub(crate) fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| unprocessable(format!("unprocessable entity: {}", e.body_text())))
}

// ── Re-exports ───────────────────────────────────────────────────

pub use expressions::{calculate, expression_by_id, expressions_list};
pub use health::health;
pub use tasks::{task_claim, task_result};
pub use users::{login, register};
