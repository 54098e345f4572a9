//! Expression submission and lookup for authenticated clients.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use abacus_core::{Expression, ExpressionId};

use crate::auth::AuthUser;
use crate::state::AppState;

use super::{bad_request, internal_error, not_found, require_json, unprocessable, ApiResult};

// ── Types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub id: ExpressionId,
}

#[derive(Debug, Serialize)]
pub struct ExpressionsResponse {
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Serialize)]
pub struct ExpressionResponse {
    pub expression: Expression,
}

// ── Handlers ─────────────────────────────────────────────────────

/// POST /api/v1/calculate -- compile and enqueue an expression.
pub async fn calculate(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CalculateResponse>)> {
    let req = require_json(payload)?;
    if req.expression.trim().is_empty() {
        return Err(unprocessable("expression is empty"));
    }
    let expression = req.expression.as_str();

    match state.scheduler.submit(expression, user_id).await {
        Ok(id) => Ok((StatusCode::ACCEPTED, Json(CalculateResponse { id }))),
        Err(e) => {
            warn!(user_id, expression, error = %e, "Rejected expression");
            Err(internal_error(e))
        }
    }
}

/// GET /api/v1/expressions -- the caller's expressions, ascending by id.
pub async fn expressions_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<ExpressionsResponse>> {
    let expressions = state
        .expressions
        .list_for_user(user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(ExpressionsResponse { expressions }))
}

/// GET /api/v1/expressions/{id} -- one of the caller's expressions.
pub async fn expression_by_id(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<ExpressionResponse>> {
    let id: ExpressionId = raw_id
        .parse()
        .map_err(|_| bad_request(format!("invalid expression id: {}", raw_id)))?;

    let expression = state
        .expressions
        .get_for_user(id, user_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("expression not found"))?;

    info!(expression_id = id, status = %expression.status, "Expression fetched");
    Ok(Json(ExpressionResponse { expression }))
}
