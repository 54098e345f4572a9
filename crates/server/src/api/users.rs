//! Registration and login.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use abacus_core::AbacusError;

use crate::state::AppState;

use super::{bad_request, internal_error, require_json, unauthorized, ApiResult, MessageResponse};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

fn require_credentials(
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Credentials> {
    let creds = require_json(payload)?;
    if creds.login.trim().is_empty() || creds.password.is_empty() {
        return Err(unauthorized("login or password can't be empty"));
    }
    Ok(creds)
}

/// POST /api/v1/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let creds = require_credentials(payload)?;
    let login = creds.login.trim();

    match state.users.create(login, &creds.password).await {
        Ok(user_id) => {
            info!(user_id, login, "User registered");
            Ok(MessageResponse::new("user registered"))
        }
        Err(e @ AbacusError::UserExists) => Err(bad_request(e.to_string())),
        Err(e) => Err(internal_error(e)),
    }
}

/// POST /api/v1/login -- exchange credentials for a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let creds = require_credentials(payload)?;

    let user = match state.users.authenticate(creds.login.trim(), &creds.password).await {
        Ok(user) => user,
        Err(e @ AbacusError::Auth(_)) => return Err(unauthorized(e.to_string())),
        Err(e) => return Err(internal_error(e)),
    };

    let token = state.tokens.issue(user.id).map_err(internal_error)?;
    info!(user_id = user.id, "User logged in");
    Ok(Json(TokenResponse { token }))
}
