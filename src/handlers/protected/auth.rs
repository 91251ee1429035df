use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/auth/me - profile of the token holder
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let account = state
        .store
        .find_user(user.identity.as_str())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(json!({ "user": account.profile() })))
}
