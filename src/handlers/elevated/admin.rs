use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::database::models::{UserFilter, UserStatusFilter};
use crate::error::{ApiError, FieldError};
use crate::handlers::parse_json;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AccountError, PageQuery, PageRequest};
use crate::types::Role;

/// `search`, `status` and `role` from the query string. Unknown status or
/// role values are ignored rather than rejected.
fn user_filter(raw: Option<&str>) -> UserFilter {
    let mut filter = UserFilter::default();
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "search" if filter.search.is_none() && !value.is_empty() => {
                filter.search = Some(value.into_owned())
            }
            "status" if filter.status.is_none() => filter.status = UserStatusFilter::parse(&value),
            "role" if filter.role.is_none() => filter.role = Role::parse(&value),
            _ => {}
        }
    }
    filter
}

/// GET /api/admin/users - filtered, paginated account listing
pub async fn users(State(state): State<AppState>, RawQuery(raw): RawQuery) -> ApiResult<Value> {
    let request = PageRequest::from_query(&PageQuery::parse(raw.as_deref()), &state.api);
    let filter = user_filter(raw.as_deref());

    let page = state.listing.users(&filter, request).await?;
    let users: Vec<_> = page.items.iter().map(|u| u.profile()).collect();

    Ok(ApiResponse::success(json!({
        "users": users,
        "pagination": {
            "total": page.total_items,
            "currentPage": page.current_page,
            "totalPages": page.total_pages,
            "limit": request.limit,
        }
    })))
}

/// GET /api/admin/pending-users - verified members awaiting approval
pub async fn pending_users(State(state): State<AppState>, RawQuery(raw): RawQuery) -> ApiResult<Value> {
    let request = PageRequest::from_query(&PageQuery::parse(raw.as_deref()), &state.api);
    let page = state
        .listing
        .users(&UserFilter::pending_approval(), request)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "pending user listing failed");
            ApiError::internal_server_error("Could not retrieve pending users. Please try again later.")
        })?;
    let users: Vec<_> = page.items.iter().map(|u| u.profile()).collect();

    Ok(ApiResponse::success(json!({
        "users": users,
        "pagination": {
            "total": page.total_items,
            "pages": page.total_pages,
            "currentPage": page.current_page,
            "perPage": request.limit,
        }
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeactivateBody {
    user_id: Option<String>,
    deactivation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody {
    user_id: Option<String>,
}

fn required_user_id(user_id: Option<String>) -> Result<String, ApiError> {
    user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation_error(vec![FieldError::new("userId", "User ID is required")]))
}

fn lifecycle_error(err: AccountError, fallback: &'static str) -> ApiError {
    match err {
        AccountError::Store(e) => {
            tracing::error!(error = %e, "account lifecycle store failure");
            ApiError::internal_server_error(fallback)
        }
        other => other.into(),
    }
}

/// POST /api/admin/deactivate-user - `{userId, deactivationReason?}`
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<Value> {
    let body: DeactivateBody = parse_json(&body)?;
    let user_id = required_user_id(body.user_id)?;
    let reason = body.deactivation_reason.filter(|r| !r.trim().is_empty());

    let user = state
        .accounts
        .deactivate(&user_id, reason)
        .await
        .map_err(|e| lifecycle_error(e, "Could not deactivate user. Please try again later."))?;

    info!(admin = %admin.identity, user_id = %user.id, "admin deactivated user");
    Ok(ApiResponse::message("User deactivated successfully"))
}

/// POST /api/admin/reactivate-user - `{userId}`
pub async fn reactivate_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<Value> {
    let body: UserIdBody = parse_json(&body)?;
    let user_id = required_user_id(body.user_id)?;

    let user = state
        .accounts
        .reactivate(&user_id)
        .await
        .map_err(|e| lifecycle_error(e, "Could not reactivate user. Please try again later."))?;

    info!(admin = %admin.identity, user_id = %user.id, "admin reactivated user");
    Ok(ApiResponse::message("User reactivated successfully"))
}

/// POST /api/admin/approve-user - `{userId}`
pub async fn approve_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<Value> {
    let body: UserIdBody = parse_json(&body)?;
    let user_id = required_user_id(body.user_id)?;

    let user = state
        .accounts
        .approve(&user_id)
        .await
        .map_err(|e| lifecycle_error(e, "Could not approve user. Please try again later."))?;

    info!(admin = %admin.identity, user_id = %user.id, "admin approved user");
    Ok(ApiResponse::message("User approved successfully"))
}
