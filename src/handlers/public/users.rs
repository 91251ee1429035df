use axum::{body::Bytes, extract::State};
use serde_json::Value;

use crate::app::AppState;
use crate::error::{ApiError, FieldError};
use crate::handlers::{is_valid_email, parse_json};
use crate::middleware::{ApiResponse, ApiResult};

/// POST /api/users/request-reactivation - ask for a deactivated account back
///
/// Always answers 200 once the body validates, whether or not the address
/// belongs to an account, so the endpoint cannot be used to probe for emails.
pub async fn request_reactivation(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let body: Value = parse_json(&body)?;
    let email = validate_email_field(&body)?;

    let outcome = state.accounts.request_reactivation(email).await.map_err(|e| {
        tracing::error!(error = %e, "reactivation request failed");
        ApiError::internal_server_error("Could not process your request. Please try again later.")
    })?;

    Ok(ApiResponse::message(outcome.message()))
}

fn validate_email_field(body: &Value) -> Result<&str, ApiError> {
    let error = match body.get("email") {
        None | Some(Value::Null) => FieldError::new("email", "Required"),
        Some(Value::String(email)) if is_valid_email(email) => return Ok(email),
        Some(Value::String(_)) => FieldError::new("email", "Invalid email address"),
        Some(_) => FieldError::new("email", "Expected string"),
    };
    Err(ApiError::validation_error(vec![error]))
}
