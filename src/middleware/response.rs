use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Successful response with `"success": true` merged into the payload.
///
/// Object payloads are flattened (`{"success": true, "items": [...]}`);
/// anything else is nested under `data`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }
}

impl ApiResponse<Value> {
    /// `{"success": true}` with nothing else
    pub fn ok() -> Self {
        Self::success(Value::Object(Map::new()))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::success(json!({ "message": message.into() }))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let body = match serde_json::to_value(&self.data) {
            Ok(Value::Object(fields)) => {
                let mut envelope = Map::with_capacity(fields.len() + 1);
                envelope.insert("success".to_string(), Value::Bool(true));
                envelope.extend(fields);
                Value::Object(envelope)
            }
            Ok(other) => json!({ "success": true, "data": other }),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return ApiError::internal().into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
