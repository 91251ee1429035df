pub mod auth;
pub mod response;

pub use auth::{require_auth, Authenticator, TokenSource};
pub use response::{ApiResponse, ApiResult};

use axum::{http::StatusCode, response::IntoResponse, response::Response};

use crate::error::ApiError;

/// Gives axum's bodiless 405 the same JSON shape as every other failure
pub async fn json_method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        let allow = response.headers().get(axum::http::header::ALLOW).cloned();
        let mut replaced = ApiError::MethodNotAllowed.into_response();
        if let Some(allow) = allow {
            replaced.headers_mut().insert(axum::http::header::ALLOW, allow);
        }
        return replaced;
    }
    response
}
