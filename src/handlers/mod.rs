// Handlers are grouped by the credential they need:
// public (none) → protected (cookie or bearer token) → elevated (ADMIN bearer token)
pub mod elevated;
pub mod protected;
pub mod public;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Decodes a JSON body, reporting malformed input as a 400
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("rejected request body: {}", e);
        ApiError::bad_request("Invalid JSON body")
    })
}
