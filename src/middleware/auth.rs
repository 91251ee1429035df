use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{AuthError, AuthUser, TokenVerifier};
use crate::error::ApiError;
use crate::types::Role;

/// Where a route accepts its credential from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cookie,
    Bearer,
    /// Cookie first, then the Authorization header
    CookieOrBearer,
}

/// Route-group authentication settings, used as middleware state
#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<TokenVerifier>,
    cookie_name: Arc<str>,
    source: TokenSource,
    required_role: Option<Role>,
}

impl Authenticator {
    pub fn new(verifier: Arc<TokenVerifier>, cookie_name: &str) -> Self {
        Self {
            verifier,
            cookie_name: Arc::from(cookie_name),
            source: TokenSource::CookieOrBearer,
            required_role: None,
        }
    }

    pub fn source(mut self, source: TokenSource) -> Self {
        self.source = source;
        self
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = extract_token(headers, self.source, &self.cookie_name);
        let user = self.verifier.authenticate(token.as_deref())?;

        match self.required_role {
            Some(role) if user.role != role => Err(AuthError::InsufficientRole),
            _ => Ok(user),
        }
    }
}

/// Validates the request credential and injects `AuthUser` into extensions
pub async fn require_auth(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = auth.authenticate(request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn extract_token(headers: &HeaderMap, source: TokenSource, cookie_name: &str) -> Option<String> {
    match source {
        TokenSource::Cookie => cookie_token(headers, cookie_name),
        TokenSource::Bearer => bearer_token(headers),
        TokenSource::CookieOrBearer => cookie_token(headers, cookie_name).or_else(|| bearer_token(headers)),
    }
}

/// Value of the named cookie; an empty value counts as absent
fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
