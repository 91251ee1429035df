use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::types::{Identity, Role};

/// Claims written into every token this service issues
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, role: Role, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id: user_id.into(),
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

/// What a presented token is decoded into before it is trusted.
/// Every field is optional so a structurally valid token lacking `userId`
/// can be told apart from one that fails to decode at all.
#[derive(Debug, Deserialize)]
struct PresentedClaims {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    role: Option<String>,
}

/// Outcome of checking a single token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified { identity: Identity, role: Role },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Expired,
    BadSignature,
    Malformed,
    MissingIdentity,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Expired => "expired",
            RejectReason::BadSignature => "bad_signature",
            RejectReason::Malformed => "malformed",
            RejectReason::MissingIdentity => "missing_identity",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken(RejectReason),

    #[error("Insufficient permissions")]
    InsufficientRole,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,
}

/// Authenticated caller, as handlers see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub identity: Identity,
    pub role: Role,
}

/// Signs and verifies HS256 bearer tokens with a single shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_hours: u64,
    has_secret: bool,
}

impl TokenVerifier {
    pub fn new(secret: &str, expiry_hours: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_hours,
            has_secret: !secret.is_empty(),
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(&security.jwt_secret, security.jwt_expiry_hours)
    }

    /// Pure check of one token; never touches the store
    pub fn verify(&self, token: &str) -> Verification {
        let data = match decode::<PresentedClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => RejectReason::Expired,
                    ErrorKind::InvalidSignature => RejectReason::BadSignature,
                    _ => RejectReason::Malformed,
                };
                return Verification::Rejected { reason };
            }
        };

        match data.claims.user_id {
            Some(user_id) if !user_id.is_empty() => Verification::Verified {
                identity: Identity::new(user_id),
                role: data.claims.role.as_deref().and_then(Role::parse).unwrap_or_default(),
            },
            _ => Verification::Rejected {
                reason: RejectReason::MissingIdentity,
            },
        }
    }

    /// Turn an optional extracted token into an authenticated caller
    pub fn authenticate(&self, token: Option<&str>) -> Result<AuthUser, AuthError> {
        let token = token.ok_or(AuthError::Unauthenticated)?;

        match self.verify(token) {
            Verification::Verified { identity, role } => Ok(AuthUser { identity, role }),
            Verification::Rejected { reason } => Err(AuthError::InvalidToken(reason)),
        }
    }

    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, JwtError> {
        self.sign(&Claims::new(user_id, role, self.expiry_hours))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        if !self.has_secret {
            return Err(JwtError::InvalidSecret);
        }

        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }
}
