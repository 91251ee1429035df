use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub is_approved: bool,
    /// Absent on rows created before the lifecycle columns existed; treated as active.
    pub is_active: Option<bool>,
    pub reactivation_requested: Option<bool>,
    pub reactivation_requested_at: Option<DateTime<Utc>>,
    pub deactivation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where an account sits in the soft-deactivation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccountState {
    Active,
    InactiveNoRequest,
    InactiveRequestPending,
}

impl User {
    pub fn account_state(&self) -> AccountState {
        if self.is_active.unwrap_or(true) {
            AccountState::Active
        } else if self.reactivation_requested.unwrap_or(false) {
            AccountState::InactiveRequestPending
        } else {
            AccountState::InactiveNoRequest
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            phone_number: self.phone_number.clone(),
            role: self.role,
            is_verified: self.is_verified,
            is_approved: self.is_approved,
            is_active: self.is_active.unwrap_or(true),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public view of a user returned by `/api/auth/me` and the admin listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub is_approved: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub is_approved: bool,
    pub is_active: Option<bool>,
}

impl NewUser {
    pub fn member(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            phone_number: None,
            role: Role::User,
            is_verified: true,
            is_approved: true,
            is_active: Some(true),
        }
    }
}

/// Filter for the admin user listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub search: Option<String>,
    pub status: Option<UserStatusFilter>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatusFilter {
    Verified,
    Unverified,
    Approved,
    Unapproved,
    /// Verified but not yet approved. Not selectable from the query string.
    PendingApproval,
}

impl UserStatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verified" => Some(Self::Verified),
            "unverified" => Some(Self::Unverified),
            "approved" => Some(Self::Approved),
            "unapproved" => Some(Self::Unapproved),
            _ => None,
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            Self::Verified => user.is_verified,
            Self::Unverified => !user.is_verified,
            Self::Approved => user.is_approved,
            Self::Unapproved => !user.is_approved,
            Self::PendingApproval => user.is_verified && !user.is_approved,
        }
    }
}

impl UserFilter {
    /// Regular members waiting for an admin to approve them
    pub fn pending_approval() -> Self {
        Self {
            search: None,
            status: Some(UserStatusFilter::PendingApproval),
            role: Some(Role::User),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        if let Some(search) = &self.search {
            if !user.email.contains(search.as_str()) && !user.username.contains(search.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if !status.matches(user) {
                return false;
            }
        }
        if let Some(role) = &self.role {
            if user.role != *role {
                return false;
            }
        }
        true
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let role = Role::parse(&role)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown role '{}'", role).into()))?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            phone_number: row.try_get("phone_number")?,
            role,
            is_verified: row.try_get("is_verified")?,
            is_approved: row.try_get("is_approved")?,
            is_active: row.try_get("is_active")?,
            reactivation_requested: row.try_get("reactivation_requested")?,
            reactivation_requested_at: row.try_get("reactivation_requested_at")?,
            deactivation_reason: row.try_get("deactivation_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
