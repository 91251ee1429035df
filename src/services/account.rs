use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::models::{AccountState, User};
use crate::database::{Store, StoreError};
use crate::types::Role;

/// Result of a self-service reactivation request. Every variant is reported
/// to the caller as a success; only the message differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactivationOutcome {
    UnknownAccount,
    AlreadyActive,
    AlreadyPending,
    Submitted,
}

impl ReactivationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ReactivationOutcome::UnknownAccount => {
                "If your account exists, a reactivation request has been submitted."
            }
            ReactivationOutcome::AlreadyActive => "Your account is already active. You can log in now.",
            ReactivationOutcome::AlreadyPending => "A reactivation request is already pending for this account.",
            ReactivationOutcome::Submitted => {
                "Your reactivation request has been submitted. An administrator will review it shortly."
            }
        }
    }
}

/// Channel that tells administrators about new reactivation requests
pub trait AdminNotifier: Send + Sync {
    fn reactivation_requested(&self, user: &User);
}

/// Emits the notification as a structured log event on `gallery_api::admin`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl AdminNotifier for LogNotifier {
    fn reactivation_requested(&self, user: &User) {
        warn!(
            target: "gallery_api::admin",
            user_id = %user.id,
            email = %user.email,
            "Reactivation requested"
        );
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user not found")]
    NotFound,

    #[error("user is already active")]
    AlreadyActive,

    #[error("user is already deactivated")]
    AlreadyInactive,

    #[error("admin accounts cannot be deactivated")]
    AdminAccount,

    #[error("user is already approved")]
    AlreadyApproved,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Soft-deactivation lifecycle: self-service reactivation requests plus the
/// administrative transitions in and out of the active state.
#[derive(Clone)]
pub struct AccountLifecycle {
    store: Arc<dyn Store>,
    notifier: Arc<dyn AdminNotifier>,
}

impl AccountLifecycle {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn AdminNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn request_reactivation(&self, email: &str) -> Result<ReactivationOutcome, StoreError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            return Ok(ReactivationOutcome::UnknownAccount);
        };

        match user.account_state() {
            AccountState::Active => Ok(ReactivationOutcome::AlreadyActive),
            AccountState::InactiveRequestPending => Ok(ReactivationOutcome::AlreadyPending),
            AccountState::InactiveNoRequest => {
                if self.store.request_reactivation(&user.id, Utc::now()).await? {
                    info!(user_id = %user.id, "reactivation request recorded");
                    self.notifier.reactivation_requested(&user);
                    return Ok(ReactivationOutcome::Submitted);
                }

                // Lost a race with another request or an admin action
                let current = self.store.find_user(&user.id).await?;
                Ok(match current.map(|u| u.account_state()) {
                    None => ReactivationOutcome::UnknownAccount,
                    Some(AccountState::Active) => ReactivationOutcome::AlreadyActive,
                    Some(_) => ReactivationOutcome::AlreadyPending,
                })
            }
        }
    }

    pub async fn deactivate(&self, user_id: &str, reason: Option<String>) -> Result<User, AccountError> {
        let user = self.store.find_user(user_id).await?.ok_or(AccountError::NotFound)?;

        if user.role == Role::Admin {
            return Err(AccountError::AdminAccount);
        }
        if user.account_state() != AccountState::Active {
            return Err(AccountError::AlreadyInactive);
        }

        let updated = self
            .store
            .set_user_active(&user.id, false, reason)
            .await?
            .ok_or(AccountError::NotFound)?;
        info!(user_id = %updated.id, "user deactivated");
        Ok(updated)
    }

    pub async fn reactivate(&self, user_id: &str) -> Result<User, AccountError> {
        let user = self.store.find_user(user_id).await?.ok_or(AccountError::NotFound)?;

        if user.account_state() == AccountState::Active {
            return Err(AccountError::AlreadyActive);
        }

        let updated = self
            .store
            .set_user_active(&user.id, true, None)
            .await?
            .ok_or(AccountError::NotFound)?;
        info!(user_id = %updated.id, "user reactivated");
        Ok(updated)
    }

    pub async fn approve(&self, user_id: &str) -> Result<User, AccountError> {
        let user = self.store.find_user(user_id).await?.ok_or(AccountError::NotFound)?;
        if user.is_approved {
            return Err(AccountError::AlreadyApproved);
        }

        let updated = self
            .store
            .set_user_approved(&user.id)
            .await?
            .ok_or(AccountError::NotFound)?;
        info!(user_id = %updated.id, "user approved");
        Ok(updated)
    }
}
