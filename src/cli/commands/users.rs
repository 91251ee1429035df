use clap::Subcommand;
use serde_json::json;
use std::sync::Arc;

use crate::cli::utils::{output_success, persistent_store};
use crate::cli::OutputFormat;
use crate::config;
use crate::database::models::User;
use crate::database::Store;
use crate::services::{AccountLifecycle, LogNotifier};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Deactivate a non-admin account")]
    Deactivate {
        #[arg(long, help = "Account email")]
        email: String,
        #[arg(long, help = "Reason recorded with the deactivation")]
        reason: Option<String>,
    },

    #[command(about = "Reactivate an account and clear any pending request")]
    Reactivate {
        #[arg(long, help = "Account email")]
        email: String,
    },
}

async fn lookup(store: &Arc<dyn Store>, email: &str) -> anyhow::Result<User> {
    store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no account with email {}", email))
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let store = persistent_store(&config.database).await?;
    let lifecycle = AccountLifecycle::new(store.clone(), Arc::new(LogNotifier));

    let (message, user) = match cmd {
        UserCommands::Deactivate { email, reason } => {
            let user = lookup(&store, &email).await?;
            ("User deactivated", lifecycle.deactivate(&user.id, reason).await?)
        }
        UserCommands::Reactivate { email } => {
            let user = lookup(&store, &email).await?;
            ("User reactivated", lifecycle.reactivate(&user.id).await?)
        }
    };

    output_success(
        &output_format,
        message,
        Some(json!({
            "id": user.id,
            "email": user.email,
            "state": format!("{:?}", user.account_state()),
        })),
    )
}
