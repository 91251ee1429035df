use clap::Args;
use serde_json::json;

use crate::cli::utils::{output_success, persistent_store};
use crate::cli::OutputFormat;
use crate::config;
use crate::database::models::NewUser;
use crate::database::Store;
use crate::types::Role;

#[derive(Debug, Args)]
pub struct SeedAdminArgs {
    #[arg(long, help = "Admin email address")]
    pub email: String,
    #[arg(long, help = "Admin username")]
    pub username: String,
    #[arg(long, help = "Contact phone number")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStatus {
    Created,
    AlreadyExists,
}

impl SeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStatus::Created => "Created",
            SeedStatus::AlreadyExists => "Already exists",
        }
    }
}

/// Creates a verified, approved admin unless the email or username is taken
pub async fn seed_admin(store: &dyn Store, args: &SeedAdminArgs) -> anyhow::Result<SeedStatus> {
    if store
        .find_user_by_email_or_username(&args.email, &args.username)
        .await?
        .is_some()
    {
        return Ok(SeedStatus::AlreadyExists);
    }

    let mut admin = NewUser::member(args.email.clone(), args.username.clone());
    admin.role = Role::Admin;
    admin.phone_number = args.phone.clone();
    store.insert_user(admin).await?;
    Ok(SeedStatus::Created)
}

pub async fn handle(args: SeedAdminArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let store = persistent_store(&config.database).await?;

    let status = seed_admin(store.as_ref(), &args).await?;
    output_success(
        &output_format,
        "Admin seeded",
        Some(json!({
            "email": args.email,
            "username": args.username,
            "status": status.as_str(),
        })),
    )
}
