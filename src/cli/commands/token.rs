use clap::Subcommand;
use serde_json::json;

use crate::auth::TokenVerifier;
use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::types::Role;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a token with the configured secret")]
    Issue {
        #[arg(long, help = "Value of the userId claim")]
        user_id: String,
        #[arg(long, default_value = "user", help = "Role claim (user or admin)")]
        role: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { user_id, role } => {
            let role = Role::parse(&role).ok_or_else(|| anyhow::anyhow!("unknown role '{}'", role))?;
            let security = &config::config().security;
            let token = TokenVerifier::from_config(security).issue(&user_id, role)?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Token issued",
                    Some(json!({
                        "token": token,
                        "userId": user_id,
                        "role": role,
                        "expiresInHours": security.jwt_expiry_hours,
                    })),
                ),
                // Bare token so it can be captured with $(gallery token issue ...)
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
