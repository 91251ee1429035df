use anyhow::Context;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::{DatabaseConfig, StoreBackend};
use crate::database::{DatabaseManager, Store};

/// Postgres store for commands whose writes must outlive the process.
/// The memory backend is refused.
pub async fn persistent_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn Store>> {
    if config.backend == StoreBackend::Memory {
        anyhow::bail!(
            "this command needs a persistent store; set STORE_BACKEND=postgres and DATABASE_URL"
        );
    }
    let store = DatabaseManager::postgres(config)
        .await
        .context("failed to connect to Postgres")?;
    Ok(Arc::new(store))
}

/// Output a success message in the appropriate format. Object `data` is
/// merged into the JSON envelope; text output prints its fields as `key: value`.
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            match data {
                Some(Value::Object(fields)) => {
                    if let Value::Object(envelope) = &mut response {
                        envelope.extend(fields);
                    }
                }
                Some(other) => response["data"] = other,
                None => {}
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}
