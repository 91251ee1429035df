use anyhow::Context;
use serde_json::json;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let store = DatabaseManager::postgres(&config.database)
        .await
        .context("migrate needs a reachable Postgres database (set DATABASE_URL)")?;

    let applied = store.migrate().await.context("failed to apply schema")?;
    output_success(
        &output_format,
        "Schema applied",
        Some(json!({ "statements": applied })),
    )
}
