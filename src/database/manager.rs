use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::database::{MemoryStore, PgStore, Store, StoreError};

/// Builds the configured store backend
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Store>, StoreError> {
        match config.backend {
            StoreBackend::Postgres => {
                let store = Self::postgres(config).await?;
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => {
                info!("Using in-memory store; data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    /// Postgres store regardless of the configured backend. Used by the CLI
    /// commands that only make sense against a real database.
    pub async fn postgres(config: &DatabaseConfig) -> Result<PgStore, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        info!("Connecting to {}", Self::redact_url(url)?);
        PgStore::connect(config).await
    }

    /// Strips credentials so the URL can be logged
    fn redact_url(url: &str) -> Result<String, StoreError> {
        let mut parsed = url::Url::parse(url).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        if parsed.password().is_some() {
            parsed
                .set_password(Some("***"))
                .map_err(|_| StoreError::InvalidDatabaseUrl)?;
        }
        Ok(parsed.into())
    }
}
