use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Secret used when nothing is configured; refused outside development.
pub const DEV_JWT_SECRET: &str = "gallery-api-development-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub health_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_upload_bytes: usize,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub auth_cookie: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that `fileUrl` values such as `/uploads/x.png` are resolved against.
    pub public_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT secret must be configured outside development (set SECURITY_JWT_SECRET)")]
    InsecureJwtSecret,

    #[error("DATABASE_URL is required for the postgres store backend")]
    MissingDatabaseUrl,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env::var("GALLERY_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.port = v.parse().unwrap_or(self.port);
        }

        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = match v.as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" | "postgresql" => StoreBackend::Postgres,
                _ => self.database.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET").or_else(|_| env::var("JWT_SECRET")) {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_AUTH_COOKIE") {
            self.security.auth_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_PUBLIC_DIR") {
            self.storage.public_dir = PathBuf::from(v);
        }

        self
    }

    /// Checks the combinations that would leave the server insecure or unable to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development
            && (self.security.jwt_secret.is_empty() || self.security.jwt_secret == DEV_JWT_SECRET)
        {
            return Err(ConfigError::InsecureJwtSecret);
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self.api.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "API_DEFAULT_PAGE_SIZE",
                value: "0".to_string(),
            });
        }
        if self.api.max_page_size < self.api.default_page_size {
            return Err(ConfigError::InvalidValue {
                name: "API_MAX_PAGE_SIZE",
                value: self.api.max_page_size.to_string(),
            });
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 3000,
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                health_timeout_secs: 3,
            },
            api: ApiConfig {
                default_page_size: 10,
                max_page_size: 100,
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                jwt_expiry_hours: 24,
                auth_cookie: "authToken".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            storage: StorageConfig {
                public_dir: PathBuf::from("public"),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            port: 3000,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                health_timeout_secs: 3,
            },
            api: ApiConfig {
                default_page_size: 10,
                max_page_size: 100,
                max_upload_bytes: 10 * 1024 * 1024,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                auth_cookie: "authToken".to_string(),
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            storage: StorageConfig {
                public_dir: PathBuf::from("public"),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            port: 3000,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                health_timeout_secs: 3,
            },
            api: ApiConfig {
                default_page_size: 10,
                max_page_size: 50,
                max_upload_bytes: 10 * 1024 * 1024,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                auth_cookie: "authToken".to_string(),
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            storage: StorageConfig {
                public_dir: PathBuf::from("/var/lib/gallery-api/public"),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
