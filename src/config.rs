use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the signoff engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignoffConfig {
    /// Storage backend selection
    pub storage: StorageConfig,
    /// Listing/pagination bounds
    pub pagination: PaginationConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Record store backend ("memory" or "sqlite")
    pub backend: String,
    /// Database settings, required when backend is "sqlite"
    pub database: Option<DatabaseConfig>,
    /// Optional JSONL audit-trail file for the history log
    pub history_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationConfig {
    /// Page size used when a caller passes a zero limit
    pub default_page_size: usize,
    /// Hard cap on caller-requested page sizes
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for SignoffConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                backend: "memory".to_string(),
                database: None,
                history_file: None,
            },
            pagination: PaginationConfig::default(),
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl SignoffConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (signoff.toml, .signoff-rc)
    /// 3. Environment variables (prefixed with SIGNOFF_)
    pub fn load() -> Result<Self> {
        let defaults = SignoffConfig::default();
        let mut builder = Config::builder()
            .set_default("storage.backend", defaults.storage.backend.clone())?
            .set_default(
                "pagination.default_page_size",
                defaults.pagination.default_page_size as i64,
            )?
            .set_default(
                "pagination.max_page_size",
                defaults.pagination.max_page_size as i64,
            )?
            .set_default(
                "observability.tracing_enabled",
                defaults.observability.tracing_enabled,
            )?
            .set_default(
                "observability.log_level",
                defaults.observability.log_level.clone(),
            )?;

        if Path::new("signoff.toml").exists() {
            builder = builder.add_source(File::with_name("signoff"));
        }

        if Path::new(".signoff-rc").exists() {
            builder = builder.add_source(File::with_name(".signoff-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("SIGNOFF")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<SignoffConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = SignoffConfig::load_env_file();
        SignoffConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static SignoffConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
