use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::OutputFormat;

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
    pub pagination: PaginationConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub busy_timeout_ms: u64,
}

/// Which persistence backend the binary talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: String, // "sqlite" or "rest"
    pub rest_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub default_format: String,
    pub output_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub preferences_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/semi-atlas.db".to_string(),
            max_connections: 10,
            connection_timeout_secs: 30,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: "sqlite".to_string(),
            rest_url: None,
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: "csv".to_string(),
            output_directory: "./output".to_string(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            preferences_path: "data/semiconductor-platform-storage.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally layering an explicit file on top
    pub fn load_from(path: Option<&std::path::Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| anyhow::anyhow!("Failed to encode default configuration: {e}"))?;

        let mut builder = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("semi-atlas").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // SEMI_ATLAS__DATABASE__URL and friends
            .add_source(
                Environment::with_prefix("SEMI_ATLAS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {e}"))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database config
        if self.database.url.trim().is_empty() {
            return Err(anyhow::anyhow!("database url must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be greater than 0"));
        }
        if self.database.connection_timeout_secs == 0 {
            return Err(anyhow::anyhow!("connection_timeout_secs must be greater than 0"));
        }

        // Validate backend config
        match self.backend.kind.as_str() {
            "sqlite" => {}
            "rest" => {
                let url = self.backend.rest_url.as_deref().unwrap_or_default();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(anyhow::anyhow!(
                        "backend.rest_url must be an http(s) URL when backend.kind is rest"
                    ));
                }
                if self.backend.api_key.as_deref().unwrap_or_default().is_empty() {
                    return Err(anyhow::anyhow!(
                        "backend.api_key is required when backend.kind is rest"
                    ));
                }
            }
            other => {
                return Err(anyhow::anyhow!(
                    "Invalid backend kind: {other}. Must be one of: [\"sqlite\", \"rest\"]"
                ));
            }
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        // Validate export config
        self.export_format()?;
        if self.export.output_directory.trim().is_empty() {
            return Err(anyhow::anyhow!("output_directory must not be empty"));
        }

        // Validate pagination config
        if self.pagination.max_page_size == 0 {
            return Err(anyhow::anyhow!("max_page_size must be greater than 0"));
        }
        if self.pagination.default_page_size == 0
            || self.pagination.default_page_size > self.pagination.max_page_size
        {
            return Err(anyhow::anyhow!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.pagination.max_page_size
            ));
        }

        Ok(())
    }

    /// Configured export format
    pub fn export_format(&self) -> Result<OutputFormat> {
        self.export
            .default_format
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
    }

    /// True when the hosted REST backend is selected
    #[must_use]
    pub fn uses_rest_backend(&self) -> bool {
        self.backend.kind == "rest"
    }

    /// Get database URL from environment or config
    #[must_use]
    pub fn get_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }

    /// Get log level from environment or config
    #[must_use]
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Where theme and sidebar state are persisted
    #[must_use]
    pub fn preferences_path(&self) -> PathBuf {
        PathBuf::from(&self.ui.preferences_path)
    }

    /// Render the effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.url, "sqlite:data/semi-atlas.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.backend.kind, "sqlite");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rest_backend_requires_url_and_key() {
        let mut config = AppConfig::default();
        config.backend.kind = "rest".to_string();
        assert!(config.validate().is_err());

        config.backend.rest_url = Some("https://example.supabase.co".to_string());
        assert!(config.validate().is_err());

        config.backend.api_key = Some("anon-key".to_string());
        assert!(config.validate().is_ok());
        assert!(config.uses_rest_backend());
    }
}
