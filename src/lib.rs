//! MediLink ML service core library
//!
//! This module exports the predictors, dataset store and HTTP layer of the
//! MediLink ML service.

pub mod api;
pub mod error;
pub mod ml;
pub mod models;
pub mod predictors;
pub mod state;
pub mod store;
pub mod telemetry;

pub use error::{ApiError, PredictionError};
pub use state::AppState;

/// Application configuration
pub mod config {
    use std::path::PathBuf;

    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub server: ServerConfig,
        pub datasets: DatasetConfig,
        pub models: ModelConfig,
        #[serde(default)]
        pub logging: LoggingConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
        /// Worker threads; actix picks one per core when unset.
        #[serde(default)]
        pub workers: Option<usize>,
    }

    /// Backing CSV files for the retrainable predictors.
    #[derive(Debug, Clone, Deserialize)]
    pub struct DatasetConfig {
        pub patients: PathBuf,
        pub drugs: PathBuf,
    }

    /// Static priority model files, loaded read-only at startup.
    #[derive(Debug, Clone, Deserialize)]
    pub struct ModelConfig {
        pub opd: PathBuf,
        pub bed: PathBuf,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum LogFormat {
        #[default]
        Pretty,
        Json,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LoggingConfig {
        #[serde(default = "default_level")]
        pub level: String,
        #[serde(default)]
        pub format: LogFormat,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: default_level(),
                format: LogFormat::default(),
            }
        }
    }

    fn default_level() -> String {
        "info".into()
    }

    /// Load configuration from the `config` directory
    pub fn load_config() -> Result<Config, config::ConfigError> {
        load_config_from("config")
    }

    /// Load configuration from `<dir>/default`, then `<dir>/<MEDILINK_ENV>`,
    /// then `MEDILINK__*` environment variables.
    pub fn load_config_from(dir: &str) -> Result<Config, config::ConfigError> {
        let env = std::env::var("MEDILINK_ENV").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            // Start with default settings
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("{}/{}", dir, env)).required(false))
            // Override with environment variables
            .add_source(config::Environment::with_prefix("MEDILINK").separator("__"))
            .build()?
            .try_deserialize()
    }

}
