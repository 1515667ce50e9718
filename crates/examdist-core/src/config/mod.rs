//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every section has defaults, so an empty file is valid.

pub mod allocation;
pub mod database;
pub mod logging;
pub mod notification;

use serde::{Deserialize, Serialize};

pub use self::allocation::{AllocationConfig, GateScope};
pub use self::database::{DatabaseConfig, StoreProvider};
pub use self::logging::LoggingConfig;
pub use self::notification::NotificationConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides, e.g.
/// `EXAMDIST__ALLOCATION__GATE=per_exam`.
const ENV_PREFIX: &str = "EXAMDIST";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Allocation store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Allocation gate and random source settings.
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Owner notification settings.
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Merges the base file with an optional environment overlay that sits
    /// next to it (`<dir>/<env>.toml`) and environment variables prefixed
    /// with `EXAMDIST__`. Missing files are not an error.
    pub fn load(config_path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let base = config_path.strip_suffix(".toml").unwrap_or(config_path);
        let mut builder =
            config::Config::builder().add_source(config::File::with_name(base).required(false));

        if let Some(env) = env {
            let overlay = std::path::Path::new(base)
                .with_file_name(env)
                .to_string_lossy()
                .into_owned();
            builder = builder.add_source(config::File::with_name(&overlay).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from a TOML string, without file or environment sources.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(AppError::from)
    }
}
