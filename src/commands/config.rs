//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use examdist_core::config::{AppConfig, StoreProvider};
use examdist_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
    /// Print the bundled default configuration file
    Default,
}

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: &str,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => output::print_item(config, format),
        ConfigCommand::Validate => {
            if let Err(e) = validate(config) {
                output::print_error(&format!("Configuration invalid: {e}"));
                return Err(e);
            }
            output::print_success(&format!("Configuration '{config_path}' is valid"));
            output::print_kv("Store", &config.database.provider.to_string());
            output::print_kv("Gate", &format!("{:?}", config.allocation.gate));
            output::print_kv(
                "Acquire timeout",
                &config
                    .allocation
                    .acquire_timeout_ms
                    .map_or_else(|| "none".to_string(), |ms| format!("{ms} ms")),
            );
            output::print_kv(
                "RNG seed",
                &config
                    .allocation
                    .rng_seed
                    .map_or_else(|| "os".to_string(), |seed| seed.to_string()),
            );
            output::print_kv("Notifications", &config.notification.enabled.to_string());
            output::print_kv("Log level", &config.logging.level);
        }
        ConfigCommand::Default => print!("{DEFAULT_CONFIG}"),
    }

    Ok(())
}

/// Cross-field checks the schema cannot express.
fn validate(config: &AppConfig) -> Result<(), AppError> {
    if config.database.provider == StoreProvider::Postgres && config.database.url.is_empty() {
        return Err(AppError::configuration("database.url is required for postgres"));
    }
    if config.database.max_connections == 0 {
        return Err(AppError::configuration("database.max_connections must be positive"));
    }
    if config.allocation.acquire_timeout_ms == Some(0) {
        return Err(AppError::configuration("allocation.acquire_timeout_ms must be positive"));
    }
    if config.notification.buffer_size == 0 {
        return Err(AppError::configuration("notification.buffer_size must be positive"));
    }
    if !matches!(config.logging.format.as_str(), "pretty" | "json") {
        return Err(AppError::configuration(format!(
            "logging.format must be 'pretty' or 'json', got '{}'",
            config.logging.format
        )));
    }
    Ok(())
}
