//! CLI command definitions and dispatch.

pub mod allocate;
pub mod config;
pub mod simulate;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use examdist_core::config::{AppConfig, StoreProvider};
use examdist_core::error::AppError;
use examdist_database::{AllocationStore, MemoryAllocationStore, SeedData};
use examdist_service::{AllocationService, BroadcastNotifier};

use crate::output::OutputFormat;

/// ExamDist: fair distribution of per-question exam documents
#[derive(Debug, Parser)]
#[command(name = "examdist", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay, e.g. `test` loads `config/test.toml` on top
    #[arg(short, long)]
    pub env: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Request documents for one student
    Allocate(allocate::AllocateArgs),
    /// Allocate for a whole class concurrently and show the distribution
    Simulate(simulate::SimulateArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Allocate(args) => allocate::execute(args, &config, self.format).await,
            Commands::Simulate(args) => simulate::execute(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &self.config, &config, self.format),
        }
    }
}

/// Helper: load a seed roster into a fresh memory store
pub async fn load_seed(path: &Path) -> Result<MemoryAllocationStore, AppError> {
    let seed = SeedData::from_file(path).await?;
    MemoryAllocationStore::from_seed(seed).await
}

/// Helper: open the configured store, or the seed roster when one is given
pub async fn open_store(
    config: &AppConfig,
    seed: Option<&Path>,
) -> Result<Arc<dyn AllocationStore>, AppError> {
    if let Some(path) = seed {
        return Ok(Arc::new(load_seed(path).await?));
    }

    match config.database.provider {
        StoreProvider::Memory => Err(AppError::configuration(
            "The memory provider starts empty; pass --seed <file>",
        )),
        StoreProvider::Postgres => open_postgres(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &AppConfig) -> Result<Arc<dyn AllocationStore>, AppError> {
    use examdist_database::postgres::{DatabasePool, PgAllocationStore};

    let pool = DatabasePool::connect(&config.database).await?;
    pool.migrate().await?;
    Ok(Arc::new(PgAllocationStore::new(pool.into_pool())))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &AppConfig) -> Result<Arc<dyn AllocationStore>, AppError> {
    Err(AppError::configuration(
        "This build has no PostgreSQL support; rebuild with --features postgres",
    ))
}

/// Helper: build the allocation service, with a notifier when enabled
pub fn build_service(
    store: Arc<dyn AllocationStore>,
    config: &AppConfig,
) -> (AllocationService, Option<Arc<BroadcastNotifier>>) {
    let service = AllocationService::from_config(store, &config.allocation);
    if !config.notification.enabled {
        return (service, None);
    }

    let notifier = Arc::new(BroadcastNotifier::from_config(&config.notification));
    info!(buffer_size = config.notification.buffer_size, "Owner notifications enabled");
    (service.with_notifier(notifier.clone()), Some(notifier))
}
