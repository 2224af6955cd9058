pub mod config;
pub mod error;

pub use config::{Config, LocationConfig, LocationBackendKind, ProfileConfig, SimulatedConfig};
pub use error::{AppError, ConfigError, LocationError, StorageError};

use anyhow::Result;

/// Initialize the core application
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("geotrack core initialized");
    Ok(())
}
