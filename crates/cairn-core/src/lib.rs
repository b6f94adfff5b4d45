//! Core types and configuration for Cairn
//!
//! Shared by the source adapters, the forecast store, the benchmark engine
//! and the briefing composer.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    BenchmarkConfig, CatalogConfig, Config, GoogleWeatherConfig, GroundTruth, MetNoConfig,
    MetOfficeConfig, NormalizationScales, OpenMeteoConfig, OpenWeatherConfig, OpenWeatherMode,
    RetrySettings, SourcesConfig, SuitabilityConfig, ValidationResult, STORE_FILE_NAME,
};
pub use error::ConfigError;
pub use types::*;

use anyhow::Result;

/// Initialize logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::debug!("Cairn core initialized");
    Ok(())
}
