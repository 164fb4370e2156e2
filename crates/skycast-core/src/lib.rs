pub mod config;
pub mod error;

pub use config::{
    CitiesConfig, Config, ConfigValidationError, LocationConfig, LoggingConfig, ValidationResult,
    WeatherConfig,
};
pub use error::{AppError, ConfigError, NetworkError, WeatherError};

use anyhow::Result;

/// Initialize logging.
///
/// `RUST_LOG` wins over `default_level`. Calling this more than once is a
/// no-op.
pub fn init(default_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!("Skycast core initialized");
    Ok(())
}
