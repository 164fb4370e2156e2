//! Centralized error types for the Skycast application.
//!
//! Library crates keep their own error enums; the front end maps them into
//! this hierarchy so every failure has a display-ready `user_message()`.

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a message suitable for showing to the user.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::LoadFailed(_) => {
                "Configuration file could not be read. Check its contents."
            }
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Weather and location errors as seen by the user.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("No data received from API")]
    EmptyResponse,

    #[error("City name is empty")]
    EmptyQuery,

    #[error("Location permission denied")]
    LocationDenied,

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::CityNotFound(_) => "City not found. Check the name and try again.",
            WeatherError::ApiError(_) => "Weather service error. Please try again.",
            WeatherError::InvalidApiKey => "Weather API key is invalid. Check settings.",
            WeatherError::ServiceUnavailable => {
                "Weather service unavailable. Please try again later."
            }
            WeatherError::EmptyResponse => "The weather service returned no data.",
            WeatherError::EmptyQuery => "Enter a city name to search.",
            WeatherError::LocationDenied => "Location access is off. Allow it in settings.",
            WeatherError::LocationUnavailable(_) => "Your location is not available right now.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let errors = vec![
            AppError::Network(NetworkError::ConnectionFailed("refused".into())),
            AppError::Config(ConfigError::Invalid("test".into())),
            AppError::Weather(WeatherError::EmptyQuery),
            AppError::Weather(WeatherError::LocationDenied),
            AppError::Io(std::io::Error::other("disk")),
            AppError::Other(anyhow::anyhow!("boom")),
        ];

        for err in errors {
            assert!(!err.user_message().is_empty(), "{:?}", err);
        }
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = WeatherError::InvalidApiKey.into();
        assert!(matches!(app_err, AppError::Weather(WeatherError::InvalidApiKey)));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Weather(WeatherError::CityNotFound("atlantis".into()));
        assert_eq!(
            app_err.user_message(),
            "City not found. Check the name and try again."
        );
    }

    #[test]
    fn test_server_error_messages_by_status() {
        let outage = NetworkError::ServerError {
            status: 503,
            message: "Service Unavailable".into(),
        };
        let rejected = NetworkError::ServerError {
            status: 400,
            message: "Nothing to geocode".into(),
        };
        assert!(outage.user_message().contains("later"));
        assert_ne!(outage.user_message(), rejected.user_message());
    }

    #[test]
    fn test_config_errors_reach_app_error() {
        let app_err: AppError = ConfigError::LoadFailed("bad toml".into()).into();
        assert_eq!(
            app_err.to_string(),
            "Configuration error: Could not load configuration: bad toml"
        );
        assert_eq!(
            app_err.user_message(),
            "Configuration file could not be read. Check its contents."
        );
    }
}
