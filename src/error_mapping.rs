//! Conversions from weather-layer errors into the application hierarchy.

use skycast_core::{AppError, NetworkError, WeatherError};
use skycast_weather::{FetchError, LocationError, ServiceError};

/// Extension trait for converting library errors to [`AppError`].
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

impl IntoAppError for FetchError {
    fn into_app_error(self) -> AppError {
        match self {
            FetchError::Network(msg) => AppError::Network(NetworkError::ConnectionFailed(msg)),
            FetchError::Api { status: 401, .. } => AppError::Weather(WeatherError::InvalidApiKey),
            FetchError::Api {
                status: 404,
                message,
            } => AppError::Weather(WeatherError::CityNotFound(message)),
            FetchError::Api { status, message } if status >= 500 => {
                AppError::Network(NetworkError::ServerError { status, message })
            }
            FetchError::Api { status, message } => {
                AppError::Weather(WeatherError::ApiError(format!("{} - {}", status, message)))
            }
            FetchError::EmptyBody => AppError::Weather(WeatherError::EmptyResponse),
        }
    }
}

impl IntoAppError for LocationError {
    fn into_app_error(self) -> AppError {
        match self {
            LocationError::PermissionDenied => AppError::Weather(WeatherError::LocationDenied),
            LocationError::Unavailable => {
                AppError::Weather(WeatherError::LocationUnavailable(self.to_string()))
            }
            LocationError::Platform(msg) => {
                AppError::Weather(WeatherError::LocationUnavailable(msg))
            }
        }
    }
}

impl IntoAppError for ServiceError {
    fn into_app_error(self) -> AppError {
        match self {
            ServiceError::EmptyQuery => AppError::Weather(WeatherError::EmptyQuery),
            ServiceError::Location(e) => e.into_app_error(),
            ServiceError::Fetch(e) => e.into_app_error(),
        }
    }
}
