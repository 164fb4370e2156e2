use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Label used when the upstream payload carries no condition.
pub const UNKNOWN_CONDITION: &str = "Unknown";

/// Unit system sent as the upstream `units` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Standard => "standard",
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            "standard" => Ok(Self::Standard),
            other => Err(format!("unknown unit system: {}", other)),
        }
    }
}

/// Icon categories the display layer knows how to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    #[default]
    Sunny,
    Clouds,
    Rain,
    Storm,
}

impl WeatherIcon {
    /// Convert an upstream icon code (e.g. `"10n"`) to an icon category.
    /// Unknown codes fall back to clouds.
    pub fn from_icon_code(code: &str) -> Self {
        match code {
            "01d" | "01n" => Self::Sunny,
            "02d" | "02n" => Self::Clouds,
            c if c.starts_with("03") || c.starts_with("04") => Self::Clouds,
            c if c.starts_with("09") || c.starts_with("10") => Self::Rain,
            "11d" | "11n" => Self::Storm,
            _ => Self::Clouds,
        }
    }

    /// Get icon name for the display layer
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Clouds => "clouds",
            Self::Rain => "rain",
            Self::Storm => "storm",
        }
    }
}

/// Geographic position reported by the location resolver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions for one city, derived once per successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub city_display_name: String,
    pub temperature_c: f64,
    pub humidity_pct: i32,
    pub condition_label: String,
    pub wind_speed_ms: f64,
    pub visibility_m: i32,
    pub sunrise_epoch_s: i64,
    pub sunset_epoch_s: i64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub icon: WeatherIcon,
    pub observed_at_epoch_s: i64,
}

/// One 3-hour slice of the upstream forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecastSample {
    pub epoch_s: i64,
    pub temp_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_pct: i32,
    pub condition_label: String,
    pub icon_code: String,
    pub wind_speed_ms: f64,
    pub visibility_m: i32,
}

/// One day of the aggregated forecast window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Local calendar date of the bucket
    pub date: NaiveDate,
    /// Time of the first sample of the day, or the padded reference time
    pub date_epoch_s: i64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub condition_label: String,
    pub icon: WeatherIcon,
}

impl DailyForecast {
    /// Zero-valued entry used to pad the window when data is missing.
    pub fn placeholder(date: NaiveDate, date_epoch_s: i64) -> Self {
        Self {
            date,
            date_epoch_s,
            temp_min_c: 0.0,
            temp_max_c: 0.0,
            condition_label: UNKNOWN_CONDITION.to_string(),
            icon: WeatherIcon::Sunny,
        }
    }
}

/// Compact per-date entry shown in the calendar view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub condition_label: String,
    /// Whole degrees, truncated toward zero
    pub temperature_c: i32,
    pub icon: WeatherIcon,
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location error: {0}")]
    Platform(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location access is off. Allow it in settings.",
            Self::Unavailable => "Your location is not available right now.",
            Self::Platform(_) => "Could not determine your location.",
        }
    }
}

/// Upstream fetch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("No data received from API")]
    EmptyBody,
}

impl FetchError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Unable to reach the weather service. Check your connection.",
            Self::Api { status: 401, .. } => "Weather API key is invalid. Check settings.",
            Self::Api { status: 404, .. } => "City not found. Check the name and try again.",
            Self::Api { status, .. } if *status >= 500 => {
                "The weather service is having trouble. Please try again later."
            }
            Self::Api { .. } => "The weather request failed. Please try again.",
            Self::EmptyBody => "The weather service returned no data.",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // the request URL carries the API key
        Self::Network(e.without_url().to_string())
    }
}
