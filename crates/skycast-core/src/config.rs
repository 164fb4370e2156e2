use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `weather.api_key`
pub const API_KEY_ENV: &str = "SKYCAST_API_KEY";

const VALID_UNITS: &[&str] = &["metric", "imperial", "standard"];
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Days covered by the upstream 3-hour forecast
const UPSTREAM_FORECAST_DAYS: usize = 5;

/// Longest forecast window accepted; beyond the upstream range it is all padding
const MAX_FORECAST_DAYS: usize = 16;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Fail with the error summary if any errors were found
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        if !self.is_valid() {
            return Err(ConfigError::Invalid(self.error_summary()));
        }
        Ok(())
    }

    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            tracing::warn!("Config warning: {}", warning);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Cities fetched at startup
    #[serde(default)]
    pub cities: CitiesConfig,

    /// Device location settings
    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// API key (can also be set via SKYCAST_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// metric, imperial or standard
    #[serde(default = "default_units")]
    pub units: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// IANA timezone used to group forecast samples into days
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_timezone() -> String {
    "Asia/Ho_Chi_Minh".to_string()
}

fn default_forecast_days() -> usize {
    UPSTREAM_FORECAST_DAYS
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            units: default_units(),
            timeout_secs: default_timeout_secs(),
            timezone: default_timezone(),
            forecast_days: default_forecast_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitiesConfig {
    #[serde(default = "default_cities")]
    pub defaults: Vec<String>,

    /// Delay between consecutive city fetches in milliseconds
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Extra city name -> upstream query mappings
    #[serde(default)]
    pub special: BTreeMap<String, String>,
}

fn default_cities() -> Vec<String> {
    ["Hà Nội", "Hồ Chí Minh", "Cần Thơ", "Huế"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_stagger_ms() -> u64 {
    500
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for CitiesConfig {
    fn default() -> Self {
        Self {
            defaults: default_cities(),
            stagger_ms: default_stagger_ms(),
            max_concurrent: default_max_concurrent(),
            special: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Fixed device position; both or neither must be set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// City fetched by name when the location cannot be resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_city: Option<String>,
}

impl LocationConfig {
    /// The configured position, if both coordinates are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            toml::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Uses `path` when given, the default location otherwise. Validation
    /// errors fail the load; warnings are returned for the caller to log once
    /// logging is installed.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult), ConfigError> {
        let loaded = match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        };
        let config = loaded.map_err(|e| ConfigError::LoadFailed(format!("{:#}", e)))?;

        let validation = config.validate();
        validation.ensure_valid()?;

        Ok((config, validation))
    }

    /// A non-empty override replaces the file's API key
    fn apply_api_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.weather.api_key = Some(key);
        }
    }

    /// Parsed `weather.timezone`
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.weather
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.weather.timezone, e))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        match self.weather.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => result.add_warning(
                "weather.api_key",
                format!("No API key configured (set {}); requests will be rejected", API_KEY_ENV),
            ),
        }

        if !VALID_UNITS.contains(&self.weather.units.as_str()) {
            result.add_error(
                "weather.units",
                format!(
                    "Unknown unit system '{}', expected one of: {}",
                    self.weather.units,
                    VALID_UNITS.join(", ")
                ),
            );
        }

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        }

        if let Err(e) = self.timezone() {
            result.add_error("weather.timezone", e.to_string());
        }

        if self.weather.forecast_days == 0 {
            result.add_error("weather.forecast_days", "Forecast window must be at least 1 day");
        } else if self.weather.forecast_days > MAX_FORECAST_DAYS {
            result.add_error(
                "weather.forecast_days",
                format!("Forecast window cannot exceed {} days", MAX_FORECAST_DAYS),
            );
        } else if self.weather.forecast_days > UPSTREAM_FORECAST_DAYS {
            result.add_warning(
                "weather.forecast_days",
                format!(
                    "Upstream covers {} days; later days will be placeholders",
                    UPSTREAM_FORECAST_DAYS
                ),
            );
        }

        if self.cities.defaults.is_empty() {
            result.add_warning("cities.defaults", "No default cities configured");
        }
        if self.cities.defaults.iter().any(|c| c.trim().is_empty()) {
            result.add_error("cities.defaults", "City names must not be empty");
        }

        if self.cities.max_concurrent == 0 {
            result.add_error("cities.max_concurrent", "Must allow at least one fetch at a time");
        }

        if self.cities.stagger_ms > 10_000 {
            result.add_warning("cities.stagger_ms", "Stagger is unusually large (>10s)");
        }

        for (name, term) in &self.cities.special {
            if name.trim().is_empty() || term.trim().is_empty() {
                result.add_error("cities.special", "Special city entries must not be empty");
                break;
            }
        }

        self.validate_location(&mut result);

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            result.add_warning(
                "logging.level",
                format!("Unknown log level '{}', using it as a filter directive", self.logging.level),
            );
        }

        result
    }

    fn validate_location(&self, result: &mut ValidationResult) {
        let location = &self.location;
        if location.latitude.is_some() != location.longitude.is_some() {
            result.add_error(
                "location",
                "latitude and longitude must be set together",
            );
        }

        if let Some(lat) = location.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                result.add_error("location.latitude", format!("Latitude out of range: {}", lat));
            }
        }

        if let Some(lon) = location.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                result.add_error("location.longitude", format!("Longitude out of range: {}", lon));
            }
        }

        if let Some(city) = &location.fallback_city {
            if city.trim().is_empty() {
                result.add_error("location.fallback_city", "Fallback city must not be empty");
            }
        }
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Default config should be valid (only warnings, no errors)
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_missing_api_key_is_warning() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.base_url = "ftp://api.example.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.base_url"));
    }

    #[test]
    fn test_unknown_units() {
        let mut config = Config::default();
        config.weather.units = "kelvin".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.units"));
    }

    #[test]
    fn test_bad_timezone() {
        let mut config = Config::default();
        config.weather.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.timezone().is_err());
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.timezone"));
    }

    #[test]
    fn test_default_timezone_parses() {
        let config = Config::default();
        assert_eq!(config.timezone().unwrap(), chrono_tz::Asia::Ho_Chi_Minh);
    }

    #[test]
    fn test_location_ranges() {
        let mut config = Config::default();
        config.location.latitude = Some(91.0);
        config.location.longitude = Some(105.85);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "location.latitude"));
        assert!(!result.errors.iter().any(|e| e.field == "location.longitude"));
    }

    #[test]
    fn test_half_configured_location() {
        let mut config = Config::default();
        config.location.latitude = Some(21.03);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "location"));
        assert_eq!(config.location.coordinates(), None);
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.cities.max_concurrent = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "cities.max_concurrent"));
    }

    #[test]
    fn test_api_key_override() {
        let mut config = Config::default();
        config.weather.api_key = Some("from-file".to_string());

        config.apply_api_key_override(Some("  ".to_string()));
        assert_eq!(config.weather.api_key.as_deref(), Some("from-file"));

        config.apply_api_key_override(Some("from-env".to_string()));
        assert_eq!(config.weather.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_load_from_missing_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.cities.defaults.len(), 4);
        assert_eq!(config.cities.stagger_ms, 500);
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[weather]
units = "imperial"

[cities]
defaults = ["Đà Nẵng"]

[cities.special]
"Đà Lạt" = "Da Lat"

[location]
latitude = 21.03
longitude = 105.85
fallback_city = "Hà Nội"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.units, "imperial");
        assert_eq!(config.weather.timeout_secs, 10);
        assert_eq!(config.weather.timezone, "Asia/Ho_Chi_Minh");
        assert_eq!(config.cities.defaults, vec!["Đà Nẵng".to_string()]);
        assert_eq!(config.cities.max_concurrent, 4);
        assert_eq!(config.cities.special.get("Đà Lạt").map(String::as_str), Some("Da Lat"));
        assert_eq!(config.location.coordinates(), Some((21.03, 105.85)));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\nunits = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_validated_rejects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cities]\nmax_concurrent = 0\n").unwrap();

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("cities.max_concurrent"));
    }

    #[test]
    fn test_load_validated_reports_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\nunits = ").unwrap();

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed(_)));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_validated_returns_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather]\nforecast_days = 7\n").unwrap();

        let (config, validation) = Config::load_validated(Some(&path)).unwrap();
        assert_eq!(config.weather.forecast_days, 7);
        assert!(validation.warnings.iter().any(|w| w.field == "weather.forecast_days"));
    }

    #[test]
    fn test_forecast_window_is_capped() {
        let mut config = Config::default();
        config.weather.forecast_days = 100_000;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.forecast_days"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.location.fallback_city = Some("Huế".to_string());
        config.cities.special.insert("Vũng Tàu".to_string(), "Vung Tau".to_string());
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: Config = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.location.fallback_city.as_deref(), Some("Huế"));
        assert_eq!(loaded.cities.special.len(), 1);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
