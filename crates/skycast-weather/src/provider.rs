//! Upstream weather API client.
//!
//! Wraps the current-conditions and 5-day/3-hour forecast endpoints. Every
//! call is a single attempt; failures come back as [`FetchError`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{
    CurrentConditions, FetchError, RawForecastSample, Units, WeatherIcon, UNKNOWN_CONDITION,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const FALLBACK_ICON_CODE: &str = "01d";

#[derive(Debug, Deserialize)]
struct ApiCurrentResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    weather: Vec<ApiWeather>,
    main: ApiMain,
    #[serde(default)]
    visibility: i32,
    #[serde(default)]
    wind: ApiWind,
    #[serde(default)]
    sys: ApiSys,
    #[serde(default)]
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct ApiForecastResponse {
    list: Vec<ApiForecastItem>,
}

#[derive(Debug, Deserialize)]
struct ApiForecastItem {
    dt: i64,
    main: ApiMain,
    #[serde(default)]
    weather: Vec<ApiWeather>,
    #[serde(default)]
    wind: ApiWind,
    #[serde(default)]
    visibility: i32,
}

#[derive(Debug, Deserialize)]
struct ApiWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
    #[serde(default)]
    humidity: i32,
}

#[derive(Debug, Default, Deserialize)]
struct ApiWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSys {
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

fn condition_of(weather: &[ApiWeather]) -> (String, WeatherIcon) {
    match weather.first() {
        Some(w) => (w.main.clone(), WeatherIcon::from_icon_code(&w.icon)),
        None => (
            UNKNOWN_CONDITION.to_string(),
            WeatherIcon::from_icon_code(FALLBACK_ICON_CODE),
        ),
    }
}

impl ApiCurrentResponse {
    fn into_conditions(self, fallback_name: &str) -> CurrentConditions {
        let (condition_label, icon) = condition_of(&self.weather);
        let city_display_name = if self.name.is_empty() {
            fallback_name.to_string()
        } else {
            self.name
        };

        CurrentConditions {
            city_display_name,
            temperature_c: self.main.temp,
            humidity_pct: self.main.humidity,
            condition_label,
            wind_speed_ms: self.wind.speed,
            visibility_m: self.visibility,
            sunrise_epoch_s: self.sys.sunrise,
            sunset_epoch_s: self.sys.sunset,
            temp_min_c: self.main.temp_min,
            temp_max_c: self.main.temp_max,
            icon,
            observed_at_epoch_s: self.dt,
        }
    }
}

impl From<ApiForecastItem> for RawForecastSample {
    fn from(item: ApiForecastItem) -> Self {
        let (condition_label, icon_code) = match item.weather.first() {
            Some(w) => (w.main.clone(), w.icon.clone()),
            None => (UNKNOWN_CONDITION.to_string(), FALLBACK_ICON_CODE.to_string()),
        };

        Self {
            epoch_s: item.dt,
            temp_c: item.main.temp,
            temp_min_c: item.main.temp_min,
            temp_max_c: item.main.temp_max,
            humidity_pct: item.main.humidity,
            condition_label,
            icon_code,
            wind_speed_ms: item.wind.speed,
            visibility_m: item.visibility,
        }
    }
}

/// Client for the upstream weather endpoints
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_options(
            api_key,
            DEFAULT_BASE_URL,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current conditions by city name.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_current_by_city(
        &self,
        city_query: &str,
        units: Units,
    ) -> Result<CurrentConditions, FetchError> {
        let params = [
            ("q", city_query.to_string()),
            ("units", units.as_str().to_string()),
        ];
        let response: ApiCurrentResponse = self.get("weather", &params).await?;
        Ok(response.into_conditions(city_query))
    }

    /// Current conditions by coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_current_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<CurrentConditions, FetchError> {
        let params = [
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("units", units.as_str().to_string()),
        ];
        let response: ApiCurrentResponse = self.get("weather", &params).await?;
        let fallback = format!("{:.2}, {:.2}", latitude, longitude);
        Ok(response.into_conditions(&fallback))
    }

    /// 5-day forecast in 3-hour samples by coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<Vec<RawForecastSample>, FetchError> {
        let params = [
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("units", units.as_str().to_string()),
        ];
        let response: ApiForecastResponse = self.get("forecast", &params).await?;
        tracing::debug!("Forecast returned {} samples", response.list.len());
        Ok(response.list.into_iter().map(RawForecastSample::from).collect())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut query = params.to_vec();
        query.push(("appid", self.api_key.clone()));

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = api_error_message(status, &body);
            tracing::warn!("Upstream {} returned {}: {}", endpoint, status.as_u16(), message);
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("Upstream {} payload did not parse: {}", endpoint, e);
            FetchError::EmptyBody
        })
    }
}

/// Prefer the upstream's own `message` field, then the HTTP reason phrase.
fn api_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> WeatherProvider {
        WeatherProvider::with_options("test_key", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn current_body() -> serde_json::Value {
        serde_json::json!({
            "coord": {"lat": 21.03, "lon": 105.85},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temp": 30.2, "feels_like": 33.0, "temp_min": 29.0, "temp_max": 31.5, "pressure": 1008, "humidity": 70},
            "visibility": 10000,
            "wind": {"speed": 3.6, "deg": 120},
            "clouds": {"all": 0},
            "dt": 1717210800,
            "sys": {"country": "VN", "sunrise": 1717193400, "sunset": 1717241400},
            "timezone": 25200,
            "id": 1581130,
            "name": "Hanoi",
            "cod": 200
        })
    }

    #[tokio::test]
    async fn test_current_by_city() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Hanoi"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .mount(&mock_server)
            .await;

        let conditions = provider(&mock_server)
            .fetch_current_by_city("Hanoi", Units::Metric)
            .await
            .unwrap();

        assert_eq!(conditions.city_display_name, "Hanoi");
        assert_eq!(conditions.condition_label, "Clear");
        assert_eq!(conditions.icon, WeatherIcon::Sunny);
        assert_eq!(conditions.temperature_c, 30.2);
        assert_eq!(conditions.humidity_pct, 70);
        assert_eq!(conditions.visibility_m, 10000);
        assert_eq!(conditions.sunrise_epoch_s, 1717193400);
        assert_eq!(conditions.observed_at_epoch_s, 1717210800);
    }

    #[tokio::test]
    async fn test_current_by_coordinates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "21.03"))
            .and(query_param("lon", "105.85"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .mount(&mock_server)
            .await;

        let conditions = provider(&mock_server)
            .fetch_current_by_coordinates(21.03, 105.85, Units::Metric)
            .await
            .unwrap();

        assert_eq!(conditions.wind_speed_ms, 3.6);
    }

    #[tokio::test]
    async fn test_forecast_by_coordinates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": "200",
                "message": 0,
                "cnt": 2,
                "list": [
                    {
                        "dt": 1717210800,
                        "main": {"temp": 88.0, "temp_min": 86.0, "temp_max": 90.0, "humidity": 60},
                        "weather": [{"main": "Rain", "icon": "10d"}],
                        "wind": {"speed": 4.0},
                        "visibility": 9000
                    },
                    {
                        "dt": 1717221600,
                        "main": {"temp": 84.0, "humidity": 65},
                        "weather": []
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let samples = provider(&mock_server)
            .fetch_forecast_by_coordinates(21.03, 105.85, Units::Imperial)
            .await
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].condition_label, "Rain");
        assert_eq!(samples[0].icon_code, "10d");
        assert_eq!(samples[0].visibility_m, 9000);
        assert_eq!(samples[1].condition_label, "Unknown");
        assert_eq!(samples[1].icon_code, "01d");
        assert_eq!(samples[1].visibility_m, 0);
    }

    #[tokio::test]
    async fn test_api_error_uses_upstream_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .fetch_current_by_city("Atlantis", Units::Metric)
            .await;

        let err = result.unwrap_err();
        assert_eq!(
            err,
            FetchError::Api {
                status: 404,
                message: "city not found".to_string()
            }
        );
        assert_eq!(err.to_string(), "API error: 404 - city not found");
    }

    #[tokio::test]
    async fn test_api_error_without_body_uses_reason() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .fetch_current_by_city("Hanoi", Units::Metric)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "API error: 503 - Service Unavailable");
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .fetch_current_by_city("Hanoi", Units::Metric)
            .await;

        assert_eq!(result, Err(FetchError::EmptyBody));
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .fetch_forecast_by_coordinates(1.0, 2.0, Units::Metric)
            .await;

        assert_eq!(result, Err(FetchError::EmptyBody));
    }

    #[tokio::test]
    async fn test_network_error() {
        // Nothing listens on port 9 locally
        let provider =
            WeatherProvider::with_options("k", "http://127.0.0.1:9", Duration::from_secs(2))
                .unwrap();
        let result = provider.fetch_current_by_city("Hanoi", Units::Metric).await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_network_error_hides_api_key() {
        let provider = WeatherProvider::with_options(
            "SECRET_KEY_123",
            "http://127.0.0.1:9",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = provider
            .fetch_forecast_by_coordinates(21.03, 105.85, Units::Metric)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Network error"), "{}", message);
        assert!(!message.contains("SECRET_KEY_123"), "{}", message);
        assert!(!message.contains("appid"), "{}", message);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider =
            WeatherProvider::with_options("k", "http://example.com/api/", Duration::from_secs(1))
                .unwrap();
        assert_eq!(provider.base_url(), "http://example.com/api");
    }
}
