//! Fetch orchestration.
//!
//! [`WeatherService`] ties the provider, the location resolver and the two
//! state stores together. Every fetch writes its own slot and nothing else,
//! so one city's failure never touches another city's state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregate::{
    aggregate, summarize_current, summarize_upcoming, CALENDAR_DAYS_AHEAD, DEFAULT_WINDOW_DAYS,
};
use crate::location::LocationResolver;
use crate::normalize::{CityKey, SpecialCities};
use crate::provider::WeatherProvider;
use crate::store::{Snapshot, StateStore};
use crate::types::{
    CurrentConditions, DailyForecast, DaySummary, FetchError, LocationError, Units,
};

pub const DEFAULT_STAGGER: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Orchestration errors returned to the caller of a fetch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("City name is empty")]
    EmptyQuery,
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ServiceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "Enter a city name to search.",
            Self::Location(e) => e.user_message(),
            Self::Fetch(e) => e.user_message(),
        }
    }
}

/// Tunables for [`WeatherService`]
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub units: Units,
    /// Timezone used to assign forecast samples to calendar days
    pub timezone: Tz,
    pub window_days: usize,
    /// Offset between consecutive launches in [`WeatherService::fetch_cities`]
    pub stagger: Duration,
    pub max_concurrent: usize,
    /// City fetched by name when the device location cannot be resolved
    pub fallback_city: Option<String>,
    pub special_cities: SpecialCities,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            timezone: chrono_tz::Asia::Ho_Chi_Minh,
            window_days: DEFAULT_WINDOW_DAYS,
            stagger: DEFAULT_STAGGER,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            fallback_city: None,
            special_cities: SpecialCities::builtin(),
        }
    }
}

/// Result of one city in a fan-out
#[derive(Debug, Clone)]
pub struct CityOutcome {
    pub name: String,
    pub result: Result<CurrentConditions, ServiceError>,
}

pub struct WeatherService {
    provider: WeatherProvider,
    location: Arc<dyn LocationResolver>,
    settings: ServiceSettings,
    conditions: StateStore<CurrentConditions>,
    forecasts: StateStore<Vec<DailyForecast>>,
    calendar: Mutex<BTreeMap<NaiveDate, DaySummary>>,
}

impl WeatherService {
    pub fn new(
        provider: WeatherProvider,
        location: Arc<dyn LocationResolver>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            provider,
            location,
            settings,
            conditions: StateStore::new(),
            forecasts: StateStore::new(),
            calendar: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Fetch current conditions for a free-text city name.
    ///
    /// The slot is keyed by the normalized name; the upstream is queried with
    /// the special-city term when one exists. Empty names are rejected
    /// without touching the store.
    pub async fn fetch_city(&self, name: &str) -> Result<CurrentConditions, ServiceError> {
        let query = self.settings.special_cities.resolve(name);
        if query.key.as_str().is_empty() {
            warn!("Ignoring fetch for empty city name");
            return Err(ServiceError::EmptyQuery);
        }

        let ticket = self.conditions.begin_fetch(query.key.clone());
        info!("Fetching weather for '{}' (query: '{}')", query.key, query.term);

        let result = self
            .provider
            .fetch_current_by_city(&query.term, self.settings.units)
            .await;

        match &result {
            Ok(conditions) => {
                info!(
                    "Weather for '{}': {} {:.1}°",
                    query.key, conditions.condition_label, conditions.temperature_c
                );
                self.conditions.complete(&ticket, Ok(conditions.clone()));
            }
            Err(e) => {
                warn!("Weather fetch for '{}' failed: {}", query.key, e);
                self.conditions.complete(&ticket, Err(e.to_string()));
            }
        }

        result.map_err(ServiceError::from)
    }

    /// Fetch current conditions and the daily forecast for the device
    /// location.
    ///
    /// Both location slots go Pending first. If the position cannot be
    /// resolved both slots record the location error and the configured
    /// fallback city, if any, is fetched by name. Otherwise the two upstream
    /// results are written independently; the first failure is returned.
    pub async fn fetch_current_location(&self) -> Result<(), ServiceError> {
        let key = CityKey::CurrentLocation;
        let conditions_ticket = self.conditions.begin_fetch(key.clone());
        let forecast_ticket = self.forecasts.begin_fetch(key);

        let coords = match self.location.current_location().await {
            Ok(coords) => coords,
            Err(e) => {
                warn!("Location unavailable: {}", e);
                let message = e.to_string();
                self.conditions.complete(&conditions_ticket, Err(message.clone()));
                self.forecasts.complete(&forecast_ticket, Err(message));

                if let Some(city) = &self.settings.fallback_city {
                    info!("Falling back to '{}'", city);
                    if let Err(fallback) = self.fetch_city(city).await {
                        warn!("Fallback fetch for '{}' failed: {}", city, fallback);
                    }
                }
                return Err(e.into());
            }
        };

        info!(
            "Fetching weather for location ({:.4}, {:.4})",
            coords.latitude, coords.longitude
        );
        let units = self.settings.units;
        let tz = &self.settings.timezone;
        let mut first_error: Option<ServiceError> = None;

        match self
            .provider
            .fetch_current_by_coordinates(coords.latitude, coords.longitude, units)
            .await
        {
            Ok(current) => {
                let today = Utc::now().with_timezone(tz).date_naive();
                let summary = summarize_current(&current);
                // a superseded fetch must not touch the calendar either
                if self.conditions.complete(&conditions_ticket, Ok(current)) {
                    self.calendar.lock().insert(today, summary);
                }
            }
            Err(e) => {
                warn!("Current conditions for location failed: {}", e);
                self.conditions.complete(&conditions_ticket, Err(e.to_string()));
                first_error = first_error.or(Some(e.into()));
            }
        }

        match self
            .provider
            .fetch_forecast_by_coordinates(coords.latitude, coords.longitude, units)
            .await
        {
            Ok(samples) => {
                let now = Utc::now();
                let window = aggregate(&samples, self.settings.window_days, now, tz);
                let upcoming = summarize_upcoming(&samples, CALENDAR_DAYS_AHEAD, now, tz);
                if self.forecasts.complete(&forecast_ticket, Ok(window)) {
                    self.calendar.lock().extend(upcoming);
                }
            }
            Err(e) => {
                warn!("Forecast for location failed: {}", e);
                self.forecasts.complete(&forecast_ticket, Err(e.to_string()));
                first_error = first_error.or(Some(e.into()));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fetch several cities concurrently.
    ///
    /// Launch `i` starts no earlier than `i * stagger` after the call and at
    /// most `max_concurrent` fetches are in flight. Outcomes come back in
    /// completion order.
    pub async fn fetch_cities<S: AsRef<str>>(&self, names: &[S]) -> Vec<CityOutcome> {
        let start = tokio::time::Instant::now();
        let stagger = self.settings.stagger;
        let limit = self.settings.max_concurrent.max(1);
        info!("Fetching {} cities ({} at a time)", names.len(), limit);

        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();

        stream::iter(names.into_iter().enumerate())
            .map(|(index, name)| async move {
                let launch_at = start + stagger.saturating_mul(index as u32);
                tokio::time::sleep_until(launch_at).await;
                let result = self.fetch_city(&name).await;
                CityOutcome { name, result }
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Run [`fetch_city`](Self::fetch_city) as an independent task.
    pub fn spawn_fetch_city(
        self: &Arc<Self>,
        name: impl Into<String>,
    ) -> JoinHandle<Result<CurrentConditions, ServiceError>> {
        let service = Arc::clone(self);
        let name = name.into();
        tokio::spawn(async move { service.fetch_city(&name).await })
    }

    /// Run [`fetch_current_location`](Self::fetch_current_location) as an
    /// independent task.
    pub fn spawn_fetch_current_location(self: &Arc<Self>) -> JoinHandle<Result<(), ServiceError>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.fetch_current_location().await })
    }

    /// Run [`fetch_cities`](Self::fetch_cities) as an independent task.
    pub fn spawn_fetch_cities(self: &Arc<Self>, names: Vec<String>) -> JoinHandle<Vec<CityOutcome>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.fetch_cities(&names).await })
    }

    pub fn conditions(&self) -> &StateStore<CurrentConditions> {
        &self.conditions
    }

    pub fn forecasts(&self) -> &StateStore<Vec<DailyForecast>> {
        &self.forecasts
    }

    pub fn conditions_snapshot(&self) -> Snapshot<CurrentConditions> {
        self.conditions.snapshot()
    }

    pub fn forecasts_snapshot(&self) -> Snapshot<Vec<DailyForecast>> {
        self.forecasts.snapshot()
    }

    pub fn subscribe_conditions(&self) -> watch::Receiver<Snapshot<CurrentConditions>> {
        self.conditions.subscribe()
    }

    pub fn subscribe_forecasts(&self) -> watch::Receiver<Snapshot<Vec<DailyForecast>>> {
        self.forecasts.subscribe()
    }

    /// Calendar summaries collected so far, keyed by local date
    pub fn calendar(&self) -> BTreeMap<NaiveDate, DaySummary> {
        self.calendar.lock().clone()
    }
}
