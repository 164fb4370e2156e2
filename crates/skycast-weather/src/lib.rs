//! Weather data layer for Skycast
//!
//! Fetches current conditions and forecasts from an OpenWeatherMap-style
//! API, folds city names into stable keys, buckets 3-hour samples into daily
//! forecasts and keeps one fetch state per city in observable stores.

pub mod types;
pub mod aggregate;
pub mod location;
pub mod normalize;
pub mod provider;
pub mod service;
pub mod store;

pub use types::*;
pub use aggregate::{aggregate, summarize_current, summarize_upcoming};
pub use location::{FixedLocation, LocationResolver, UnavailableLocation};
pub use normalize::{normalize, CityKey, CityQuery, SpecialCities, CURRENT_LOCATION_SENTINEL};
pub use provider::WeatherProvider;
pub use service::{CityOutcome, ServiceError, ServiceSettings, WeatherService};
pub use store::{FetchState, FetchTicket, Snapshot, StateStore};
