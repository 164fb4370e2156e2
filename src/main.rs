mod error_mapping;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use skycast_core::{AppError, Config};
use skycast_weather::{
    CurrentConditions, DailyForecast, DaySummary, FetchState, FixedLocation, LocationResolver,
    ServiceSettings, Snapshot, SpecialCities, UnavailableLocation, Units, WeatherProvider,
    WeatherService,
};

use crate::error_mapping::IntoAppError;

/// Current weather and 5-day forecasts for a list of cities
#[derive(Debug, Parser)]
#[command(name = "skycast", version)]
struct Args {
    /// Cities to fetch (defaults to the configured list)
    cities: Vec<String>,

    /// Also fetch weather for the device location
    #[arg(long)]
    location: bool,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, validation) = match Config::load_validated(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            let app_err = AppError::from(e);
            eprintln!("{}", app_err.user_message());
            return Err(app_err.into());
        }
    };

    skycast_core::init(&config.logging.level)?;
    match &args.config {
        Some(path) => tracing::info!("Using config {}", path.display()),
        None => tracing::info!("Using default config location"),
    }
    validation.log_warnings();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("skycast-tokio")
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: Config) -> Result<()> {
    let settings = service_settings(&config)?;
    let units = settings.units;

    let provider = WeatherProvider::with_options(
        config.weather.api_key.clone().unwrap_or_default(),
        &config.weather.base_url,
        Duration::from_secs(config.weather.timeout_secs),
    )
    .map_err(|e| e.into_app_error())?;

    let location: Arc<dyn LocationResolver> = match config.location.coordinates() {
        Some((latitude, longitude)) => Arc::new(FixedLocation::new(latitude, longitude)),
        None => Arc::new(UnavailableLocation),
    };

    let service = Arc::new(WeatherService::new(provider, location, settings));

    let mut updates = service.subscribe_conditions();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            let pending = snapshot.values().filter(|s| s.is_pending()).count();
            tracing::info!("Store updated: {} cities, {} pending", snapshot.len(), pending);
        }
    });

    let cities = if args.cities.is_empty() {
        config.cities.defaults.clone()
    } else {
        args.cities.clone()
    };

    let city_task = service.spawn_fetch_cities(cities);
    let location_task = args
        .location
        .then(|| service.spawn_fetch_current_location());

    let outcomes = city_task.await.context("City fetch task panicked")?;
    for outcome in outcomes {
        if let Err(e) = outcome.result {
            let app_err = e.into_app_error();
            tracing::warn!("{}: {}", outcome.name, app_err);
            eprintln!("{}: {}", outcome.name, app_err.user_message());
        }
    }

    if let Some(task) = location_task {
        if let Err(e) = task.await.context("Location fetch task panicked")? {
            let app_err = e.into_app_error();
            tracing::warn!("Current location: {}", app_err);
            eprintln!("Current location: {}", app_err.user_message());
        }
    }

    watcher.abort();

    print_conditions(&service.conditions_snapshot(), units);
    print_forecasts(&service.forecasts_snapshot(), units);
    print_calendar(&service.calendar(), units);

    Ok(())
}

fn service_settings(config: &Config) -> Result<ServiceSettings> {
    let units = config
        .weather
        .units
        .parse::<Units>()
        .map_err(anyhow::Error::msg)?;

    Ok(ServiceSettings {
        units,
        timezone: config.timezone()?,
        window_days: config.weather.forecast_days,
        stagger: Duration::from_millis(config.cities.stagger_ms),
        max_concurrent: config.cities.max_concurrent,
        fallback_city: config.location.fallback_city.clone(),
        special_cities: SpecialCities::with_overrides(&config.cities.special),
    })
}

fn degree_suffix(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
        Units::Standard => "K",
    }
}

fn describe(conditions: &CurrentConditions, units: Units) -> String {
    let deg = degree_suffix(units);
    format!(
        "{} {:.1}{} (low {:.1}{}, high {:.1}{}), humidity {}%, wind {:.1}, visibility {} m",
        conditions.condition_label,
        conditions.temperature_c,
        deg,
        conditions.temp_min_c,
        deg,
        conditions.temp_max_c,
        deg,
        conditions.humidity_pct,
        conditions.wind_speed_ms,
        conditions.visibility_m,
    )
}

fn print_conditions(snapshot: &Snapshot<CurrentConditions>, units: Units) {
    println!("Current conditions");
    for (key, state) in snapshot.iter() {
        match state {
            FetchState::Pending => println!("  {:<22} loading", key),
            FetchState::Error(message) => println!("  {:<22} error: {}", key, message),
            FetchState::Success(conditions) => println!(
                "  {:<22} [{}] {}: {}",
                key,
                conditions.icon.icon_name(),
                conditions.city_display_name,
                describe(conditions, units)
            ),
        }
    }
}

fn print_forecasts(snapshot: &Snapshot<Vec<DailyForecast>>, units: Units) {
    if snapshot.is_empty() {
        return;
    }

    let deg = degree_suffix(units);
    println!("\nForecast");
    for (key, state) in snapshot.iter() {
        match state {
            FetchState::Pending => println!("  {}: loading", key),
            FetchState::Error(message) => println!("  {}: error: {}", key, message),
            FetchState::Success(days) => {
                println!("  {}:", key);
                for day in days {
                    println!(
                        "    {} [{:<6}] {:<12} {:.0}{} / {:.0}{}",
                        day.date.format("%a %d/%m"),
                        day.icon.icon_name(),
                        day.condition_label,
                        day.temp_min_c,
                        deg,
                        day.temp_max_c,
                        deg
                    );
                }
            }
        }
    }
}

fn print_calendar(calendar: &BTreeMap<NaiveDate, DaySummary>, units: Units) {
    if calendar.is_empty() {
        return;
    }

    println!("\nCalendar");
    for (date, summary) in calendar {
        println!(
            "  {} {:>4}{} {}",
            date.format("%Y-%m-%d"),
            summary.temperature_c,
            degree_suffix(units),
            summary.condition_label
        );
    }
}
