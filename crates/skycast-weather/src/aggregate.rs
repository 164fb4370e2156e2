//! Daily bucketing of 3-hour forecast samples.
//!
//! Samples are grouped by calendar date in an explicit timezone so output is
//! deterministic regardless of the host's locale.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Utc};

use crate::types::{CurrentConditions, DailyForecast, DaySummary, RawForecastSample, WeatherIcon};

/// Length of the forecast window shown to the user
pub const DEFAULT_WINDOW_DAYS: usize = 5;

/// Days after today covered by the calendar summaries
pub const CALENDAR_DAYS_AHEAD: u64 = 4;

struct DayBucket<'a> {
    first: &'a RawForecastSample,
    min: f64,
    max: f64,
}

fn local_date<Tz: TimeZone>(epoch_s: i64, tz: &Tz) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(epoch_s, 0).map(|dt| dt.with_timezone(tz).date_naive())
}

fn bucket_by_day<'a, Tz: TimeZone>(
    samples: &'a [RawForecastSample],
    tz: &Tz,
) -> BTreeMap<NaiveDate, DayBucket<'a>> {
    let mut days: BTreeMap<NaiveDate, DayBucket<'a>> = BTreeMap::new();

    for sample in samples {
        let Some(date) = local_date(sample.epoch_s, tz) else {
            tracing::debug!("Skipping sample with out-of-range timestamp {}", sample.epoch_s);
            continue;
        };

        days.entry(date)
            .and_modify(|bucket| {
                bucket.min = bucket.min.min(sample.temp_c);
                bucket.max = bucket.max.max(sample.temp_c);
                if sample.epoch_s < bucket.first.epoch_s {
                    bucket.first = sample;
                }
            })
            .or_insert(DayBucket {
                first: sample,
                min: sample.temp_c,
                max: sample.temp_c,
            });
    }

    days
}

/// Reduce `samples` to exactly `window_days` daily entries starting at the
/// local date of `reference`.
///
/// Each day takes min/max over its samples' temperatures and the condition
/// of its chronologically first sample. Days before `reference` are dropped;
/// missing trailing days are padded with placeholders dated
/// `reference + index` days.
pub fn aggregate<Tz: TimeZone>(
    samples: &[RawForecastSample],
    window_days: usize,
    reference: DateTime<Utc>,
    tz: &Tz,
) -> Vec<DailyForecast> {
    let today = reference.with_timezone(tz).date_naive();

    let mut window: Vec<DailyForecast> = bucket_by_day(samples, tz)
        .range(today..)
        .take(window_days)
        .map(|(date, bucket)| DailyForecast {
            date: *date,
            date_epoch_s: bucket.first.epoch_s,
            temp_min_c: bucket.min,
            temp_max_c: bucket.max,
            condition_label: bucket.first.condition_label.clone(),
            icon: WeatherIcon::from_icon_code(&bucket.first.icon_code),
        })
        .collect();

    for index in window.len()..window_days {
        // saturate at the last representable instant instead of overflowing
        let padded = i64::try_from(index)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|offset| reference.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        window.push(DailyForecast::placeholder(
            padded.with_timezone(tz).date_naive(),
            padded.timestamp(),
        ));
    }

    window
}

/// Calendar entry for today, taken from the current conditions.
pub fn summarize_current(current: &CurrentConditions) -> DaySummary {
    DaySummary {
        condition_label: current.condition_label.clone(),
        temperature_c: current.temperature_c as i32,
        icon: current.icon,
    }
}

/// Calendar entries for the `days_ahead` days after the reference date, each
/// from the first sample of that day. Days without samples are left out.
pub fn summarize_upcoming<Tz: TimeZone>(
    samples: &[RawForecastSample],
    days_ahead: u64,
    reference: DateTime<Utc>,
    tz: &Tz,
) -> BTreeMap<NaiveDate, DaySummary> {
    let today = reference.with_timezone(tz).date_naive();
    let days = bucket_by_day(samples, tz);

    (1..=days_ahead)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| {
            days.get(&date).map(|bucket| {
                let summary = DaySummary {
                    condition_label: bucket.first.condition_label.clone(),
                    temperature_c: bucket.first.temp_c as i32,
                    icon: WeatherIcon::from_icon_code(&bucket.first.icon_code),
                };
                (date, summary)
            })
        })
        .collect()
}
