//! Weather fare multipliers.
//!
//! The day-granularity forecaster itself runs elsewhere; this module maps
//! its per-day conditions to fare multipliers and provides the default
//! clear-sky source used when no forecast is wired in.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::graph::{CityId, IngestError};
use crate::traits::WeatherProvider;

/// Earning multiplier for a forecast condition; unknown conditions read as
/// clear weather.
pub fn condition_multiplier(condition: &str) -> f64 {
    match condition {
        "Rain" => 1.2,
        "Snow" => 1.3,
        _ => 1.0,
    }
}

/// Always-clear source: multiplier 1.0 for every city and date.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearWeather;

impl WeatherProvider for ClearWeather {
    fn weather_multiplier(&self, _city: CityId, _date: NaiveDate) -> f64 {
        1.0
    }
}

#[derive(Debug, Deserialize)]
struct WeatherRow {
    city_id: CityId,
    date: NaiveDate,
    weather: String,
}

/// Daily conditions per city, as recorded history or forecaster output.
#[derive(Debug, Clone, Default)]
pub struct WeatherTable {
    conditions: HashMap<(CityId, NaiveDate), String>,
}

impl WeatherTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut table = WeatherTable::new();
        for row in reader.deserialize::<WeatherRow>() {
            let row = row?;
            table.insert(row.city_id, row.date, row.weather);
        }
        Ok(table)
    }

    pub fn insert(&mut self, city: CityId, date: NaiveDate, condition: impl Into<String>) {
        self.conditions.insert((city, date), condition.into());
    }

    pub fn condition_for(&self, city: CityId, date: NaiveDate) -> Option<&str> {
        self.conditions.get(&(city, date)).map(String::as_str)
    }
}

impl WeatherProvider for WeatherTable {
    fn weather_multiplier(&self, city: CityId, date: NaiveDate) -> f64 {
        self.condition_for(city, date)
            .map(condition_multiplier)
            .unwrap_or(1.0)
    }
}
