//! Surge pricing table, refreshed by an external process.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::graph::{CityId, IngestError};
use crate::traits::SurgeProvider;

#[derive(Debug, Deserialize)]
struct SurgeRow {
    city_id: CityId,
    hour: u8,
    surge_multiplier: f64,
}

/// (city, hour) -> multiplier lookup. Missing entries read as 1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurgeTable {
    entries: HashMap<(CityId, u8), f64>,
}

impl SurgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut table = SurgeTable::new();
        for row in reader.deserialize::<SurgeRow>() {
            let row = row?;
            table.insert(row.city_id, row.hour, row.surge_multiplier);
        }
        Ok(table)
    }

    pub fn insert(&mut self, city: CityId, hour: u8, multiplier: f64) {
        self.entries.insert((city, hour), multiplier);
    }

    pub fn get(&self, city: CityId, hour: u8) -> f64 {
        self.entries.get(&(city, hour)).copied().unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SurgeProvider for SurgeTable {
    fn surge_multiplier(&self, city: CityId, hour: u8) -> f64 {
        self.get(city, hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_default_to_one() {
        let mut table = SurgeTable::new();
        table.insert(3, 18, 1.6);

        assert_eq!(table.surge_multiplier(3, 18), 1.6);
        assert_eq!(table.surge_multiplier(3, 4), 1.0);
        assert_eq!(table.surge_multiplier(7, 18), 1.0);
    }
}
