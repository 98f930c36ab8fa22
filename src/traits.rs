//! Provider seams for the earnings planner.
//!
//! These are intentionally minimal. The solver consumes surge, weather,
//! distributed-cache, and snapshot sources through these traits; concrete
//! adapters live in their own modules and deployments can swap in their own.

use std::time::Duration;

use chrono::NaiveDate;

use crate::graph::CityId;
use crate::snapshot::Snapshot;
use crate::solver::Solution;

/// Surge pricing lookup, refreshed externally.
///
/// Implementations must return 1.0 for unknown (city, hour) pairs.
pub trait SurgeProvider: Send + Sync {
    fn surge_multiplier(&self, city: CityId, hour: u8) -> f64;
}

/// Day-granularity weather fare multiplier.
///
/// The forecaster behind this is external; implementations must return 1.0
/// (clear-equivalent) when no condition is known for the date.
pub trait WeatherProvider: Send + Sync {
    fn weather_multiplier(&self, city: CityId, date: NaiveDate) -> f64;
}

/// Distributed solved-query cache shared across processes.
///
/// Both operations are best-effort: an unreachable backend reads as a miss
/// and drops the write. Entries expire after the given TTL.
pub trait SolutionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Solution>;
    fn put(&self, key: &str, solution: &Solution, ttl: Duration);
}

/// Durable storage for built graphs, so a restart can skip ingestion.
///
/// `load` returns `None` for a missing, corrupt, or stale snapshot; `save`
/// failures are logged by implementations and never surfaced.
pub trait SnapshotStore {
    fn load(&self) -> Option<Snapshot>;
    fn save(&self, snapshot: &Snapshot);
}

/// Flat surge of 1.0 everywhere; the default when no surge source is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSurge;

impl SurgeProvider for NoSurge {
    fn surge_multiplier(&self, _city: CityId, _hour: u8) -> f64 {
        1.0
    }
}

/// Uniform surge override, used for sensitivity sweeps.
#[derive(Debug, Clone, Copy)]
pub struct UniformSurge(pub f64);

impl SurgeProvider for UniformSurge {
    fn surge_multiplier(&self, _city: CityId, _hour: u8) -> f64 {
        self.0
    }
}
