//! Earnings planner: finite-horizon value iteration over a city mobility
//! graph.
//!
//! The work horizon is discretized into fixed-size time buckets. `V[t][z]`
//! is the best achievable earnings with `t` minutes remaining at zone `z`;
//! the terminal layer `V[0]` is zero everywhere and each layer is built
//! from the ones below it (idling, at value 0, is always available, so
//! every state has a defined value and a solve always produces a result).

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::{solve_cache_key, LocalMemo, SOLVE_CACHE_TTL};
use crate::graph::{CityId, GraphStore, MobilityGraph};
use crate::traits::{NoSurge, SolutionCache, SurgeProvider, WeatherProvider};
use crate::transition::TransitionCache;
use crate::weather::ClearWeather;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Laplace smoothing parameter for transition probabilities.
    pub epsilon: f64,
    /// Discount factor for future earnings (0 < gamma <= 1).
    pub gamma: f64,
    /// Minimum demand rate when estimating wait times.
    pub lambda_floor: f64,
    /// Time-bucket size for the value function, in minutes.
    pub bucket_minutes: u32,
    /// Whether solved queries go through the cache tiers.
    pub use_cache: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            gamma: 0.95,
            lambda_floor: 0.5,
            bucket_minutes: 5,
            use_cache: true,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("city {0} not found")]
    CityNotFound(CityId),
    #[error("zone {zone} not found in city {city}")]
    ZoneNotFound { city: CityId, zone: String },
}

/// A solved query: total expected earnings plus the induced zone sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub earnings: f64,
    pub path: Vec<String>,
}

/// One entry of a ranked starting-zone listing.
#[derive(Debug, Clone, Serialize)]
pub struct RankedZone {
    pub zone: String,
    pub earnings: f64,
    pub path: Vec<String>,
}

/// One step of a replayed path, carrying the same per-step numbers the
/// solver used internally.
#[derive(Debug, Clone, Serialize)]
pub struct PathStep {
    pub step: usize,
    pub from: String,
    pub to: String,
    pub hour: u8,
    pub date: NaiveDate,
    pub base_fare: f64,
    pub surge_multiplier: f64,
    pub weather_multiplier: f64,
    pub fare: f64,
    pub travel_minutes: f64,
    pub wait_minutes: f64,
    /// Raw travel + wait minutes for this step.
    pub step_minutes: f64,
    /// The bucket-rounded minutes the solver booked for this step.
    pub rounded_minutes: i64,
    pub cumulative_minutes: i64,
    pub cumulative_earnings: f64,
    pub hourly_rate: f64,
}

/// The planner. Holds an immutable graph store plus the injected surge,
/// weather, and cache sources; safe to share across threads.
pub struct Planner {
    store: Arc<GraphStore>,
    config: PlannerConfig,
    surge: Arc<dyn SurgeProvider>,
    weather: Arc<dyn WeatherProvider>,
    remote: Option<Arc<dyn SolutionCache>>,
    transitions: TransitionCache,
    memo: LocalMemo,
}

impl Planner {
    pub fn new(store: Arc<GraphStore>, config: PlannerConfig) -> Self {
        Self {
            store,
            config,
            surge: Arc::new(NoSurge),
            weather: Arc::new(ClearWeather),
            remote: None,
            transitions: TransitionCache::new(),
            memo: LocalMemo::new(),
        }
    }

    pub fn with_surge(mut self, surge: Arc<dyn SurgeProvider>) -> Self {
        self.surge = surge;
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherProvider>) -> Self {
        self.weather = weather;
        self
    }

    pub fn with_remote_cache(mut self, remote: Arc<dyn SolutionCache>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn surge_multiplier(&self, city: CityId, hour: u8) -> f64 {
        self.surge.surge_multiplier(city, hour)
    }

    pub fn weather_multiplier(&self, city: CityId, date: NaiveDate) -> f64 {
        self.weather.weather_multiplier(city, date)
    }

    fn graph(&self, city: CityId) -> Result<&MobilityGraph, SolveError> {
        self.store.graph(city).ok_or(SolveError::CityNotFound(city))
    }

    fn zone_index(
        &self,
        graph: &MobilityGraph,
        city: CityId,
        zone: &str,
    ) -> Result<usize, SolveError> {
        graph
            .zone_index(zone)
            .ok_or_else(|| SolveError::ZoneNotFound {
                city,
                zone: zone.to_string(),
            })
    }

    /// Optimal strategy for a driver at `start_zone` from `start_hour`,
    /// working `work_hours`, starting on `date`.
    ///
    /// Goes through the local memo and (if wired) the distributed cache;
    /// concurrent calls for the same key coalesce onto one computation.
    pub fn solve(
        &self,
        city: CityId,
        start_zone: &str,
        start_hour: u8,
        work_hours: u32,
        date: NaiveDate,
    ) -> Result<Solution, SolveError> {
        let graph = self.graph(city)?;
        let start = self.zone_index(graph, city, start_zone)?;

        if !self.config.use_cache {
            return Ok(self.run_value_iteration(
                graph,
                city,
                start,
                start_hour,
                work_hours,
                date,
                self.surge.as_ref(),
            ));
        }

        let key = solve_cache_key(city, start_zone, start_hour, work_hours, date);
        Ok(self.memo.get_or_solve(&key, || {
            if let Some(remote) = &self.remote {
                if let Some(hit) = remote.get(&key) {
                    debug!(%key, "distributed cache hit");
                    return hit;
                }
            }
            let solution = self.run_value_iteration(
                graph,
                city,
                start,
                start_hour,
                work_hours,
                date,
                self.surge.as_ref(),
            );
            if let Some(remote) = &self.remote {
                remote.put(&key, &solution, SOLVE_CACHE_TTL);
            }
            solution
        }))
    }

    /// Cache-bypassing solve under an alternative surge source.
    ///
    /// Sensitivity sweeps and other what-if analyses must not read or
    /// pollute the solved-query tiers, whose entries assume the live surge
    /// table.
    pub fn solve_with_surge(
        &self,
        city: CityId,
        start_zone: &str,
        start_hour: u8,
        work_hours: u32,
        date: NaiveDate,
        surge: &dyn SurgeProvider,
    ) -> Result<Solution, SolveError> {
        let graph = self.graph(city)?;
        let start = self.zone_index(graph, city, start_zone)?;
        Ok(self.run_value_iteration(graph, city, start, start_hour, work_hours, date, surge))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_value_iteration(
        &self,
        graph: &MobilityGraph,
        city: CityId,
        start: usize,
        start_hour: u8,
        work_hours: u32,
        date: NaiveDate,
        surge: &dyn SurgeProvider,
    ) -> Solution {
        let n = graph.zone_count();
        let bucket = self.config.bucket_minutes.max(1) as i64;
        let total_minutes = work_hours as i64 * 60;
        let levels = (total_minutes / bucket) as usize;
        let horizon = levels as i64 * bucket;

        // values[level][zone], level = remaining minutes / bucket.
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(levels + 1);
        values.push(vec![0.0; n]);
        // policy[level][zone] = (next zone, booked transition minutes).
        let mut policy: Vec<Vec<Option<(usize, i64)>>> = Vec::with_capacity(levels + 1);
        policy.push(vec![None; n]);

        for level in 1..=levels {
            let time_remaining = level as i64 * bucket;
            let minutes_elapsed = total_minutes - time_remaining;
            let hour = wall_clock_hour(start_hour, minutes_elapsed);
            let date_at = date_at_elapsed(date, minutes_elapsed);

            let surge_mult = surge.surge_multiplier(city, hour);
            let weather_mult = self.weather.weather_multiplier(city, date_at);
            let wait_by_zone: Vec<f64> = (0..n)
                .map(|zone| self.wait_minutes(graph, zone, hour))
                .collect();

            let mut layer = vec![0.0; n];
            let mut layer_policy = vec![None; n];

            for i in 0..n {
                let mut best_value = 0.0;
                let mut best_move = None;

                for (j, stats) in graph.edges_from(i) {
                    let fare = stats.fare_at(hour as usize) * surge_mult * weather_mult;
                    let travel = stats.duration_at(hour as usize);
                    let transition = round_to_bucket(travel + wait_by_zone[*j], bucket);
                    if transition > time_remaining {
                        continue;
                    }

                    let remaining_after = time_remaining - transition;
                    let future = if remaining_after == time_remaining {
                        // Zero-bucket transition: read the layer under
                        // construction (zones not yet filled read 0).
                        layer[*j]
                    } else {
                        values[(remaining_after / bucket) as usize][*j]
                    };
                    let value = fare + self.config.gamma * future;
                    if value > best_value {
                        best_value = value;
                        best_move = Some((*j, transition));
                    }
                }

                layer[i] = best_value;
                layer_policy[i] = best_move;
            }

            values.push(layer);
            policy.push(layer_policy);
        }

        let earnings = values[levels][start];
        let path = extract_path(graph, &policy, start, horizon, bucket, work_hours);
        debug!(
            city,
            start_zone = %graph.zone(start).id,
            earnings,
            steps = path.len(),
            "solved value iteration"
        );
        Solution { earnings, path }
    }

    /// Expected wait in minutes before the next pickup at a zone, floored
    /// so sparsely-observed zones never divide by zero.
    fn wait_minutes(&self, graph: &MobilityGraph, zone: usize, hour: u8) -> f64 {
        let demand = graph.outgoing_demand(zone, hour as usize) as f64;
        60.0 / demand.max(self.config.lambda_floor)
    }

    /// Solve every zone of the city as the starting position and return the
    /// `top_k` by expected earnings, descending. Ties keep zone-id order
    /// (the sort is stable).
    pub fn best_starting_zones(
        &self,
        city: CityId,
        start_hour: u8,
        work_hours: u32,
        date: NaiveDate,
        top_k: usize,
    ) -> Result<Vec<RankedZone>, SolveError> {
        let graph = self.graph(city)?;

        let mut ranked: Vec<RankedZone> = graph
            .zones()
            .par_iter()
            .filter_map(|zone| {
                self.solve(city, &zone.id, start_hour, work_hours, date)
                    .ok()
                    .map(|solution| RankedZone {
                        zone: zone.id.clone(),
                        earnings: solution.earnings,
                        path: solution.path,
                    })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.earnings
                .partial_cmp(&a.earnings)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(top_k);
        Ok(ranked)
    }

    /// Replay a path step by step with the exact fare/travel/wait numbers
    /// the solver uses, producing an auditable trace. Elapsed time advances
    /// by the bucket-rounded step minutes so hour boundaries line up with
    /// the solve.
    pub fn path_timing(
        &self,
        city: CityId,
        path: &[String],
        start_hour: u8,
        date: NaiveDate,
    ) -> Result<Vec<PathStep>, SolveError> {
        let graph = self.graph(city)?;
        let bucket = self.config.bucket_minutes.max(1) as i64;

        let mut steps = Vec::new();
        let mut cumulative_minutes = 0i64;
        let mut cumulative_earnings = 0.0;

        for (step, pair) in path.windows(2).enumerate() {
            let from = self.zone_index(graph, city, &pair[0])?;
            let to = self.zone_index(graph, city, &pair[1])?;

            let hour = wall_clock_hour(start_hour, cumulative_minutes);
            let date_at = date_at_elapsed(date, cumulative_minutes);
            let Some(stats) = graph.edge(from, to) else {
                continue;
            };

            let base_fare = stats.fare_at(hour as usize);
            let travel = stats.duration_at(hour as usize);
            let surge_mult = self.surge.surge_multiplier(city, hour);
            let weather_mult = self.weather.weather_multiplier(city, date_at);
            let fare = base_fare * surge_mult * weather_mult;
            let wait = self.wait_minutes(graph, to, hour);
            let rounded = round_to_bucket(travel + wait, bucket);

            cumulative_minutes += rounded;
            cumulative_earnings += fare;

            steps.push(PathStep {
                step: step + 1,
                from: pair[0].clone(),
                to: pair[1].clone(),
                hour,
                date: date_at,
                base_fare,
                surge_multiplier: surge_mult,
                weather_multiplier: weather_mult,
                fare,
                travel_minutes: travel,
                wait_minutes: wait,
                step_minutes: travel + wait,
                rounded_minutes: rounded,
                cumulative_minutes,
                cumulative_earnings,
                hourly_rate: if cumulative_minutes > 0 {
                    cumulative_earnings / (cumulative_minutes as f64 / 60.0)
                } else {
                    0.0
                },
            });
        }
        Ok(steps)
    }

    /// Closed-form expected earning rate in currency per hour for a driver
    /// sitting at a zone: probability-weighted fare over the expected trip
    /// time (travel plus wait at the origin).
    pub fn earning_rate(
        &self,
        city: CityId,
        zone: &str,
        hour: u8,
        date: NaiveDate,
    ) -> Result<f64, SolveError> {
        let graph = self.graph(city)?;
        let origin = self.zone_index(graph, city, zone)?;

        let probabilities = self
            .transitions
            .probabilities(city, hour, graph, self.config.epsilon);
        let surge_mult = self.surge.surge_multiplier(city, hour);
        let weather_mult = self.weather.weather_multiplier(city, date);

        let mut expected_fare = 0.0;
        let mut expected_travel = 0.0;
        let mut demand = 0u32;
        for (j, stats) in graph.edges_from(origin) {
            let p = probabilities[origin][*j];
            expected_fare += p * stats.fare_at(hour as usize) * surge_mult * weather_mult;
            expected_travel += p * stats.duration_at(hour as usize);
            demand += stats.trips_at(hour as usize);
        }

        let wait = 60.0 / (demand as f64).max(self.config.lambda_floor);
        let total_minutes = expected_travel + wait;
        if total_minutes <= 0.0 {
            return Ok(0.0);
        }
        Ok(expected_fare / (total_minutes / 60.0))
    }
}

// ============================================================================
// Time helpers
// ============================================================================

fn wall_clock_hour(start_hour: u8, minutes_elapsed: i64) -> u8 {
    ((start_hour as i64 + minutes_elapsed / 60) % 24) as u8
}

/// Date after `minutes_elapsed`, counted from midnight of the start date.
fn date_at_elapsed(start: NaiveDate, minutes_elapsed: i64) -> NaiveDate {
    (start.and_time(NaiveTime::MIN) + ChronoDuration::minutes(minutes_elapsed)).date()
}

/// Round-half-up to the nearest whole bucket. A known approximation: a move
/// that barely fits (or barely misses) the remaining budget can flip
/// feasibility relative to continuous time.
fn round_to_bucket(minutes: f64, bucket: i64) -> i64 {
    (minutes / bucket as f64).round() as i64 * bucket
}

/// Forward-simulate the recorded policy from the start state. Stops at the
/// terminal layer, on an idle policy, when the booked move no longer fits,
/// or at a hard step cap that bounds pathological cyclic policies.
fn extract_path(
    graph: &MobilityGraph,
    policy: &[Vec<Option<(usize, i64)>>],
    start: usize,
    horizon: i64,
    bucket: i64,
    work_hours: u32,
) -> Vec<String> {
    let step_cap = work_hours as usize * 4;
    let mut path = Vec::new();
    let mut current = start;
    let mut time_remaining = horizon;

    while time_remaining > 0 {
        path.push(graph.zone(current).id.clone());

        let level = (time_remaining / bucket) as usize;
        match policy[level][current] {
            Some((next, transition)) if transition < time_remaining => {
                current = next;
                time_remaining -= transition;
                if path.len() > step_cap {
                    break;
                }
            }
            _ => break,
        }
    }
    path
}
