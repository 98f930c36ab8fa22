//! Batch analyses layered on the planner: schedule comparison, weekly
//! earnings, zone popularity, and surge sensitivity.

use std::collections::HashSet;

use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::Serialize;

use crate::graph::CityId;
use crate::solver::{Planner, SolveError};
use crate::traits::UniformSurge;

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    pub start_hour: u8,
    pub work_hours: u32,
    pub schedule: String,
    pub earnings: f64,
    pub hourly_rate: f64,
    pub path: Vec<String>,
}

/// Compare candidate (start hour, work hours) schedules from the same
/// starting zone on the same date; rows come back sorted by earnings,
/// descending.
pub fn compare_work_schedules(
    planner: &Planner,
    city: CityId,
    start_zone: &str,
    date: NaiveDate,
    schedules: &[(u8, u32)],
) -> Result<Vec<ScheduleRow>, SolveError> {
    let mut rows = Vec::with_capacity(schedules.len());
    for &(start_hour, work_hours) in schedules {
        let solution = planner.solve(city, start_zone, start_hour, work_hours, date)?;
        rows.push(ScheduleRow {
            start_hour,
            work_hours,
            schedule: format!(
                "{start_hour:02}:00-{:02}:00",
                (start_hour as u32 + work_hours) % 24
            ),
            earnings: solution.earnings,
            hourly_rate: if work_hours > 0 {
                solution.earnings / work_hours as f64
            } else {
                0.0
            },
            path: solution.path,
        });
    }
    rows.sort_by(|a, b| {
        b.earnings
            .partial_cmp(&a.earnings)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub weekday: String,
    pub earnings: f64,
    pub hourly_rate: f64,
    pub weather_multiplier: f64,
    /// Number of distinct zones the optimal path visits.
    pub path_diversity: usize,
    pub path: Vec<String>,
}

/// Same shift on seven consecutive days starting at `start_date`.
pub fn weekly_analysis(
    planner: &Planner,
    city: CityId,
    start_zone: &str,
    start_hour: u8,
    work_hours: u32,
    start_date: NaiveDate,
) -> Result<Vec<DailyRow>, SolveError> {
    let mut rows = Vec::with_capacity(7);
    for day_offset in 0..7 {
        let date = start_date + ChronoDuration::days(day_offset);
        let solution = planner.solve(city, start_zone, start_hour, work_hours, date)?;
        let distinct: HashSet<&String> = solution.path.iter().collect();
        rows.push(DailyRow {
            date,
            weekday: date.format("%A").to_string(),
            earnings: solution.earnings,
            hourly_rate: if work_hours > 0 {
                solution.earnings / work_hours as f64
            } else {
                0.0
            },
            weather_multiplier: planner.weather_multiplier(city, date),
            path_diversity: distinct.len(),
            path: solution.path,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct ZonePopularityRow {
    pub zone: String,
    pub incoming_trips: u32,
    pub outgoing_trips: u32,
    pub net_flow: i64,
    pub total_activity: u32,
    pub incoming_avg_fare: f64,
    pub outgoing_avg_fare: f64,
    pub earning_rate: f64,
}

/// Rank a city's zones by attractiveness at a given hour: hourly trip flows
/// in and out, trip-weighted average fares, and the closed-form earning
/// rate. Sorted by earning rate, descending.
pub fn zone_popularity(
    planner: &Planner,
    city: CityId,
    hour: u8,
    date: NaiveDate,
) -> Result<Vec<ZonePopularityRow>, SolveError> {
    let graph = planner
        .store()
        .graph(city)
        .ok_or(SolveError::CityNotFound(city))?;

    let mut rows = Vec::with_capacity(graph.zone_count());
    for (index, zone) in graph.zones().iter().enumerate() {
        let mut incoming_trips = 0u32;
        let mut incoming_fare_weighted = 0.0;
        for source in 0..graph.zone_count() {
            if let Some(stats) = graph.edge(source, index) {
                let trips = stats.trips_at(hour as usize);
                incoming_trips += trips;
                incoming_fare_weighted += stats.fare_at(hour as usize) * trips as f64;
            }
        }

        let mut outgoing_trips = 0u32;
        let mut outgoing_fare_weighted = 0.0;
        for (_, stats) in graph.edges_from(index) {
            let trips = stats.trips_at(hour as usize);
            outgoing_trips += trips;
            outgoing_fare_weighted += stats.fare_at(hour as usize) * trips as f64;
        }

        rows.push(ZonePopularityRow {
            zone: zone.id.clone(),
            incoming_trips,
            outgoing_trips,
            net_flow: incoming_trips as i64 - outgoing_trips as i64,
            total_activity: incoming_trips + outgoing_trips,
            incoming_avg_fare: if incoming_trips > 0 {
                incoming_fare_weighted / incoming_trips as f64
            } else {
                0.0
            },
            outgoing_avg_fare: if outgoing_trips > 0 {
                outgoing_fare_weighted / outgoing_trips as f64
            } else {
                0.0
            },
            earning_rate: planner.earning_rate(city, &zone.id, hour, date)?,
        });
    }

    rows.sort_by(|a, b| {
        b.earning_rate
            .partial_cmp(&a.earning_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct SensitivityRow {
    pub surge_multiplier: f64,
    pub earnings: f64,
    pub hourly_rate: f64,
    /// Earnings relative to the first scenario in the sweep.
    pub vs_baseline: f64,
}

/// Re-solve the same query under uniform surge overrides.
///
/// Runs through the cache-bypassing path: overridden multipliers must
/// neither read nor pollute the solved-query caches.
pub fn surge_sensitivity(
    planner: &Planner,
    city: CityId,
    start_zone: &str,
    start_hour: u8,
    work_hours: u32,
    date: NaiveDate,
    multipliers: &[f64],
) -> Result<Vec<SensitivityRow>, SolveError> {
    let mut rows: Vec<SensitivityRow> = Vec::with_capacity(multipliers.len());
    for &multiplier in multipliers {
        let solution = planner.solve_with_surge(
            city,
            start_zone,
            start_hour,
            work_hours,
            date,
            &UniformSurge(multiplier),
        )?;
        let vs_baseline = rows
            .first()
            .map(|baseline: &SensitivityRow| solution.earnings / baseline.earnings)
            .unwrap_or(1.0);
        rows.push(SensitivityRow {
            surge_multiplier: multiplier,
            earnings: solution.earnings,
            hourly_rate: if work_hours > 0 {
                solution.earnings / work_hours as f64
            } else {
                0.0
            },
            vs_baseline,
        });
    }
    Ok(rows)
}
