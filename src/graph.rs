//! Per-city mobility graphs built from historical trip records.
//!
//! Nodes are zones, edges carry hourly trip counts plus average fare and
//! travel time between zones. Graphs are built once by an offline ingestion
//! pass and are read-only afterwards, so they can be shared across
//! concurrent queries without synchronization.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub type CityId = u32;

pub const HOURS_PER_DAY: usize = 24;

/// A single historical trip, already assigned to zones by the offline
/// clustering step.
#[derive(Debug, Clone)]
pub struct TripRecord {
    pub city_id: CityId,
    pub origin_zone: String,
    pub dest_zone: String,
    pub start_time: NaiveDateTime,
    pub fare: f64,
    pub duration_mins: f64,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("trip data io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trip data csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Raw CSV row; `start_time` stays a string so both `T`- and
/// space-separated timestamps parse.
#[derive(Debug, Deserialize)]
struct RawTrip {
    city_id: CityId,
    origin_zone: String,
    dest_zone: String,
    start_time: String,
    fare: f64,
    duration_mins: f64,
    origin_lat: f64,
    origin_lon: f64,
    dest_lat: f64,
    dest_lon: f64,
}

fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Read trip records from CSV, dropping rows that cannot feed the graph
/// build (bad timestamps, non-finite money/time values, empty zone ids).
pub fn load_trip_records(path: impl AsRef<Path>) -> Result<Vec<TripRecord>, IngestError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in reader.deserialize::<RawTrip>() {
        let raw = row?;
        let Some(start_time) = parse_start_time(&raw.start_time) else {
            skipped += 1;
            continue;
        };
        if raw.origin_zone.is_empty()
            || raw.dest_zone.is_empty()
            || !raw.fare.is_finite()
            || !raw.duration_mins.is_finite()
        {
            skipped += 1;
            continue;
        }
        records.push(TripRecord {
            city_id: raw.city_id,
            origin_zone: raw.origin_zone,
            dest_zone: raw.dest_zone,
            start_time,
            fare: raw.fare,
            duration_mins: raw.duration_mins,
            origin_lat: raw.origin_lat,
            origin_lon: raw.origin_lon,
            dest_lat: raw.dest_lat,
            dest_lon: raw.dest_lon,
        });
    }

    if skipped > 0 {
        warn!(skipped, total = records.len(), "dropped invalid trip rows");
    }
    Ok(records)
}

/// A zone with its display centroid (mean of all coordinates observed while
/// it served as an origin or destination). The centroid is never used by
/// the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

/// Directed-edge statistics between two zones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStats {
    pub hourly_trips: [u32; HOURS_PER_DAY],
    pub hourly_fare: [Option<f64>; HOURS_PER_DAY],
    pub hourly_duration: [Option<f64>; HOURS_PER_DAY],
    pub trips: u32,
    pub avg_fare: f64,
    pub avg_duration: f64,
}

impl EdgeStats {
    pub fn trips_at(&self, hour: usize) -> u32 {
        self.hourly_trips[hour]
    }

    /// Hourly average fare, falling back to the edge-wide average when the
    /// hour was never observed.
    pub fn fare_at(&self, hour: usize) -> f64 {
        self.hourly_fare[hour].unwrap_or(self.avg_fare)
    }

    /// Hourly average travel time in minutes, with the same fallback.
    pub fn duration_at(&self, hour: usize) -> f64 {
        self.hourly_duration[hour].unwrap_or(self.avg_duration)
    }
}

/// One city's directed mobility graph.
///
/// Zones are kept sorted by id so iteration order (and therefore
/// tie-breaking everywhere downstream) is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobilityGraph {
    zones: Vec<Zone>,
    index: HashMap<String, usize>,
    out: Vec<Vec<(usize, EdgeStats)>>,
    outgoing_demand: Vec<[u32; HOURS_PER_DAY]>,
}

impl MobilityGraph {
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, index: usize) -> &Zone {
        &self.zones[index]
    }

    pub fn zone_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Outgoing edges, sorted by destination index.
    pub fn edges_from(&self, index: usize) -> &[(usize, EdgeStats)] {
        &self.out[index]
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&EdgeStats> {
        self.out[from]
            .iter()
            .find(|(dest, _)| *dest == to)
            .map(|(_, stats)| stats)
    }

    /// Sum of hourly trip counts leaving a zone; the solver's demand signal
    /// for wait-time estimation.
    pub fn outgoing_demand(&self, index: usize, hour: usize) -> u32 {
        self.outgoing_demand[index][hour]
    }

    pub fn total_trips(&self) -> u64 {
        self.out
            .iter()
            .flatten()
            .map(|(_, stats)| stats.trips as u64)
            .sum()
    }
}

#[derive(Debug, Default)]
struct EdgeAccumulator {
    trips: u32,
    fare_sum: f64,
    duration_sum: f64,
    hourly_trips: [u32; HOURS_PER_DAY],
    hourly_fare_sum: [f64; HOURS_PER_DAY],
    hourly_duration_sum: [f64; HOURS_PER_DAY],
}

#[derive(Debug, Default)]
struct CoordAccumulator {
    lat_sum: f64,
    lon_sum: f64,
    count: u32,
}

fn build_city_graph(records: &[&TripRecord]) -> MobilityGraph {
    let mut zone_ids: BTreeSet<&str> = BTreeSet::new();
    let mut coords: HashMap<&str, CoordAccumulator> = HashMap::new();
    let mut edges: BTreeMap<(&str, &str), EdgeAccumulator> = BTreeMap::new();

    for record in records {
        zone_ids.insert(&record.origin_zone);
        zone_ids.insert(&record.dest_zone);

        let origin = coords.entry(&record.origin_zone).or_default();
        origin.lat_sum += record.origin_lat;
        origin.lon_sum += record.origin_lon;
        origin.count += 1;
        let dest = coords.entry(&record.dest_zone).or_default();
        dest.lat_sum += record.dest_lat;
        dest.lon_sum += record.dest_lon;
        dest.count += 1;

        let hour = record.start_time.hour() as usize;
        let edge = edges
            .entry((record.origin_zone.as_str(), record.dest_zone.as_str()))
            .or_default();
        edge.trips += 1;
        edge.fare_sum += record.fare;
        edge.duration_sum += record.duration_mins;
        edge.hourly_trips[hour] += 1;
        edge.hourly_fare_sum[hour] += record.fare;
        edge.hourly_duration_sum[hour] += record.duration_mins;
    }

    let zones: Vec<Zone> = zone_ids
        .iter()
        .map(|id| {
            let acc = &coords[*id];
            Zone {
                id: (*id).to_string(),
                lat: acc.lat_sum / acc.count as f64,
                lon: acc.lon_sum / acc.count as f64,
            }
        })
        .collect();
    let index: HashMap<String, usize> = zones
        .iter()
        .enumerate()
        .map(|(i, zone)| (zone.id.clone(), i))
        .collect();

    let mut out: Vec<Vec<(usize, EdgeStats)>> = vec![Vec::new(); zones.len()];
    for ((origin, dest), acc) in &edges {
        let mut hourly_fare = [None; HOURS_PER_DAY];
        let mut hourly_duration = [None; HOURS_PER_DAY];
        for hour in 0..HOURS_PER_DAY {
            if acc.hourly_trips[hour] > 0 {
                let count = acc.hourly_trips[hour] as f64;
                hourly_fare[hour] = Some(acc.hourly_fare_sum[hour] / count);
                hourly_duration[hour] = Some(acc.hourly_duration_sum[hour] / count);
            }
        }
        let stats = EdgeStats {
            hourly_trips: acc.hourly_trips,
            hourly_fare,
            hourly_duration,
            trips: acc.trips,
            avg_fare: acc.fare_sum / acc.trips as f64,
            avg_duration: acc.duration_sum / acc.trips as f64,
        };
        out[index[*origin]].push((index[*dest], stats));
    }
    for edges in &mut out {
        edges.sort_by_key(|(dest, _)| *dest);
    }

    let outgoing_demand = out
        .iter()
        .map(|edges| {
            let mut demand = [0u32; HOURS_PER_DAY];
            for (_, stats) in edges {
                for hour in 0..HOURS_PER_DAY {
                    demand[hour] += stats.hourly_trips[hour];
                }
            }
            demand
        })
        .collect();

    MobilityGraph {
        zones,
        index,
        out,
        outgoing_demand,
    }
}

/// All per-city graphs for a deployment. Built once, then `Arc`-shared;
/// a rebuild constructs a fresh store and swaps the handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStore {
    graphs: HashMap<CityId, MobilityGraph>,
}

impl GraphStore {
    pub fn build(records: &[TripRecord]) -> Self {
        let mut by_city: BTreeMap<CityId, Vec<&TripRecord>> = BTreeMap::new();
        for record in records {
            by_city.entry(record.city_id).or_default().push(record);
        }

        let graphs: HashMap<CityId, MobilityGraph> = by_city
            .into_iter()
            .map(|(city, rows)| (city, build_city_graph(&rows)))
            .collect();

        for (city, graph) in &graphs {
            info!(
                city = *city,
                zones = graph.zone_count(),
                trips = graph.total_trips(),
                "built mobility graph"
            );
        }
        GraphStore { graphs }
    }

    pub fn graph(&self, city: CityId) -> Option<&MobilityGraph> {
        self.graphs.get(&city)
    }

    pub fn cities(&self) -> Vec<CityId> {
        let mut cities: Vec<CityId> = self.graphs.keys().copied().collect();
        cities.sort_unstable();
        cities
    }

    pub fn city_count(&self) -> usize {
        self.graphs.len()
    }
}
