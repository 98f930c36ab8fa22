use chrono::NaiveDate;
use shift_planner::graph::{GraphStore, TripRecord};

pub const CITY: u32 = 1;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
}

/// Builder for trip records with sensible defaults.
#[derive(Clone)]
pub struct TestTrip {
    city: u32,
    origin: String,
    dest: String,
    hour: u32,
    fare: f64,
    duration: f64,
}

impl TestTrip {
    pub fn new(origin: &str, dest: &str) -> Self {
        Self {
            city: CITY,
            origin: origin.to_string(),
            dest: dest.to_string(),
            hour: 8,
            fare: 10.0,
            duration: 15.0,
        }
    }

    pub fn city(mut self, city: u32) -> Self {
        self.city = city;
        self
    }

    pub fn hour(mut self, hour: u32) -> Self {
        self.hour = hour;
        self
    }

    pub fn fare(mut self, fare: f64) -> Self {
        self.fare = fare;
        self
    }

    pub fn duration(mut self, minutes: f64) -> Self {
        self.duration = minutes;
        self
    }

    pub fn build(&self) -> TripRecord {
        TripRecord {
            city_id: self.city,
            origin_zone: self.origin.clone(),
            dest_zone: self.dest.clone(),
            start_time: start_date().and_hms_opt(self.hour, 15, 0).unwrap(),
            fare: self.fare,
            duration_mins: self.duration,
            origin_lat: 41.38,
            origin_lon: 2.17,
            dest_lat: 41.40,
            dest_lon: 2.19,
        }
    }

    pub fn build_many(&self, count: usize) -> Vec<TripRecord> {
        std::iter::repeat_with(|| self.build()).take(count).collect()
    }
}

/// Two zones with symmetric traffic at hour 8: ten trips each way, fare 10,
/// 15 minutes of travel. With the default config each hop books 20 minutes
/// (15 travel + 6 wait, rounded to the bucket).
pub fn two_zone_city() -> GraphStore {
    let mut trips = TestTrip::new("a", "b").build_many(10);
    trips.extend(TestTrip::new("b", "a").build_many(10));
    GraphStore::build(&trips)
}

/// Zone "b" has traffic into it but nothing leaving it.
pub fn dead_end_city() -> GraphStore {
    GraphStore::build(&TestTrip::new("a", "b").build_many(5))
}

/// Four zones with clearly separated fare levels so rankings have a
/// predictable winner: the "d" <-> "c" corridor pays far better than the
/// "a" <-> "b" one.
pub fn four_zone_city() -> GraphStore {
    let mut trips = Vec::new();
    trips.extend(TestTrip::new("a", "b").fare(5.0).build_many(8));
    trips.extend(TestTrip::new("b", "a").fare(5.0).build_many(8));
    trips.extend(TestTrip::new("c", "d").fare(22.0).build_many(8));
    trips.extend(TestTrip::new("d", "c").fare(25.0).build_many(8));
    trips.extend(TestTrip::new("b", "c").fare(7.0).build_many(2));
    GraphStore::build(&trips)
}
