//! shift-planner core
//!
//! Earnings planning for ride-sharing drivers: city mobility graphs built
//! from historical trips, a time-discretized value-iteration solver, and
//! the caching tiers that keep repeated queries cheap.

pub mod analysis;
pub mod cache;
pub mod graph;
pub mod snapshot;
pub mod solver;
pub mod surge;
pub mod traits;
pub mod transition;
pub mod weather;
