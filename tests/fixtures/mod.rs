//! Test fixtures for shift-planner.
//!
//! Provides synthetic cities with known statistics so expected solver
//! values can be worked out by hand, plus a trip builder with sensible
//! defaults.

// Each test binary uses its own slice of the fixtures.
#![allow(dead_code)]

pub mod cities;

pub use cities::*;
