//! Laplace-smoothed transition probabilities per (city, hour).
//!
//! Smoothing guarantees every destination keeps strictly positive
//! probability even with zero observed trips, so the solver never treats an
//! unvisited route as impossible, while data-rich routes still dominate.

use std::sync::Arc;

use dashmap::DashMap;

use crate::graph::{CityId, MobilityGraph};

/// Row-stochastic matrix over the graph's full node set:
/// `matrix[i][j]` = probability that a trip leaving zone `i` ends in `j`.
pub type TransitionMatrix = Vec<Vec<f64>>;

/// `P(i->j) = (count(i,j) + eps) / (sum_k count(i,k) + eps * n)`
pub fn transition_matrix(graph: &MobilityGraph, hour: u8, epsilon: f64) -> TransitionMatrix {
    let n = graph.zone_count();
    let hour = hour as usize;
    let mut matrix = Vec::with_capacity(n);

    for i in 0..n {
        let total: u32 = graph
            .edges_from(i)
            .iter()
            .map(|(_, stats)| stats.trips_at(hour))
            .sum();
        let denominator = total as f64 + epsilon * n as f64;

        let mut row = vec![epsilon / denominator; n];
        for (j, stats) in graph.edges_from(i) {
            row[*j] = (stats.trips_at(hour) as f64 + epsilon) / denominator;
        }
        matrix.push(row);
    }
    matrix
}

/// Memo of transition matrices, keyed by (city, hour).
///
/// Lives inside a `Planner`, so a rebuilt graph store (which gets a fresh
/// planner) never sees stale probabilities.
#[derive(Debug, Default)]
pub struct TransitionCache {
    inner: DashMap<(CityId, u8), Arc<TransitionMatrix>>,
}

impl TransitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probabilities(
        &self,
        city: CityId,
        hour: u8,
        graph: &MobilityGraph,
        epsilon: f64,
    ) -> Arc<TransitionMatrix> {
        if let Some(hit) = self.inner.get(&(city, hour)) {
            return hit.clone();
        }
        let matrix = Arc::new(transition_matrix(graph, hour, epsilon));
        self.inner.insert((city, hour), matrix.clone());
        matrix
    }
}
