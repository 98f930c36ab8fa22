//! Solved-query caching: canonical keys, the process-local memo, and the
//! distributed HTTP cache adapter.
//!
//! The two solved-query tiers share one canonical key derivation but are
//! deliberately not kept coherent with each other: the local memo is a fast
//! path that dies with the process, the distributed tier is the best-effort
//! source of truth across processes until its TTL lapses.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::graph::CityId;
use crate::solver::Solution;
use crate::traits::SolutionCache;

/// Default expiry for distributed entries.
pub const SOLVE_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Canonical key shared by every cache tier.
pub fn solve_cache_key(
    city: CityId,
    start_zone: &str,
    start_hour: u8,
    work_hours: u32,
    date: NaiveDate,
) -> String {
    format!(
        "dp:{city}:{start_zone}:{start_hour}:{work_hours}:{}",
        date.format("%Y-%m-%d")
    )
}

/// Process-local memo of solved queries.
///
/// Each key owns a `OnceLock` cell, so concurrent callers for the same key
/// coalesce onto a single computation while distinct keys proceed in
/// parallel. Unbounded within a process; lost on restart.
#[derive(Debug, Default)]
pub struct LocalMemo {
    cells: DashMap<String, Arc<OnceLock<Solution>>>,
}

impl LocalMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized solution for `key`, computing it at most once.
    pub fn get_or_solve(&self, key: &str, solve: impl FnOnce() -> Solution) -> Solution {
        let cell = self
            .cells
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        cell.get_or_init(solve).clone()
    }

    pub fn peek(&self, key: &str) -> Option<Solution> {
        self.cells
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RedisHttpConfig {
    /// Base URL of a Webdis endpoint fronting the shared Redis.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RedisHttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7379".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Distributed solved-query cache over the Webdis REST protocol
/// (`GET /GET/<key>`, `PUT /SETEX/<key>/<ttl>` with the value as body).
///
/// Every failure mode degrades to a miss or a dropped write; the solver
/// never waits longer than the configured timeout and never fails because
/// the cache is unreachable.
#[derive(Debug, Clone)]
pub struct RedisHttpCache {
    config: RedisHttpConfig,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct GetReply {
    #[serde(rename = "GET")]
    value: Option<String>,
}

impl RedisHttpCache {
    pub fn new(config: RedisHttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl SolutionCache for RedisHttpCache {
    fn get(&self, key: &str) -> Option<Solution> {
        let url = format!("{}/GET/{}", self.config.base_url, key);

        let reply = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<GetReply>());

        match reply {
            Ok(GetReply { value: Some(raw) }) => match serde_json::from_str::<Solution>(&raw) {
                Ok(solution) => Some(solution),
                Err(err) => {
                    warn!(key, %err, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(GetReply { value: None }) => None,
            Err(err) => {
                warn!(key, %err, "distributed cache read failed, treating as miss");
                None
            }
        }
    }

    fn put(&self, key: &str, solution: &Solution, ttl: Duration) {
        let url = format!(
            "{}/SETEX/{}/{}",
            self.config.base_url,
            key,
            ttl.as_secs()
        );
        let body = match serde_json::to_string(solution) {
            Ok(body) => body,
            Err(err) => {
                warn!(key, %err, "failed to encode solution for cache");
                return;
            }
        };

        match self
            .client
            .put(url)
            .body(body)
            .send()
            .and_then(|resp| resp.error_for_status())
        {
            Ok(_) => debug!(key, ttl_secs = ttl.as_secs(), "cached solution"),
            Err(err) => warn!(key, %err, "distributed cache write failed, dropping entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn key_derivation_is_canonical() {
        let key = solve_cache_key(3, "c_3_2", 8, 8, date(2023, 1, 15));
        assert_eq!(key, "dp:3:c_3_2:8:8:2023-01-15");
    }

    #[test]
    fn memo_computes_each_key_once() {
        let memo = LocalMemo::new();
        let calls = AtomicUsize::new(0);

        let solve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Solution {
                earnings: 12.5,
                path: vec!["a".to_string()],
            }
        };
        let first = memo.get_or_solve("dp:1:a:8:4:2023-01-15", solve);
        let second = memo.get_or_solve("dp:1:a:8:4:2023-01-15", solve);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn unreachable_endpoint_reads_as_miss() {
        // Reserved TEST-NET-1 address: nothing is listening.
        let cache = RedisHttpCache::new(RedisHttpConfig {
            base_url: "http://192.0.2.1:7379".to_string(),
            timeout_secs: 1,
        })
        .expect("client builds");

        assert!(cache.get("dp:1:a:8:4:2023-01-15").is_none());
        // And the write is silently dropped.
        let solution = Solution {
            earnings: 1.0,
            path: vec!["a".to_string()],
        };
        cache.put("dp:1:a:8:4:2023-01-15", &solution, SOLVE_CACHE_TTL);
    }
}
