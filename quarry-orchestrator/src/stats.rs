//! Call and cache statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every caller of one orchestrator.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    api_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Snapshot the counters together with the current cache and rate state.
    pub fn snapshot(&self, cache_size: usize, remaining_calls: usize) -> StatsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        StatsSnapshot {
            api_calls: self.api_calls(),
            cache_hits,
            cache_misses,
            cache_size,
            remaining_calls,
            hit_rate: hit_rate(cache_hits, cache_misses),
        }
    }
}

/// Point-in-time view of the orchestrator's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Primitive calls dispatched to the transport, successful or not.
    pub api_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Live cache entries.
    pub cache_size: usize,
    /// Calls still available in the current rate window.
    pub remaining_calls: usize,
    /// hits / (hits + misses), or 0 before any read.
    pub hit_rate: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_zero_without_reads() {
        let stats = StatsRecorder::new();
        let snapshot = stats.snapshot(0, 60);
        assert_eq!(snapshot.hit_rate, 0.0);
        assert_eq!(snapshot.remaining_calls, 60);
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = StatsRecorder::new();
        stats.record_call();
        stats.record_miss();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();

        let snapshot = stats.snapshot(4, 59);
        assert_eq!(snapshot.api_calls, 1);
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_size, 4);
        assert!((snapshot.hit_rate - 0.75).abs() < f64::EPSILON);
    }
}
