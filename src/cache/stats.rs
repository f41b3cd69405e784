//! Pool Statistics Module
//!
//! Tracks lookup outcomes and medium failures for a pool.

use serde::Serialize;

// == Pool Stats ==
/// Counters describing how a pool has been used.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    /// Lookups that resolved to a hit
    pub hits: u64,
    /// Lookups that produced a placeholder
    pub misses: u64,
    /// Stale items lazily removed on read
    pub evictions: u64,
    /// Saves the medium refused
    pub write_failures: u64,
    /// Items currently committed
    pub committed: usize,
    /// Items currently pending commit
    pub deferred: usize,
}

impl PoolStats {
    // == Constructor ==
    /// Creates a new PoolStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }

    // == Update Container Sizes ==
    pub fn set_sizes(&mut self, committed: usize, deferred: usize) {
        self.committed = committed;
        self.deferred = deferred;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = PoolStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.write_failures, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(PoolStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = PoolStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_counters() {
        let mut stats = PoolStats::new();
        stats.record_eviction();
        stats.record_write_failure();
        stats.record_write_failure();
        stats.set_sizes(3, 2);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.write_failures, 2);
        assert_eq!((stats.committed, stats.deferred), (3, 2));
    }
}
