use std::collections::HashMap;

/// Latency samples stop widening the window after this many fetches.
const SAMPLE_CAP: u32 = 50;

/// Running latency statistics for one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainPerformance {
    /// Running mean of observed fetch latency, in milliseconds.
    pub avg_latency_ms: u64,
    /// Number of samples folded into the mean, capped at 50.
    pub samples: u32,
}

impl DomainPerformance {
    /// Folds one latency observation into the running mean.
    pub fn record(&mut self, latency_ms: u64) {
        let n = self.samples as u64;
        let total = self.avg_latency_ms * n + latency_ms;
        self.avg_latency_ms =
            ((total as f64) / ((n + 1) as f64)).round() as u64;
        self.samples = (self.samples + 1).min(SAMPLE_CAP);
    }
}

/// Tracks per-host fetch timing for the politeness scheduler.
#[derive(Debug, Default)]
pub struct DomainTracker {
    last_fetch: HashMap<String, i64>,
    performance: HashMap<String, DomainPerformance>,
}

impl DomainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch milliseconds of the last fetch to a host, if any.
    pub fn last_fetch_ms(&self, host: &str) -> Option<i64> {
        self.last_fetch.get(host).copied()
    }

    /// Marks a fetch to a host at the given epoch-milliseconds instant.
    pub fn mark_fetched(&mut self, host: &str, now_ms: i64) {
        self.last_fetch.insert(host.to_string(), now_ms);
    }

    /// Records an observed latency for a host.
    pub fn record_latency(&mut self, host: &str, latency_ms: u64) {
        self.performance
            .entry(host.to_string())
            .or_default()
            .record(latency_ms);
    }

    /// The running average latency for a host, if any samples exist.
    pub fn avg_latency_ms(&self, host: &str) -> Option<u64> {
        self.performance.get(host).map(|p| p.avg_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_sets_average() {
        let mut perf = DomainPerformance::default();
        perf.record(300);
        assert_eq!(perf.avg_latency_ms, 300);
        assert_eq!(perf.samples, 1);
    }

    #[test]
    fn test_running_mean() {
        let mut perf = DomainPerformance::default();
        perf.record(100);
        perf.record(200);
        assert_eq!(perf.avg_latency_ms, 150);
        perf.record(300);
        assert_eq!(perf.avg_latency_ms, 200);
        assert_eq!(perf.samples, 3);
    }

    #[test]
    fn test_sample_count_capped() {
        let mut perf = DomainPerformance::default();
        for _ in 0..80 {
            perf.record(100);
        }
        assert_eq!(perf.samples, 50);
        assert_eq!(perf.avg_latency_ms, 100);
    }

    #[test]
    fn test_capped_window_stays_responsive() {
        let mut perf = DomainPerformance::default();
        for _ in 0..50 {
            perf.record(100);
        }
        // With n pinned at 50, a latency spike still moves the mean.
        perf.record(5100);
        assert!(perf.avg_latency_ms > 100);
    }

    #[test]
    fn test_tracker_last_fetch() {
        let mut tracker = DomainTracker::new();
        assert_eq!(tracker.last_fetch_ms("example.com"), None);
        tracker.mark_fetched("example.com", 1000);
        assert_eq!(tracker.last_fetch_ms("example.com"), Some(1000));
        tracker.mark_fetched("example.com", 2000);
        assert_eq!(tracker.last_fetch_ms("example.com"), Some(2000));
    }

    #[test]
    fn test_tracker_latency_per_host() {
        let mut tracker = DomainTracker::new();
        tracker.record_latency("a.com", 100);
        tracker.record_latency("b.com", 900);
        assert_eq!(tracker.avg_latency_ms("a.com"), Some(100));
        assert_eq!(tracker.avg_latency_ms("b.com"), Some(900));
        assert_eq!(tracker.avg_latency_ms("c.com"), None);
    }
}
