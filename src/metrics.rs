use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-stage counters, shared between the stage's workers and the pipeline
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values taken from the stage's input
    received: Arc<AtomicU64>,
    /// Values handed to the stage's output
    forwarded: Arc<AtomicU64>,
    /// Values filtered out or displaced by buffer overflow
    discarded: Arc<AtomicU64>,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            discarded: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn total_discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Forwarded values per second since the stage was created
    pub fn throughput_vps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_forwarded() as f64 / elapsed
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_received: self.total_received(),
            total_forwarded: self.total_forwarded(),
            total_discarded: self.total_discarded(),
            throughput_vps: self.throughput_vps(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub total_forwarded: u64,
    pub total_discarded: u64,
    pub throughput_vps: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Forwarded: {}, Discarded: {}, Throughput: {:.2} values/s, \
             Elapsed: {:.2}s",
            self.total_received,
            self.total_forwarded,
            self.total_discarded,
            self.throughput_vps,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_shared_between_clones() {
        let metrics = StageMetrics::new();
        let clone = metrics.clone();
        for _ in 0..5 {
            clone.record_received();
        }
        clone.record_forwarded();
        clone.record_discarded();
        clone.record_discarded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_received, 5);
        assert_eq!(snapshot.total_forwarded, 1);
        assert_eq!(snapshot.total_discarded, 2);
    }

    #[test]
    fn test_snapshot_format() {
        let metrics = StageMetrics::new();
        metrics.record_received();
        let line = metrics.snapshot().format();
        assert!(line.starts_with("Received: 1, Forwarded: 0, Discarded: 0"));
    }
}
