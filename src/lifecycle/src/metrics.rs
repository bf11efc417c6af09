//! Snapshot Lifecycle Metrics
//!
//! Thread-safe counters for one lifecycle run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe metrics for tracking snapshot creation and reaping
#[derive(Debug, Clone, Default)]
pub struct LifecycleMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Volumes returned by discovery
    volumes_discovered: AtomicUsize,
    /// Volumes that were gone by the time they were snapshotted
    volumes_missing: AtomicUsize,
    snapshots_created: AtomicUsize,
    snapshots_simulated: AtomicUsize,
    /// Create or tag calls that failed
    snapshot_failures: AtomicUsize,
    /// Snapshots compared against a retention window
    snapshots_evaluated: AtomicUsize,
    /// Pending snapshots skipped regardless of age
    pending_skipped: AtomicUsize,
    snapshots_purged: AtomicUsize,
    purges_simulated: AtomicUsize,
    purge_failures: AtomicUsize,
    /// Volumes whose snapshot listing failed
    reap_failures: AtomicUsize,
}

impl LifecycleMetrics {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_volumes_discovered(&self, count: usize) {
        self.inner
            .volumes_discovered
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_volume_missing(&self) {
        self.inner.volumes_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_created(&self) {
        self.inner.snapshots_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_simulated(&self) {
        self.inner
            .snapshots_simulated
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_failure(&self) {
        self.inner.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_evaluated(&self) {
        self.inner
            .snapshots_evaluated
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pending_skipped(&self) {
        self.inner.pending_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_purged(&self) {
        self.inner.snapshots_purged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purge_simulated(&self) {
        self.inner.purges_simulated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purge_failure(&self) {
        self.inner.purge_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reap_failure(&self) {
        self.inner.reap_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn volumes_discovered(&self) -> usize {
        self.inner.volumes_discovered.load(Ordering::Relaxed)
    }

    pub fn volumes_missing(&self) -> usize {
        self.inner.volumes_missing.load(Ordering::Relaxed)
    }

    pub fn snapshots_created(&self) -> usize {
        self.inner.snapshots_created.load(Ordering::Relaxed)
    }

    pub fn snapshots_simulated(&self) -> usize {
        self.inner.snapshots_simulated.load(Ordering::Relaxed)
    }

    pub fn snapshot_failures(&self) -> usize {
        self.inner.snapshot_failures.load(Ordering::Relaxed)
    }

    pub fn snapshots_evaluated(&self) -> usize {
        self.inner.snapshots_evaluated.load(Ordering::Relaxed)
    }

    pub fn pending_skipped(&self) -> usize {
        self.inner.pending_skipped.load(Ordering::Relaxed)
    }

    pub fn snapshots_purged(&self) -> usize {
        self.inner.snapshots_purged.load(Ordering::Relaxed)
    }

    pub fn purges_simulated(&self) -> usize {
        self.inner.purges_simulated.load(Ordering::Relaxed)
    }

    pub fn purge_failures(&self) -> usize {
        self.inner.purge_failures.load(Ordering::Relaxed)
    }

    pub fn reap_failures(&self) -> usize {
        self.inner.reap_failures.load(Ordering::Relaxed)
    }

    /// Get a summary of all metrics
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            volumes_discovered: self.volumes_discovered(),
            volumes_missing: self.volumes_missing(),
            snapshots_created: self.snapshots_created(),
            snapshots_simulated: self.snapshots_simulated(),
            snapshot_failures: self.snapshot_failures(),
            snapshots_evaluated: self.snapshots_evaluated(),
            pending_skipped: self.pending_skipped(),
            snapshots_purged: self.snapshots_purged(),
            purges_simulated: self.purges_simulated(),
            purge_failures: self.purge_failures(),
            reap_failures: self.reap_failures(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub volumes_discovered: usize,
    pub volumes_missing: usize,
    pub snapshots_created: usize,
    pub snapshots_simulated: usize,
    pub snapshot_failures: usize,
    pub snapshots_evaluated: usize,
    pub pending_skipped: usize,
    pub snapshots_purged: usize,
    pub purges_simulated: usize,
    pub purge_failures: usize,
    pub reap_failures: usize,
}

impl MetricsSummary {
    /// Failures that were isolated during the run.
    pub fn total_failures(&self) -> usize {
        self.snapshot_failures + self.purge_failures + self.reap_failures
    }

    /// Log the metrics summary
    pub fn log(&self) {
        tracing::info!("=== Snapshot Lifecycle Summary ===");
        tracing::info!(
            "Volumes: {} discovered, {} missing",
            self.volumes_discovered,
            self.volumes_missing
        );
        tracing::info!(
            "Snapshots: {} created, {} simulated, {} failed",
            self.snapshots_created,
            self.snapshots_simulated,
            self.snapshot_failures
        );
        tracing::info!(
            "Reaping: {} evaluated, {} pending skipped, {} purged, {} simulated, {} failed",
            self.snapshots_evaluated,
            self.pending_skipped,
            self.snapshots_purged,
            self.purges_simulated,
            self.purge_failures
        );
        if self.reap_failures > 0 {
            tracing::info!("Volumes with failed snapshot listings: {}", self.reap_failures);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = LifecycleMetrics::new();
        assert_eq!(metrics.summary(), MetricsSummary::default());
    }

    #[test]
    fn test_metrics_increment() {
        let metrics = LifecycleMetrics::new();

        metrics.record_volumes_discovered(4);
        metrics.record_volume_missing();
        metrics.record_snapshot_created();
        metrics.record_snapshot_created();
        metrics.record_purge_failure();
        metrics.record_reap_failure();

        let summary = metrics.summary();
        assert_eq!(summary.volumes_discovered, 4);
        assert_eq!(summary.volumes_missing, 1);
        assert_eq!(summary.snapshots_created, 2);
        assert_eq!(summary.total_failures(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = LifecycleMetrics::new();
        let clone = metrics.clone();

        clone.record_snapshot_purged();
        assert_eq!(metrics.snapshots_purged(), 1);
    }
}
