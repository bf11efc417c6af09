//! Expiry of previously created snapshots.
//!
//! ## Safety Guarantees
//!
//! - Pending snapshots are never deleted, whatever their age
//! - Snapshots without a usable timestamp tag are never deleted
//! - A failed deletion is logged and recorded; the remaining snapshots of the
//!   volume are still processed
//! - Dry-run mode evaluates everything and deletes nothing

use crate::metrics::LifecycleMetrics;
use crate::provider::{CloudProvider, ProviderError, Region, SnapshotStatus};
use crate::retention::RetentionWindow;
use crate::throttle::RateLimiter;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A deletion that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFailure {
    pub snapshot_id: String,
    pub error: String,
}

/// Result of reaping one volume's snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapOutcome {
    /// Snapshots compared against the retention window.
    pub evaluated: usize,
    pub pending_skipped: usize,
    pub purged: Vec<String>,
    /// Dry run: snapshots that would have been purged.
    pub simulated: Vec<String>,
    pub failures: Vec<PurgeFailure>,
}

/// Deletes managed snapshots that fall outside their volume's retention window.
pub struct SnapshotReaper {
    provider: Arc<dyn CloudProvider>,
    limiter: RateLimiter,
    metrics: LifecycleMetrics,
}

impl SnapshotReaper {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        limiter: RateLimiter,
        metrics: LifecycleMetrics,
    ) -> Self {
        Self {
            provider,
            limiter,
            metrics,
        }
    }

    /// Purges the expired snapshots of `volume_id` tagged with `tag_name`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the snapshot listing fails. Individual
    /// deletion failures are tracked in the outcome.
    pub async fn purge_expired(
        &self,
        retention: &RetentionWindow,
        region: &Region,
        volume_id: &str,
        tag_name: &str,
        dry_run: bool,
    ) -> Result<ReapOutcome, ProviderError> {
        let snapshots = self
            .provider
            .list_snapshots(region, volume_id, tag_name)
            .await?;

        debug!(
            region = %region,
            volume_id = %volume_id,
            snapshots = snapshots.len(),
            cutoff = retention.cutoff(),
            "Listed managed snapshots"
        );

        let mut outcome = ReapOutcome::default();
        let mut snapshots = self.limiter.throttle_iter(snapshots);

        while let Some(snapshot) = snapshots.next().await {
            if snapshot.status == SnapshotStatus::Pending {
                debug!(
                    region = %region,
                    volume_id = %volume_id,
                    snapshot_id = %snapshot.id,
                    "Skipping pending snapshot"
                );
                outcome.pending_skipped += 1;
                self.metrics.record_pending_skipped();
                continue;
            }

            outcome.evaluated += 1;
            self.metrics.record_snapshot_evaluated();

            let created_at = snapshot.tag(tag_name);
            if !retention.should_purge(&created_at) {
                continue;
            }

            if dry_run {
                info!(
                    region = %region,
                    volume_id = %volume_id,
                    snapshot_id = %snapshot.id,
                    status = %snapshot.status,
                    created_at = ?created_at,
                    "[DRY RUN] Would purge snapshot"
                );
                self.metrics.record_purge_simulated();
                outcome.simulated.push(snapshot.id);
                continue;
            }

            info!(
                region = %region,
                volume_id = %volume_id,
                snapshot_id = %snapshot.id,
                status = %snapshot.status,
                created_at = ?created_at,
                "Purging snapshot"
            );

            match self.provider.delete_snapshot(region, &snapshot.id).await {
                Ok(()) => {
                    self.metrics.record_snapshot_purged();
                    outcome.purged.push(snapshot.id);
                }
                Err(e) => {
                    let message = e.to_string();
                    let details = anyhow::Error::new(e);
                    error!(
                        region = %region,
                        volume_id = %volume_id,
                        snapshot_id = %snapshot.id,
                        error = %message,
                        details = ?details,
                        "Failed to purge snapshot"
                    );
                    self.metrics.record_purge_failure();
                    outcome.failures.push(PurgeFailure {
                        snapshot_id: snapshot.id,
                        error: message,
                    });
                }
            }
        }

        Ok(outcome)
    }
}
