//! Snapshot creation for tracked volumes.

use crate::metrics::LifecycleMetrics;
use crate::provider::{CloudProvider, ProviderError, Region};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

/// What happened when a volume was snapshotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A snapshot was requested and stamped.
    Created { snapshot_id: String, timestamp: i64 },
    /// Dry run: the volume exists and would have been snapshotted.
    Simulated { timestamp: i64 },
    /// The volume no longer exists; nothing to do.
    VolumeMissing,
}

/// Requests snapshots and stamps them with their creation time.
pub struct SnapshotCreator {
    provider: Arc<dyn CloudProvider>,
    tag_name: String,
    metrics: LifecycleMetrics,
}

impl SnapshotCreator {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        tag_name: impl Into<String>,
        metrics: LifecycleMetrics,
    ) -> Self {
        Self {
            provider,
            tag_name: tag_name.into(),
            metrics,
        }
    }

    /// Human-readable description given to a new snapshot.
    pub fn description(timestamp: DateTime<Utc>) -> String {
        format!(
            "Snapper Backup {}",
            timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    /// Snapshots `volume_id` and tags the snapshot with the request time.
    ///
    /// A volume that cannot be found is logged and reported as
    /// [`SnapshotOutcome::VolumeMissing`]; it is not an error. In dry-run mode
    /// the lookup still happens but no snapshot is created or tagged.
    pub async fn snapshot_volume(
        &self,
        region: &Region,
        volume_id: &str,
        dry_run: bool,
    ) -> Result<SnapshotOutcome, ProviderError> {
        let now = Utc::now();
        let timestamp = now.timestamp();

        info!(
            region = %region,
            volume_id = %volume_id,
            timestamp = %now.to_rfc3339(),
            dry_run,
            "Snapshotting volume"
        );

        let Some(volume) = self.provider.get_volume(region, volume_id).await? else {
            error!(
                region = %region,
                volume_id = %volume_id,
                "Volume not found, skipping snapshot"
            );
            self.metrics.record_volume_missing();
            return Ok(SnapshotOutcome::VolumeMissing);
        };

        if dry_run {
            info!(
                region = %region,
                volume_id = %volume.id,
                tag = %self.tag_name,
                timestamp,
                "[DRY RUN] Would create and tag snapshot"
            );
            self.metrics.record_snapshot_simulated();
            return Ok(SnapshotOutcome::Simulated { timestamp });
        }

        let snapshot_id = self
            .provider
            .create_snapshot(region, &volume.id, &Self::description(now))
            .await?;

        // stamped with the request time, the snapshot may still be pending
        self.provider
            .add_tag(region, &snapshot_id, &self.tag_name, &timestamp.to_string())
            .await?;

        info!(
            region = %region,
            volume_id = %volume.id,
            snapshot_id = %snapshot_id,
            size_gib = ?volume.size_gib,
            timestamp,
            "Snapshot created"
        );
        self.metrics.record_snapshot_created();

        Ok(SnapshotOutcome::Created {
            snapshot_id,
            timestamp,
        })
    }
}
