//! Run-once orchestration of discovery, snapshot creation and reaping.

use crate::creator::{SnapshotCreator, SnapshotOutcome};
use crate::discovery::{ResourceDiscovery, TrackedVolume};
use crate::metrics::{LifecycleMetrics, MetricsSummary};
use crate::provider::{CloudProvider, ProviderError, Region};
use crate::reaper::{ReapOutcome, SnapshotReaper};
use crate::throttle::RateLimiter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Discovering,
    Snapshotting,
    Reaping,
    Done,
}

/// Settings fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Tag marking managed volumes and stamping their snapshots.
    pub tag_name: String,
    /// Retention expression for volumes whose tag has no value.
    pub default_retention: String,
    /// Pause after each tag or snapshot listing.
    pub pause: Duration,
    pub dry_run: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tag_name: "Snapper".to_string(),
            default_retention: "10.days".to_string(),
            pause: Duration::ZERO,
            dry_run: false,
        }
    }
}

/// What happened to one tracked volume.
#[derive(Debug, Clone)]
pub struct VolumeReport {
    pub region: Region,
    pub volume_id: String,
    pub snapshot: Result<SnapshotOutcome, String>,
    pub reap: Result<ReapOutcome, String>,
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    pub volumes: Vec<VolumeReport>,
    pub summary: MetricsSummary,
}

/// Snapshots every tracked volume and reaps its expired snapshots.
///
/// Volumes are processed one at a time in discovery order: a volume's
/// snapshot and reap are both attempted before the next volume starts.
/// Failures on one volume are logged and recorded in the report; only
/// region and tag discovery failures end the run.
pub struct LifecycleRunner {
    provider: Arc<dyn CloudProvider>,
    discovery: ResourceDiscovery,
    creator: SnapshotCreator,
    reaper: SnapshotReaper,
    settings: RunSettings,
    metrics: LifecycleMetrics,
    phase: RunPhase,
}

impl LifecycleRunner {
    pub fn new(provider: Arc<dyn CloudProvider>, settings: RunSettings) -> Self {
        let metrics = LifecycleMetrics::new();
        let limiter = RateLimiter::new(settings.pause);

        Self {
            discovery: ResourceDiscovery::new(provider.clone(), limiter),
            creator: SnapshotCreator::new(
                provider.clone(),
                settings.tag_name.clone(),
                metrics.clone(),
            ),
            reaper: SnapshotReaper::new(provider.clone(), limiter, metrics.clone()),
            provider,
            settings,
            metrics,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &LifecycleMetrics {
        &self.metrics
    }

    /// Runs one full pass.
    ///
    /// # Errors
    ///
    /// Returns an error if regions or volume tags cannot be listed. Per-volume
    /// failures are recorded in the report instead.
    pub async fn run(&mut self) -> Result<RunReport, ProviderError> {
        let started_at = Utc::now();
        let run_id = format!("snapper_{}", started_at.timestamp_millis());
        let dry_run = self.settings.dry_run;

        info!(
            run_id = %run_id,
            tag_name = %self.settings.tag_name,
            default_retention = %self.settings.default_retention,
            pause = ?self.settings.pause,
            dry_run,
            "Starting snapshot lifecycle run"
        );

        self.phase = RunPhase::Discovering;
        let regions = self.provider.list_regions().await?;
        let volumes = self
            .discovery
            .discover(
                &regions,
                &self.settings.tag_name,
                &self.settings.default_retention,
            )
            .await?;
        self.metrics.record_volumes_discovered(volumes.len());

        let mut reports = Vec::with_capacity(volumes.len());
        for volume in volumes {
            reports.push(self.process_volume(volume, dry_run).await);
        }

        self.phase = RunPhase::Done;
        let completed_at = Utc::now();
        let summary = self.metrics.summary();

        info!(
            run_id = %run_id,
            volumes = reports.len(),
            failures = summary.total_failures(),
            duration_ms = (completed_at - started_at).num_milliseconds(),
            dry_run,
            "Snapshot lifecycle run completed"
        );
        summary.log();

        Ok(RunReport {
            run_id,
            started_at,
            completed_at,
            dry_run,
            volumes: reports,
            summary,
        })
    }

    async fn process_volume(&mut self, volume: TrackedVolume, dry_run: bool) -> VolumeReport {
        let TrackedVolume {
            region,
            volume_id,
            retention,
        } = volume;

        self.phase = RunPhase::Snapshotting;
        let snapshot = match self
            .creator
            .snapshot_volume(&region, &volume_id, dry_run)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    region = %region,
                    volume_id = %volume_id,
                    error = %e,
                    "Failed to snapshot volume"
                );
                self.metrics.record_snapshot_failure();
                Err(e.to_string())
            }
        };

        self.phase = RunPhase::Reaping;
        let reap = match self
            .reaper
            .purge_expired(
                &retention,
                &region,
                &volume_id,
                &self.settings.tag_name,
                dry_run,
            )
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    region = %region,
                    volume_id = %volume_id,
                    error = %e,
                    "Failed to reap snapshots"
                );
                self.metrics.record_reap_failure();
                Err(e.to_string())
            }
        };

        VolumeReport {
            region,
            volume_id,
            snapshot,
            reap,
        }
    }
}
