//! Snapper Lifecycle Library
//!
//! Automated lifecycle management for block-storage snapshots: discover the
//! volumes tagged for protection, snapshot each of them and delete the
//! snapshots that have outlived the volume's retention window.
//!
//! # Run structure
//!
//! - [`discovery`]: scan every region for tagged volumes and resolve their retention
//! - [`creator`]: request and timestamp a new snapshot per volume
//! - [`reaper`]: purge expired snapshots with per-snapshot failure isolation
//! - [`runner`]: the run-once batch job tying the three together, with dry-run support
//!
//! The provider itself is abstracted behind [`CloudProvider`].

pub mod creator;
pub mod discovery;
pub mod metrics;
pub mod provider;
pub mod reaper;
pub mod retention;
pub mod runner;
pub mod throttle;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use creator::{SnapshotCreator, SnapshotOutcome};
pub use discovery::{ResourceDiscovery, TrackedVolume};
pub use metrics::{LifecycleMetrics, MetricsSummary};
pub use provider::{
    CloudProvider, ProviderError, Region, ResourceTag, ResourceType, Snapshot, SnapshotStatus,
    Volume,
};
pub use reaper::{PurgeFailure, ReapOutcome, SnapshotReaper};
pub use retention::{DurationSpec, RetentionWindow};
pub use runner::{LifecycleRunner, RunPhase, RunReport, RunSettings, VolumeReport};
pub use throttle::{RateLimiter, Throttled};
