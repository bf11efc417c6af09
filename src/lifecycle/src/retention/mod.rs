//! Retention windows for managed snapshots.
//!
//! A retention window is derived from a human-entered [`DurationSpec`]
//! (`"3.days"`, `"12.hours"`) and frozen into an absolute cutoff when it is
//! built. Every snapshot evaluated against the same window is compared with
//! the same cutoff, no matter how long the run takes.
//!
//! ## Usage
//!
//! ```
//! use lifecycle::retention::RetentionWindow;
//!
//! let window = RetentionWindow::new("1.day");
//! let now = chrono::Utc::now().timestamp();
//!
//! assert!(window.should_purge(&(now - 3 * 86_400)));
//! assert!(!window.should_purge("0"));
//! ```

pub mod duration;
pub mod window;

pub use duration::{
    BACKUP_SLACK_SECS, DEFAULT_RETENTION_SECS, DurationSpec, DurationSpecError, SECS_PER_DAY,
    SECS_PER_HOUR,
};
pub use window::{EpochSeconds, RetentionWindow};
