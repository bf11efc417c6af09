//! Frozen retention cutoffs.

use super::duration::DurationSpec;
use chrono::{DateTime, Utc};

/// Values that can be read as epoch seconds.
///
/// Snapshot timestamps live in tags, so both integers and numeric strings
/// are accepted. Anything that does not parse has no timestamp.
pub trait EpochSeconds {
    fn epoch_seconds(&self) -> Option<i64>;
}

impl EpochSeconds for i64 {
    fn epoch_seconds(&self) -> Option<i64> {
        Some(*self)
    }
}

impl EpochSeconds for str {
    fn epoch_seconds(&self) -> Option<i64> {
        self.trim().parse().ok()
    }
}

impl EpochSeconds for String {
    fn epoch_seconds(&self) -> Option<i64> {
        self.as_str().epoch_seconds()
    }
}

impl<T: EpochSeconds + ?Sized> EpochSeconds for Option<&T> {
    fn epoch_seconds(&self) -> Option<i64> {
        (*self).and_then(|t| t.epoch_seconds())
    }
}

/// A retention period resolved against the instant it was built.
///
/// The cutoff is computed once (`now - period`) and never re-evaluated, so
/// every decision made with one window is consistent for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    spec: DurationSpec,
    cutoff: i64,
}

impl RetentionWindow {
    /// Builds a window for `spec` ending now.
    pub fn new(spec: &str) -> Self {
        Self::at(spec, Utc::now().timestamp())
    }

    /// Builds a window for `spec` ending at `now` (epoch seconds).
    pub fn at(spec: &str, now: i64) -> Self {
        Self::from_spec(DurationSpec::parse(spec), now)
    }

    pub fn from_spec(spec: DurationSpec, now: i64) -> Self {
        Self {
            spec,
            cutoff: now - spec.seconds(),
        }
    }

    /// Seconds of retention `spec` resolves to.
    pub fn seconds_for(spec: &str) -> i64 {
        DurationSpec::parse(spec).seconds()
    }

    /// Epoch seconds before which snapshots are expired.
    pub fn cutoff(&self) -> i64 {
        self.cutoff
    }

    pub fn cutoff_time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.cutoff, 0)
    }

    pub fn spec(&self) -> DurationSpec {
        self.spec
    }

    pub fn period_secs(&self) -> i64 {
        self.spec.seconds()
    }

    /// True iff `timestamp` is positive and strictly older than the cutoff.
    ///
    /// Missing, unparseable and non-positive timestamps are never purged.
    pub fn should_purge<T: EpochSeconds + ?Sized>(&self, timestamp: &T) -> bool {
        match timestamp.epoch_seconds() {
            Some(ts) => ts > 0 && ts < self.cutoff,
            None => false,
        }
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self::from_spec(DurationSpec::Default, Utc::now().timestamp())
    }
}
