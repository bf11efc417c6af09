//! Parsing of retention duration expressions.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SECS_PER_HOUR: i64 = 3_600;
pub const SECS_PER_DAY: i64 = 86_400;

/// Slack added to day-based retention so a snapshot taken slightly late in
/// its backup window is not purged one run early.
pub const BACKUP_SLACK_SECS: i64 = 3_600;

/// Retention applied when no usable expression is given: 10 days plus slack.
pub const DEFAULT_RETENTION_SECS: i64 = 10 * SECS_PER_DAY + BACKUP_SLACK_SECS;

/// A retention expression.
///
/// Accepted forms are `<n>.day`/`<n>.days`, `<n>.hour`/`<n>.hours` and a bare
/// `<n>` meaning seconds. Counts must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DurationSpec {
    Days(u32),
    Hours(u32),
    Seconds(u32),
    /// Unset or unusable input.
    #[default]
    Default,
}

impl DurationSpec {
    /// Parses `input`, degrading to [`DurationSpec::Default`] on any problem.
    pub fn parse(input: &str) -> Self {
        match input.parse() {
            Ok(spec) => spec,
            Err(e) => {
                tracing::debug!(
                    input = %input,
                    reason = %e,
                    default_secs = DEFAULT_RETENTION_SECS,
                    "Retention expression not usable, using default retention"
                );
                DurationSpec::Default
            }
        }
    }

    /// Length of the retention period in seconds.
    pub fn seconds(&self) -> i64 {
        match *self {
            DurationSpec::Days(n) => i64::from(n) * SECS_PER_DAY + BACKUP_SLACK_SECS,
            DurationSpec::Hours(n) => i64::from(n) * SECS_PER_HOUR,
            DurationSpec::Seconds(n) => i64::from(n),
            DurationSpec::Default => DEFAULT_RETENTION_SECS,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, DurationSpec::Default)
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationSpec::Days(n) => write!(f, "{n}.days"),
            DurationSpec::Hours(n) => write!(f, "{n}.hours"),
            DurationSpec::Seconds(n) => write!(f, "{n}"),
            DurationSpec::Default => f.write_str("default"),
        }
    }
}

/// Why a retention expression was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationSpecError {
    #[error("retention expression is empty")]
    Empty,

    #[error("invalid count '{0}'")]
    InvalidCount(String),

    #[error("count must be positive")]
    NonPositive,

    #[error("unknown unit '{0}', expected days or hours")]
    UnknownUnit(String),
}

impl FromStr for DurationSpec {
    type Err = DurationSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DurationSpecError::Empty);
        }

        let (count, unit) = match s.split_once('.') {
            Some((count, unit)) => (count.trim(), Some(unit.trim())),
            None => (s, None),
        };

        let count: i64 = count
            .parse()
            .map_err(|_| DurationSpecError::InvalidCount(count.to_string()))?;
        if count <= 0 {
            return Err(DurationSpecError::NonPositive);
        }
        let count =
            u32::try_from(count).map_err(|_| DurationSpecError::InvalidCount(count.to_string()))?;

        match unit.map(str::to_ascii_lowercase).as_deref() {
            None => Ok(DurationSpec::Seconds(count)),
            Some("day") | Some("days") => Ok(DurationSpec::Days(count)),
            Some("hour") | Some("hours") => Ok(DurationSpec::Hours(count)),
            Some(other) => Err(DurationSpecError::UnknownUnit(other.to_string())),
        }
    }
}
