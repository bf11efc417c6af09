use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};

/// Configuration file read by [`Configuration::load`].
pub const DEFAULT_CONFIG_FILE: &str = "snapper.toml";

/// Prefix of environment overrides, e.g. `SNAPPER__SNAPPER__DRY_RUN=true`.
pub const ENV_PREFIX: &str = "SNAPPER__";

/// Snapshot lifecycle settings.
///
/// Keys of older YAML configurations map as follows: `aws.volume_tag` is
/// `snapper.tag_name`, `aws.retain` is `snapper.retain`, and top-level
/// `log_to`/`verbose` live under `logging`. Unknown keys are rejected so a
/// stale file fails to load instead of silently running with defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapperConfig {
    /// Tag marking managed volumes; also stamps the snapshots taken of them.
    ///
    /// Env: SNAPPER__SNAPPER__TAG_NAME
    pub tag_name: String,

    /// Retention for volumes whose tag carries no value (e.g. "10.days", "36.hours").
    ///
    /// Env: SNAPPER__SNAPPER__RETAIN
    pub retain: String,

    /// Pause after each tag or snapshot listing, to stay under API rate limits.
    /// Zero disables the pause.
    ///
    /// Env: SNAPPER__SNAPPER__PAUSE
    #[serde(with = "humantime_serde")]
    pub pause: Duration,

    /// Dry-run mode: evaluate everything, create and delete nothing.
    ///
    /// Env: SNAPPER__SNAPPER__DRY_RUN
    pub dry_run: bool,
}

impl Default for SnapperConfig {
    fn default() -> Self {
        Self {
            tag_name: "Snapper".to_string(),
            retain: "10.days".to_string(),
            pause: Duration::ZERO,
            dry_run: false,
        }
    }
}

/// AWS credentials and client behaviour.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// Static access key. Both keys unset means the default credential chain.
    pub access_key_id: Option<String>,

    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,

    /// Region used to enumerate the account's regions.
    pub region: String,

    /// Retries per request after the first attempt. Zero disables retries.
    pub max_retries: u32,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            max_retries: 3,
        }
    }
}

impl AwsConfig {
    /// Total attempts per request: the first one plus `max_retries`.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Static credentials, if both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log at debug level.
    pub verbose: bool,
    /// Append logs to this file instead of stdout.
    pub log_to: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    pub snapper: SnapperConfig,
    pub aws: AwsConfig,
    pub logging: LoggingConfig,
}

/// Errors found while validating a loaded configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("snapper.tag_name cannot be empty")]
    EmptyTagName,

    #[error("aws.region cannot be empty")]
    EmptyRegion,

    #[error("aws.access_key_id and aws.secret_access_key must be set together")]
    IncompleteCredentials,
}

impl Configuration {
    /// Figment layering defaults, the given file and `SNAPPER__` environment variables.
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML, anything else as TOML.
    pub fn figment(path: &Path) -> Figment {
        let figment = Figment::from(Serialized::defaults(Configuration::default()));

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let figment = if is_yaml {
            figment.merge(Yaml::file(path))
        } else {
            figment.merge(Toml::file(path))
        };

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment(path).extract().map_err(Box::new)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapper.tag_name.trim().is_empty() {
            return Err(ConfigError::EmptyTagName);
        }

        if self.aws.region.trim().is_empty() {
            return Err(ConfigError::EmptyRegion);
        }

        if self.aws.access_key_id.is_some() != self.aws.secret_access_key.is_some() {
            return Err(ConfigError::IncompleteCredentials);
        }

        Ok(())
    }
}
