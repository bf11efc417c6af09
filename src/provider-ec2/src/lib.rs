//! EC2 implementation of the snapshot lifecycle [`CloudProvider`].
//!
//! One SDK client is built per region from a shared base configuration.
//! Listings follow `next_token` until the provider reports no further page.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{self as ec2, Filter, SnapshotState, Tag};
use common::config::AwsConfig;
use lifecycle::provider::{
    CloudProvider, ProviderError, Region, ResourceTag, ResourceType, Snapshot, SnapshotStatus,
    Volume,
};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Provider name attached to credentials taken from the configuration file.
const CONFIG_CREDENTIALS_SOURCE: &str = "snapper-config";

pub struct Ec2Provider {
    sdk_config: SdkConfig,
    home_region: Region,
    clients: Mutex<HashMap<Region, Client>>,
}

impl Ec2Provider {
    /// Builds the shared SDK configuration.
    ///
    /// Static keys from `config` are used when both are set; otherwise the
    /// default credential chain applies. Every request is attempted once plus
    /// up to `max_retries` retries.
    pub async fn connect(config: &AwsConfig) -> Self {
        let home_region = Region::new(config.region.clone());

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                CONFIG_CREDENTIALS_SOURCE,
            ));
        }

        Self::from_sdk_config(loader.load().await, home_region)
    }

    pub fn from_sdk_config(sdk_config: SdkConfig, home_region: Region) -> Self {
        Self {
            sdk_config,
            home_region,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self, region: &Region) -> Client {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients
            .entry(region.clone())
            .or_insert_with(|| {
                let conf = aws_sdk_ec2::config::Builder::from(&self.sdk_config)
                    .region(aws_config::Region::new(region.name().to_string()))
                    .build();
                Client::from_conf(conf)
            })
            .clone()
    }
}

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

fn request_error<E: std::error::Error>(
    operation: &'static str,
    region: &Region,
    err: E,
) -> ProviderError {
    ProviderError::request(operation, region, DisplayErrorContext(err).to_string())
}

fn snapshot_status(state: Option<&SnapshotState>) -> SnapshotStatus {
    match state {
        Some(SnapshotState::Pending) => SnapshotStatus::Pending,
        Some(SnapshotState::Completed) => SnapshotStatus::Completed,
        Some(SnapshotState::Error) => SnapshotStatus::Error,
        _ => SnapshotStatus::Other,
    }
}

fn resource_tag(description: &ec2::TagDescription) -> Option<ResourceTag> {
    let resource_type = match description.resource_type()? {
        ec2::ResourceType::Volume => ResourceType::Volume,
        ec2::ResourceType::Snapshot => ResourceType::Snapshot,
        _ => return None,
    };

    Some(ResourceTag {
        resource_id: description.resource_id()?.to_string(),
        resource_type,
        key: description.key()?.to_string(),
        value: description.value().map(str::to_string),
    })
}

fn snapshot(snapshot: &ec2::Snapshot) -> Option<Snapshot> {
    let tags = snapshot
        .tags()
        .iter()
        .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
        .collect();

    Some(Snapshot {
        id: snapshot.snapshot_id()?.to_string(),
        volume_id: snapshot.volume_id().unwrap_or_default().to_string(),
        status: snapshot_status(snapshot.state()),
        tags,
    })
}

fn volume(volume: &ec2::Volume) -> Option<Volume> {
    Some(Volume {
        id: volume.volume_id()?.to_string(),
        size_gib: volume.size(),
        availability_zone: volume.availability_zone().map(str::to_string),
    })
}

#[async_trait]
impl CloudProvider for Ec2Provider {
    async fn list_regions(&self) -> Result<Vec<Region>, ProviderError> {
        let output = self
            .client(&self.home_region)
            .describe_regions()
            .send()
            .await
            .map_err(|e| request_error("DescribeRegions", &self.home_region, e))?;

        Ok(output
            .regions()
            .iter()
            .filter_map(|r| r.region_name())
            .map(Region::new)
            .collect())
    }

    async fn list_tags(
        &self,
        region: &Region,
        resource_type: ResourceType,
        key: &str,
    ) -> Result<Vec<ResourceTag>, ProviderError> {
        let client = self.client(region);
        let mut tags = Vec::new();
        let mut next_token = None;

        loop {
            let output = client
                .describe_tags()
                .filters(filter("resource-type", resource_type.as_filter_value()))
                .filters(filter("key", key))
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| request_error("DescribeTags", region, e))?;

            tags.extend(output.tags().iter().filter_map(resource_tag));

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(region = %region, key, count = tags.len(), "Listed tags");
        Ok(tags)
    }

    async fn list_snapshots(
        &self,
        region: &Region,
        volume_id: &str,
        tag_key: &str,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        let client = self.client(region);
        let mut snapshots = Vec::new();
        let mut next_token = None;

        loop {
            let output = client
                .describe_snapshots()
                .owner_ids("self")
                .filters(filter("volume-id", volume_id))
                .filters(filter("tag-key", tag_key))
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| request_error("DescribeSnapshots", region, e))?;

            snapshots.extend(output.snapshots().iter().filter_map(snapshot));

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(
            region = %region,
            volume_id,
            count = snapshots.len(),
            "Listed snapshots"
        );
        Ok(snapshots)
    }

    async fn get_volume(
        &self,
        region: &Region,
        volume_id: &str,
    ) -> Result<Option<Volume>, ProviderError> {
        // Filtering by id instead of passing volume_ids turns an unknown id
        // into an empty result rather than an InvalidVolume.NotFound error.
        let output = self
            .client(region)
            .describe_volumes()
            .filters(filter("volume-id", volume_id))
            .send()
            .await
            .map_err(|e| request_error("DescribeVolumes", region, e))?;

        Ok(output.volumes().iter().find_map(volume))
    }

    async fn create_snapshot(
        &self,
        region: &Region,
        volume_id: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        let output = self
            .client(region)
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .map_err(|e| request_error("CreateSnapshot", region, e))?;

        output
            .snapshot_id()
            .map(str::to_string)
            .ok_or(ProviderError::MissingField {
                operation: "CreateSnapshot",
                field: "SnapshotId",
            })
    }

    async fn add_tag(
        &self,
        region: &Region,
        resource_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        self.client(region)
            .create_tags()
            .resources(resource_id)
            .tags(Tag::builder().key(key).value(value).build())
            .send()
            .await
            .map_err(|e| request_error("CreateTags", region, e))?;

        Ok(())
    }

    async fn delete_snapshot(
        &self,
        region: &Region,
        snapshot_id: &str,
    ) -> Result<(), ProviderError> {
        self.client(region)
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| request_error("DeleteSnapshot", region, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_state_mapping() {
        assert_eq!(
            snapshot_status(Some(&SnapshotState::Pending)),
            SnapshotStatus::Pending
        );
        assert_eq!(
            snapshot_status(Some(&SnapshotState::Completed)),
            SnapshotStatus::Completed
        );
        assert_eq!(
            snapshot_status(Some(&SnapshotState::Error)),
            SnapshotStatus::Error
        );
        assert_eq!(
            snapshot_status(Some(&SnapshotState::Recoverable)),
            SnapshotStatus::Other
        );
        assert_eq!(snapshot_status(None), SnapshotStatus::Other);
    }

    #[test]
    fn test_snapshot_conversion_keeps_tags() {
        let sdk_snapshot = ec2::Snapshot::builder()
            .snapshot_id("snap-1")
            .volume_id("vol-1")
            .state(SnapshotState::Completed)
            .tags(Tag::builder().key("Snapper").value("1700000000").build())
            .tags(Tag::builder().key("Name").build())
            .build();

        let converted = snapshot(&sdk_snapshot).unwrap();

        assert_eq!(converted.id, "snap-1");
        assert_eq!(converted.volume_id, "vol-1");
        assert_eq!(converted.status, SnapshotStatus::Completed);
        assert_eq!(converted.tag("Snapper"), Some("1700000000"));
        assert_eq!(converted.tag("Name"), None);
    }

    #[test]
    fn test_snapshot_without_id_is_skipped() {
        let sdk_snapshot = ec2::Snapshot::builder().volume_id("vol-1").build();
        assert!(snapshot(&sdk_snapshot).is_none());
    }

    #[test]
    fn test_tag_description_conversion() {
        let valued = ec2::TagDescription::builder()
            .resource_id("vol-1")
            .resource_type(ec2::ResourceType::Volume)
            .key("Snapper")
            .value("3.days")
            .build();
        let tag = resource_tag(&valued).unwrap();
        assert_eq!(tag.resource_id, "vol-1");
        assert_eq!(tag.resource_type, ResourceType::Volume);
        assert_eq!(tag.value.as_deref(), Some("3.days"));

        let instance = ec2::TagDescription::builder()
            .resource_id("i-1")
            .resource_type(ec2::ResourceType::Instance)
            .key("Snapper")
            .build();
        assert!(resource_tag(&instance).is_none());
    }

    #[test]
    fn test_volume_conversion() {
        let sdk_volume = ec2::Volume::builder()
            .volume_id("vol-1")
            .size(100)
            .availability_zone("us-east-1a")
            .build();

        assert_eq!(
            volume(&sdk_volume),
            Some(Volume {
                id: "vol-1".to_string(),
                size_gib: Some(100),
                availability_zone: Some("us-east-1a".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let config = AwsConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI".to_string()),
            max_retries: 0,
            ..AwsConfig::default()
        };
        let provider = Ec2Provider::connect(&config).await;

        let retry = provider.sdk_config.retry_config().unwrap();
        assert_eq!(retry.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_clients_are_built_per_region() {
        let config = AwsConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI".to_string()),
            region: "us-east-1".to_string(),
            max_retries: 2,
        };
        let provider = Ec2Provider::connect(&config).await;

        let retry = provider.sdk_config.retry_config().unwrap();
        assert_eq!(retry.max_attempts(), 3);

        let eu = provider.client(&Region::new("eu-west-1"));
        assert_eq!(
            eu.config().region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
        provider.client(&Region::new("eu-west-1"));
        provider.client(&Region::new("us-east-1"));

        let clients = provider.clients.lock().unwrap();
        assert_eq!(clients.len(), 2);
    }
}
