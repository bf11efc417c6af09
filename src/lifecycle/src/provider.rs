//! Cloud provider boundary.
//!
//! The lifecycle core only needs a handful of filterable listings and three
//! mutating calls. `CloudProvider` is that capability set; the EC2 client in
//! `provider-ec2` and the in-memory provider in [`crate::testing`] implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A provider region, e.g. `us-east-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource types that can carry tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Volume,
    Snapshot,
}

impl ResourceType {
    /// Value used by provider-side `resource-type` filters.
    pub fn as_filter_value(&self) -> &'static str {
        match self {
            ResourceType::Volume => "volume",
            ResourceType::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_value())
    }
}

/// A key/value label attached to a resource, as returned by a tag listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTag {
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub key: String,
    pub value: Option<String>,
}

/// A block-storage volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub size_gib: Option<i32>,
    pub availability_zone: Option<String>,
}

/// Provider-reported snapshot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Pending,
    Completed,
    Error,
    Other,
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotStatus::Pending => "pending",
            SnapshotStatus::Completed => "completed",
            SnapshotStatus::Error => "error",
            SnapshotStatus::Other => "other",
        };
        f.write_str(s)
    }
}

/// A point-in-time copy of a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: String,
    pub status: SnapshotStatus,
    pub tags: HashMap<String, String>,
}

impl Snapshot {
    /// Value of the tag `key`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Errors raised by a [`CloudProvider`].
#[derive(Error, Debug)]
pub enum ProviderError {
    /// A provider call failed.
    #[error("{operation} failed in region {region}: {message}")]
    Request {
        operation: &'static str,
        region: String,
        message: String,
    },

    /// The provider answered without a field the call depends on.
    #[error("{operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl ProviderError {
    pub fn request(
        operation: &'static str,
        region: &Region,
        message: impl Into<String>,
    ) -> Self {
        ProviderError::Request {
            operation,
            region: region.to_string(),
            message: message.into(),
        }
    }
}

/// The operations the snapshot lifecycle needs from a cloud provider.
///
/// Listings return everything that matches; callers decide how to pace
/// their traversal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Regions visible to the configured account, in provider order.
    async fn list_regions(&self) -> Result<Vec<Region>, ProviderError>;

    /// Tags in `region` on resources of `resource_type` whose key is `key`.
    async fn list_tags(
        &self,
        region: &Region,
        resource_type: ResourceType,
        key: &str,
    ) -> Result<Vec<ResourceTag>, ProviderError>;

    /// Snapshots of `volume_id` in `region` that carry a tag named `tag_key`.
    async fn list_snapshots(
        &self,
        region: &Region,
        volume_id: &str,
        tag_key: &str,
    ) -> Result<Vec<Snapshot>, ProviderError>;

    /// Looks a volume up by id. An unknown id is `Ok(None)`.
    async fn get_volume(
        &self,
        region: &Region,
        volume_id: &str,
    ) -> Result<Option<Volume>, ProviderError>;

    /// Requests a snapshot and returns its id. The snapshot may still be pending.
    async fn create_snapshot(
        &self,
        region: &Region,
        volume_id: &str,
        description: &str,
    ) -> Result<String, ProviderError>;

    /// Adds (or overwrites) a tag on a resource.
    async fn add_tag(
        &self,
        region: &Region,
        resource_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProviderError>;

    async fn delete_snapshot(&self, region: &Region, snapshot_id: &str)
    -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tag_lookup() {
        let snapshot = Snapshot {
            id: "snap-1".to_string(),
            volume_id: "vol-1".to_string(),
            status: SnapshotStatus::Completed,
            tags: HashMap::from([("Snapper".to_string(), "1700000000".to_string())]),
        };

        assert_eq!(snapshot.tag("Snapper"), Some("1700000000"));
        assert_eq!(snapshot.tag("Name"), None);
    }

    #[test]
    fn test_request_error_message() {
        let err = ProviderError::request("DeleteSnapshot", &Region::new("eu-west-1"), "denied");
        assert_eq!(
            err.to_string(),
            "DeleteSnapshot failed in region eu-west-1: denied"
        );
    }

    #[test]
    fn test_resource_type_filter_value() {
        assert_eq!(ResourceType::Volume.as_filter_value(), "volume");
        assert_eq!(ResourceType::Snapshot.to_string(), "snapshot");
    }
}
