use crate::provider::{
    CloudProvider, ProviderError, Region, ResourceTag, ResourceType, Snapshot, SnapshotStatus,
    Volume,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A mutating call received by [`InMemoryProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    CreateSnapshot {
        region: Region,
        volume_id: String,
        description: String,
    },
    AddTag {
        region: Region,
        resource_id: String,
        key: String,
        value: String,
    },
    DeleteSnapshot {
        region: Region,
        snapshot_id: String,
    },
}

#[derive(Debug, Default)]
struct State {
    regions: Vec<Region>,
    volumes: Vec<(Region, Volume)>,
    tags: Vec<(Region, ResourceTag)>,
    snapshots: Vec<(Region, Snapshot)>,
    failing_deletes: HashSet<String>,
    calls: Vec<ProviderCall>,
    next_snapshot: u64,
}

/// A [`CloudProvider`] backed by in-memory state.
///
/// Listings follow insertion order. Every mutating call is recorded so tests
/// can assert on exactly what a run would have sent to the provider.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    state: Mutex<State>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_region(self, region: &str) -> Self {
        self.state().regions.push(Region::new(region));
        self
    }

    /// Adds a volume without any tag.
    pub fn with_volume(self, region: &str, volume_id: &str) -> Self {
        self.state().volumes.push((
            Region::new(region),
            Volume {
                id: volume_id.to_string(),
                size_gib: Some(8),
                availability_zone: None,
            },
        ));
        self
    }

    /// Tags a volume id without creating the volume itself.
    pub fn with_volume_tag(
        self,
        region: &str,
        volume_id: &str,
        key: &str,
        value: Option<&str>,
    ) -> Self {
        self.state().tags.push((
            Region::new(region),
            ResourceTag {
                resource_id: volume_id.to_string(),
                resource_type: ResourceType::Volume,
                key: key.to_string(),
                value: value.map(str::to_string),
            },
        ));
        self
    }

    /// Adds a volume and marks it with `key`.
    pub fn with_tagged_volume(
        self,
        region: &str,
        volume_id: &str,
        key: &str,
        value: Option<&str>,
    ) -> Self {
        self.with_volume(region, volume_id)
            .with_volume_tag(region, volume_id, key, value)
    }

    pub fn with_snapshot(self, region: &str, snapshot: Snapshot) -> Self {
        self.state().snapshots.push((Region::new(region), snapshot));
        self
    }

    /// Adds a snapshot of `volume_id` stamped `key = created_at`.
    pub fn with_stamped_snapshot(
        self,
        region: &str,
        snapshot_id: &str,
        volume_id: &str,
        status: SnapshotStatus,
        key: &str,
        created_at: i64,
    ) -> Self {
        self.with_snapshot(
            region,
            Snapshot {
                id: snapshot_id.to_string(),
                volume_id: volume_id.to_string(),
                status,
                tags: HashMap::from([(key.to_string(), created_at.to_string())]),
            },
        )
    }

    /// Makes every deletion of `snapshot_id` fail.
    pub fn fail_delete(self, snapshot_id: &str) -> Self {
        self.state().failing_deletes.insert(snapshot_id.to_string());
        self
    }

    /// Mutating calls received so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    /// Ids of the snapshots currently held for `region`.
    pub fn snapshot_ids(&self, region: &str) -> Vec<String> {
        self.state()
            .snapshots
            .iter()
            .filter(|(r, _)| r.name() == region)
            .map(|(_, s)| s.id.clone())
            .collect()
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<Snapshot> {
        self.state()
            .snapshots
            .iter()
            .find(|(_, s)| s.id == snapshot_id)
            .map(|(_, s)| s.clone())
    }
}

#[async_trait]
impl CloudProvider for InMemoryProvider {
    async fn list_regions(&self) -> Result<Vec<Region>, ProviderError> {
        Ok(self.state().regions.clone())
    }

    async fn list_tags(
        &self,
        region: &Region,
        resource_type: ResourceType,
        key: &str,
    ) -> Result<Vec<ResourceTag>, ProviderError> {
        Ok(self
            .state()
            .tags
            .iter()
            .filter(|(r, t)| r == region && t.resource_type == resource_type && t.key == key)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn list_snapshots(
        &self,
        region: &Region,
        volume_id: &str,
        tag_key: &str,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        Ok(self
            .state()
            .snapshots
            .iter()
            .filter(|(r, s)| {
                r == region && s.volume_id == volume_id && s.tags.contains_key(tag_key)
            })
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn get_volume(
        &self,
        region: &Region,
        volume_id: &str,
    ) -> Result<Option<Volume>, ProviderError> {
        Ok(self
            .state()
            .volumes
            .iter()
            .find(|(r, v)| r == region && v.id == volume_id)
            .map(|(_, v)| v.clone()))
    }

    async fn create_snapshot(
        &self,
        region: &Region,
        volume_id: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::CreateSnapshot {
            region: region.clone(),
            volume_id: volume_id.to_string(),
            description: description.to_string(),
        });

        state.next_snapshot += 1;
        let snapshot_id = format!("snap-{:08x}", state.next_snapshot);
        state.snapshots.push((
            region.clone(),
            Snapshot {
                id: snapshot_id.clone(),
                volume_id: volume_id.to_string(),
                status: SnapshotStatus::Pending,
                tags: HashMap::new(),
            },
        ));

        Ok(snapshot_id)
    }

    async fn add_tag(
        &self,
        region: &Region,
        resource_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.calls.push(ProviderCall::AddTag {
            region: region.clone(),
            resource_id: resource_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });

        match state
            .snapshots
            .iter_mut()
            .find(|(r, s)| r == region && s.id == resource_id)
        {
            Some((_, snapshot)) => {
                snapshot.tags.insert(key.to_string(), value.to_string());
            }
            None => state.tags.push((
                region.clone(),
                ResourceTag {
                    resource_id: resource_id.to_string(),
                    resource_type: ResourceType::Volume,
                    key: key.to_string(),
                    value: Some(value.to_string()),
                },
            )),
        }

        Ok(())
    }

    async fn delete_snapshot(
        &self,
        region: &Region,
        snapshot_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::DeleteSnapshot {
            region: region.clone(),
            snapshot_id: snapshot_id.to_string(),
        });

        if state.failing_deletes.contains(snapshot_id) {
            return Err(ProviderError::request(
                "DeleteSnapshot",
                region,
                format!("snapshot {snapshot_id} is in use"),
            ));
        }

        state
            .snapshots
            .retain(|(r, s)| !(r == region && s.id == snapshot_id));
        Ok(())
    }
}
