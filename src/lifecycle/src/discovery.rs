//! Discovery of volumes marked for snapshot management.

use crate::provider::{CloudProvider, ProviderError, Region, ResourceType};
use crate::retention::RetentionWindow;
use crate::throttle::RateLimiter;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

/// A volume selected for this run, with its resolved retention window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedVolume {
    pub region: Region,
    pub volume_id: String,
    pub retention: RetentionWindow,
}

/// Scans regions for volumes carrying the management tag.
pub struct ResourceDiscovery {
    provider: Arc<dyn CloudProvider>,
    limiter: RateLimiter,
}

impl ResourceDiscovery {
    pub fn new(provider: Arc<dyn CloudProvider>, limiter: RateLimiter) -> Self {
        Self { provider, limiter }
    }

    /// Lists volumes tagged `tag_name` in every region, in provider order.
    ///
    /// A non-blank tag value overrides `default_retention` for that volume.
    /// Every matching tag yields one entry; duplicates are not collapsed.
    pub async fn discover(
        &self,
        regions: &[Region],
        tag_name: &str,
        default_retention: &str,
    ) -> Result<Vec<TrackedVolume>, ProviderError> {
        let mut volumes = Vec::new();

        for region in regions {
            let tags = self
                .provider
                .list_tags(region, ResourceType::Volume, tag_name)
                .await?;

            debug!(region = %region, tags = tags.len(), "Listed volume tags");

            let mut tags = self.limiter.throttle_iter(tags);
            while let Some(tag) = tags.next().await {
                let retention = match tag.value.as_deref().map(str::trim) {
                    Some(value) if !value.is_empty() => value,
                    _ => default_retention,
                };

                let window = RetentionWindow::new(retention);
                debug!(
                    region = %region,
                    volume_id = %tag.resource_id,
                    retention = %window.spec(),
                    cutoff = window.cutoff(),
                    "Tracking volume"
                );

                volumes.push(TrackedVolume {
                    region: region.clone(),
                    volume_id: tag.resource_id,
                    retention: window,
                });
            }
        }

        info!(
            regions = regions.len(),
            volumes = volumes.len(),
            "Volume discovery completed"
        );

        Ok(volumes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockCloudProvider, ResourceTag};
    use crate::retention::DEFAULT_RETENTION_SECS;
    use chrono::Utc;
    use std::time::Duration;

    fn volume_tag(volume_id: &str, value: Option<&str>) -> ResourceTag {
        ResourceTag {
            resource_id: volume_id.to_string(),
            resource_type: ResourceType::Volume,
            key: "Snapper".to_string(),
            value: value.map(str::to_string),
        }
    }

    fn assert_cutoff_near(volume: &TrackedVolume, retention_secs: i64) {
        let expected = Utc::now().timestamp() - retention_secs;
        assert!(volume.retention.cutoff() > expected - 10);
        assert!(volume.retention.cutoff() <= expected);
    }

    #[tokio::test]
    async fn test_blank_tag_uses_default_retention() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_list_tags()
            .withf(|region, resource_type, key| {
                region.name() == "us-east-1"
                    && *resource_type == ResourceType::Volume
                    && key == "Snapper"
            })
            .times(1)
            .returning(|_, _, _| Ok(vec![volume_tag("vol-1", Some("   "))]));

        let discovery = ResourceDiscovery::new(Arc::new(provider), RateLimiter::disabled());
        let volumes = discovery
            .discover(&[Region::new("us-east-1")], "Snapper", "")
            .await
            .unwrap();

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].region, Region::new("us-east-1"));
        assert_eq!(volumes[0].volume_id, "vol-1");
        assert_cutoff_near(&volumes[0], DEFAULT_RETENTION_SECS);
    }

    #[tokio::test]
    async fn test_tag_value_overrides_default() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_list_tags()
            .returning(|_, _, _| Ok(vec![volume_tag("vol-1", Some("2.days"))]));

        let discovery = ResourceDiscovery::new(Arc::new(provider), RateLimiter::disabled());
        let volumes = discovery
            .discover(&[Region::new("us-east-1")], "Snapper", "5.days")
            .await
            .unwrap();

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].retention.period_secs(), 2 * 86_400 + 3_600);
        assert_cutoff_near(&volumes[0], 2 * 86_400 + 3_600);
    }

    #[tokio::test]
    async fn test_missing_tag_value_uses_configured_default() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_list_tags()
            .returning(|_, _, _| Ok(vec![volume_tag("vol-1", None)]));

        let discovery = ResourceDiscovery::new(Arc::new(provider), RateLimiter::disabled());
        let volumes = discovery
            .discover(&[Region::new("us-east-1")], "Snapper", "6.hours")
            .await
            .unwrap();

        assert_eq!(volumes[0].retention.period_secs(), 6 * 3_600);
    }

    #[tokio::test]
    async fn test_regions_in_order_without_deduplication() {
        let mut provider = MockCloudProvider::new();
        provider.expect_list_tags().returning(|region, _, _| {
            Ok(match region.name() {
                "us-east-1" => vec![volume_tag("vol-a", None), volume_tag("vol-a", Some("1.day"))],
                _ => vec![volume_tag("vol-b", None)],
            })
        });

        let discovery = ResourceDiscovery::new(Arc::new(provider), RateLimiter::disabled());
        let volumes = discovery
            .discover(
                &[Region::new("us-east-1"), Region::new("eu-west-1")],
                "Snapper",
                "10.days",
            )
            .await
            .unwrap();

        let ids: Vec<_> = volumes
            .iter()
            .map(|v| (v.region.name(), v.volume_id.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("us-east-1", "vol-a"),
                ("us-east-1", "vol-a"),
                ("eu-west-1", "vol-b")
            ]
        );
    }

    #[tokio::test]
    async fn test_listing_error_propagates() {
        let mut provider = MockCloudProvider::new();
        provider.expect_list_tags().returning(|region, _, _| {
            Err(ProviderError::request("DescribeTags", region, "throttled"))
        });

        let discovery = ResourceDiscovery::new(Arc::new(provider), RateLimiter::disabled());
        let result = discovery
            .discover(&[Region::new("us-east-1")], "Snapper", "")
            .await;

        assert!(matches!(result, Err(ProviderError::Request { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_once_per_region_listing() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_list_tags()
            .times(2)
            .returning(|_, _, _| Ok(vec![volume_tag("vol-1", None), volume_tag("vol-2", None)]));

        let discovery = ResourceDiscovery::new(
            Arc::new(provider),
            RateLimiter::new(Duration::from_secs(3)),
        );
        let start = tokio::time::Instant::now();
        let volumes = discovery
            .discover(
                &[Region::new("us-east-1"), Region::new("us-west-2")],
                "Snapper",
                "",
            )
            .await
            .unwrap();

        assert_eq!(volumes.len(), 4);
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(start.elapsed() < Duration::from_secs(9));
    }
}
