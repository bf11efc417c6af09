use chrono::Utc;
use lifecycle::testing::{InMemoryProvider, ProviderCall};
use lifecycle::{LifecycleRunner, RunSettings, SnapshotOutcome, SnapshotStatus};
use std::sync::Arc;

const DAY: i64 = 86_400;

fn days_ago(days: i64) -> i64 {
    Utc::now().timestamp() - days * DAY
}

/// Two regions, one volume each, plus an untagged volume that must be ignored.
fn two_region_fleet() -> InMemoryProvider {
    InMemoryProvider::new()
        .with_region("us-east-1")
        .with_region("eu-west-1")
        .with_tagged_volume("us-east-1", "vol-a", "Snapper", Some("1.day"))
        .with_tagged_volume("eu-west-1", "vol-b", "Snapper", None)
        .with_volume("us-east-1", "vol-untagged")
        .with_stamped_snapshot(
            "us-east-1",
            "snap-a-old",
            "vol-a",
            SnapshotStatus::Completed,
            "Snapper",
            days_ago(3),
        )
        .with_stamped_snapshot(
            "us-east-1",
            "snap-a-recent",
            "vol-a",
            SnapshotStatus::Completed,
            "Snapper",
            Utc::now().timestamp() - 3_600,
        )
        .with_stamped_snapshot(
            "us-east-1",
            "snap-a-pending",
            "vol-a",
            SnapshotStatus::Pending,
            "Snapper",
            days_ago(5),
        )
        .with_stamped_snapshot(
            "eu-west-1",
            "snap-b-kept",
            "vol-b",
            SnapshotStatus::Completed,
            "Snapper",
            days_ago(5),
        )
        .with_stamped_snapshot(
            "eu-west-1",
            "snap-b-ancient",
            "vol-b",
            SnapshotStatus::Completed,
            "Snapper",
            days_ago(20),
        )
}

#[tokio::test]
async fn test_full_run_snapshots_and_reaps_each_tagged_volume() {
    let provider = Arc::new(two_region_fleet());
    let mut runner = LifecycleRunner::new(provider.clone(), RunSettings::default());

    let report = runner.run().await.unwrap();

    assert!(!report.dry_run);
    assert_eq!(report.volumes.len(), 2);
    assert_eq!(report.volumes[0].volume_id, "vol-a");
    assert_eq!(report.volumes[1].volume_id, "vol-b");
    for volume in &report.volumes {
        assert!(matches!(
            volume.snapshot,
            Ok(SnapshotOutcome::Created { .. })
        ));
    }

    let calls = provider.calls();
    let created: Vec<&str> = calls
        .iter()
        .filter_map(|call| match call {
            ProviderCall::CreateSnapshot { volume_id, .. } => Some(volume_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec!["vol-a", "vol-b"]);
    assert!(!created.contains(&"vol-untagged"));

    let deleted: Vec<&str> = calls
        .iter()
        .filter_map(|call| match call {
            ProviderCall::DeleteSnapshot { snapshot_id, .. } => Some(snapshot_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec!["snap-a-old", "snap-b-ancient"]);

    let us_east = provider.snapshot_ids("us-east-1");
    assert!(us_east.contains(&"snap-a-recent".to_string()));
    assert!(us_east.contains(&"snap-a-pending".to_string()));
    assert!(!us_east.contains(&"snap-a-old".to_string()));
    assert_eq!(provider.snapshot_ids("eu-west-1").len(), 2);

    assert_eq!(report.summary.snapshots_created, 2);
    assert_eq!(report.summary.snapshots_purged, 2);
    assert_eq!(report.summary.total_failures(), 0);
}

#[tokio::test]
async fn test_new_snapshots_are_stamped_with_tag() {
    let provider = Arc::new(
        InMemoryProvider::new()
            .with_region("us-east-1")
            .with_tagged_volume("us-east-1", "vol-a", "Snapper", None),
    );
    let before = Utc::now().timestamp();
    let mut runner = LifecycleRunner::new(provider.clone(), RunSettings::default());

    let report = runner.run().await.unwrap();

    let Ok(SnapshotOutcome::Created {
        snapshot_id,
        timestamp,
    }) = &report.volumes[0].snapshot
    else {
        panic!("expected a created snapshot");
    };
    assert!(*timestamp >= before);

    let snapshot = provider.snapshot(snapshot_id).unwrap();
    assert_eq!(snapshot.volume_id, "vol-a");
    assert_eq!(snapshot.tag("Snapper"), Some(timestamp.to_string().as_str()));

    let description = provider.calls().into_iter().find_map(|call| match call {
        ProviderCall::CreateSnapshot { description, .. } => Some(description),
        _ => None,
    });
    assert!(description.unwrap().starts_with("Snapper Backup "));
}

#[tokio::test]
async fn test_dry_run_makes_no_mutating_calls() {
    let provider = Arc::new(two_region_fleet());
    let settings = RunSettings {
        dry_run: true,
        ..Default::default()
    };
    let mut runner = LifecycleRunner::new(provider.clone(), settings);

    let report = runner.run().await.unwrap();

    assert!(report.dry_run);
    assert!(provider.calls().is_empty());
    assert_eq!(provider.snapshot_ids("us-east-1").len(), 3);
    assert_eq!(provider.snapshot_ids("eu-west-1").len(), 2);
    assert_eq!(report.summary.snapshots_simulated, 2);
    assert_eq!(report.summary.purges_simulated, 2);
}

#[tokio::test]
async fn test_failed_deletion_does_not_stop_the_run() {
    let provider = Arc::new(two_region_fleet().fail_delete("snap-a-old"));
    let mut runner = LifecycleRunner::new(provider.clone(), RunSettings::default());

    let report = runner.run().await.unwrap();

    let reap_a = report.volumes[0].reap.as_ref().unwrap();
    assert_eq!(reap_a.failures.len(), 1);
    assert_eq!(reap_a.failures[0].snapshot_id, "snap-a-old");

    let reap_b = report.volumes[1].reap.as_ref().unwrap();
    assert_eq!(reap_b.purged, vec!["snap-b-ancient"]);

    assert!(
        provider
            .snapshot_ids("us-east-1")
            .contains(&"snap-a-old".to_string())
    );
    assert_eq!(report.summary.purge_failures, 1);
}

#[tokio::test]
async fn test_missing_volume_is_skipped_without_error() {
    let provider = Arc::new(
        InMemoryProvider::new()
            .with_region("us-east-1")
            .with_volume_tag("us-east-1", "vol-gone", "Snapper", Some("2.days"))
            .with_tagged_volume("us-east-1", "vol-a", "Snapper", None),
    );
    let mut runner = LifecycleRunner::new(provider.clone(), RunSettings::default());

    let report = runner.run().await.unwrap();

    assert_eq!(
        report.volumes[0].snapshot,
        Ok(SnapshotOutcome::VolumeMissing)
    );
    assert!(matches!(
        report.volumes[1].snapshot,
        Ok(SnapshotOutcome::Created { .. })
    ));
    assert_eq!(report.summary.volumes_missing, 1);
    assert_eq!(report.summary.total_failures(), 0);
}

#[tokio::test]
async fn test_custom_tag_name_scopes_everything() {
    let provider = Arc::new(
        InMemoryProvider::new()
            .with_region("us-east-1")
            .with_tagged_volume("us-east-1", "vol-a", "Snapper", None)
            .with_tagged_volume("us-east-1", "vol-b", "Backup", Some("1.day"))
            .with_stamped_snapshot(
                "us-east-1",
                "snap-a-old",
                "vol-a",
                SnapshotStatus::Completed,
                "Snapper",
                days_ago(30),
            ),
    );
    let settings = RunSettings {
        tag_name: "Backup".to_string(),
        ..Default::default()
    };
    let mut runner = LifecycleRunner::new(provider.clone(), settings);

    let report = runner.run().await.unwrap();

    assert_eq!(report.volumes.len(), 1);
    assert_eq!(report.volumes[0].volume_id, "vol-b");
    assert!(
        provider
            .snapshot_ids("us-east-1")
            .contains(&"snap-a-old".to_string())
    );
}
