use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use lakeshore_core::Tier;
use lakeshore_storage::RetentionManager;

use crate::helpers::make_partition;

#[test]
fn dry_run_reports_and_execute_deletes_only_expired() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let fresh = make_partition(dir.path(), Tier::Raw, now - Duration::days(10), 100);
    let middle = make_partition(dir.path(), Tier::Raw, now - Duration::days(40), 200);
    let old = make_partition(dir.path(), Tier::Raw, now - Duration::days(100), 300);

    let retention = BTreeMap::from([(Tier::Raw, 90)]);
    let manager = RetentionManager::new(dir.path());

    let dry = manager.cleanup_at(now, &retention, true);
    assert!(dry.dry_run);
    assert_eq!(dry.candidates.len(), 1);
    assert_eq!(dry.candidates[0].path, old);
    assert_eq!(dry.candidates[0].age_days, 100);
    assert_eq!(dry.total_bytes, 300);
    assert!(dry.deleted.is_empty());
    assert!(old.exists() && middle.exists() && fresh.exists());

    let real = manager.cleanup_at(now, &retention, false);
    assert_eq!(real.candidates, dry.candidates);
    assert_eq!(real.total_bytes, dry.total_bytes);
    assert_eq!(real.deleted, vec![old.clone()]);
    assert!(real.failed.is_empty());
    assert!(!old.exists());
    assert!(middle.exists() && fresh.exists());
}

#[test]
fn missing_tier_directory_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let report = RetentionManager::new(dir.path()).cleanup(&BTreeMap::from([(Tier::Metadata, 1)]), false);
    assert!(report.candidates.is_empty());
    assert_eq!(report.total_bytes, 0);
}
