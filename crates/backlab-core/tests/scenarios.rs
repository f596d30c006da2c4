//! End-to-end backup cycles against real and in-memory adapters.

use std::sync::Arc;

use backlab_core::app::{BacklabConfig, BucketSelection, OrchestratorBuilder};
use backlab_core::domain::{Artifact, BacklabError, CycleStage};
use backlab_core::impls::{
    DirectoryObjectStore, InMemoryFilesystem, InMemoryObjectStore, ScriptedCommandRunner,
    TokioFilesystem,
};
use backlab_core::ports::{Bucket, CommandOutput, FixedClock, ObjectStore, Visibility};

const REFERENCE: i64 = 1_600_000_000;
const PRESERVE: i64 = 500_000_000;

#[tokio::test]
async fn scenario_a_expires_old_file_and_leaves_directory_alone() {
    let backups = tempfile::tempdir().unwrap();
    std::fs::write(backups.path().join("1000000000-a.tar"), b"old").unwrap();
    std::fs::write(backups.path().join("1500000000-b.tar"), b"new").unwrap();
    std::fs::create_dir(backups.path().join("logs")).unwrap();

    let store_root = tempfile::tempdir().unwrap();
    let store = Arc::new(DirectoryObjectStore::new(store_root.path()));
    store.create_bucket("gitlab", Visibility::AllPrivate).await.unwrap();

    let config = BacklabConfig::new(backups.path())
        .with_bucket(BucketSelection::Named("gitlab".into()))
        .with_preserve_for(PRESERVE);
    let orchestrator = OrchestratorBuilder::new(config)
        .clock(FixedClock::at_epoch(REFERENCE))
        .runner(Arc::new(ScriptedCommandRunner::succeeding()))
        .filesystem(Arc::new(TokioFilesystem))
        .store(store.clone())
        .build()
        .unwrap();

    let result = orchestrator.run_cycle().await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(
        result.locally_removed,
        vec![Artifact::new("1000000000-a.tar", 1_000_000_000)]
    );
    assert!(!backups.path().join("1000000000-a.tar").exists());
    assert!(backups.path().join("1500000000-b.tar").exists());
    assert!(backups.path().join("logs").is_dir());

    let page = store
        .list_object_versions(&Bucket::new("gitlab"), None, 100)
        .await
        .unwrap();
    assert_eq!(page.versions.len(), 1);
    assert_eq!(page.versions[0].name, "1500000000-b.tar");
}

#[tokio::test]
async fn scenario_b_only_malformed_names_means_no_artifacts() {
    let fs = InMemoryFilesystem::new();
    fs.add_dir("/backups");
    fs.add_file("/backups/notanumber.tar", b"?");

    let orchestrator = OrchestratorBuilder::new(BacklabConfig::new("/backups"))
        .clock(FixedClock::at_epoch(REFERENCE))
        .runner(Arc::new(ScriptedCommandRunner::succeeding()))
        .filesystem(Arc::new(fs))
        .store(Arc::new(InMemoryObjectStore::with_bucket("gitlab")))
        .build()
        .unwrap();

    let result = orchestrator.run_cycle().await;

    assert_eq!(result.stopped_at, Some(CycleStage::FindingNewest));
    assert!(matches!(
        result.error,
        Some(BacklabError::NoArtifactsFound { .. })
    ));
}

#[tokio::test]
async fn scenario_c_every_expired_version_is_deleted_individually() {
    let fs = Arc::new(InMemoryFilesystem::new());
    fs.add_dir("/backups");
    fs.add_file("/backups/1500000000-b.tar", b"b");

    let store = Arc::new(InMemoryObjectStore::with_bucket("gitlab"));
    let v1 = store.put_version("gitlab", "1000000000-a.tar", b"first");
    let v2 = store.put_version("gitlab", "1000000000-a.tar", b"second");

    let config = BacklabConfig::new("/backups")
        .with_bucket(BucketSelection::Named("gitlab".into()))
        .with_preserve_for(PRESERVE);
    let orchestrator = OrchestratorBuilder::new(config)
        .clock(FixedClock::at_epoch(REFERENCE))
        .runner(Arc::new(ScriptedCommandRunner::succeeding()))
        .filesystem(fs)
        .store(store.clone())
        .build()
        .unwrap();

    let result = orchestrator.run_cycle().await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(
        store.deleted(),
        vec![
            ("1000000000-a.tar".to_string(), v1),
            ("1000000000-a.tar".to_string(), v2),
        ]
    );
    assert_eq!(result.remotely_removed.len(), 2);
}

#[tokio::test]
async fn scenario_d_failed_creation_touches_nothing() {
    let fs = Arc::new(InMemoryFilesystem::new());
    fs.add_dir("/backups");
    fs.add_file("/backups/1000000000-a.tar", b"a");
    let store = Arc::new(InMemoryObjectStore::with_bucket("gitlab"));
    store.put_version("gitlab", "1000000000-a.tar", b"a");
    let runner = Arc::new(ScriptedCommandRunner::exiting(CommandOutput::failure(1, "")));

    let config = BacklabConfig::new("/backups")
        .with_bucket(BucketSelection::Named("gitlab".into()))
        .with_preserve_for(PRESERVE);
    let orchestrator = OrchestratorBuilder::new(config)
        .clock(FixedClock::at_epoch(REFERENCE))
        .runner(runner.clone())
        .filesystem(fs.clone())
        .store(store.clone())
        .build()
        .unwrap();

    let result = orchestrator.run_cycle().await;

    assert_eq!(runner.calls().len(), 1);
    assert_eq!(result.stopped_at, Some(CycleStage::Creating));
    assert!(matches!(
        result.error,
        Some(BacklabError::CreationFailed {
            exit_status: Some(1),
            ..
        })
    ));
    assert_eq!(fs.list_calls(), 0);
    assert!(fs.removed().is_empty());
    assert!(store.uploads().is_empty());
    assert_eq!(store.list_calls(), 0);
    assert!(store.deleted().is_empty());
}

#[tokio::test]
async fn rerun_after_partial_local_failure_retries_the_same_artifacts() {
    let fs = Arc::new(InMemoryFilesystem::new());
    fs.add_dir("/backups");
    fs.add_file("/backups/0900000000-a.tar", b"a");
    fs.add_file("/backups/1000000000-b.tar", b"b");
    fs.add_file("/backups/1500000000-c.tar", b"c");
    fs.fail_remove("/backups/0900000000-a.tar");

    let store = Arc::new(InMemoryObjectStore::with_bucket("gitlab"));
    let config = BacklabConfig::new("/backups")
        .with_bucket(BucketSelection::Named("gitlab".into()))
        .with_preserve_for(PRESERVE);
    let build = || {
        OrchestratorBuilder::new(config.clone())
            .clock(FixedClock::at_epoch(REFERENCE))
            .runner(Arc::new(ScriptedCommandRunner::succeeding()))
            .filesystem(fs.clone())
            .store(store.clone())
            .build()
            .unwrap()
    };

    let first = build().expire_local().await;
    assert!(first.removed.is_empty());
    assert!(matches!(
        first.error,
        Some(BacklabError::LocalDeletionFailed { .. })
    ));
    assert!(fs.exists("/backups/1000000000-b.tar"));

    // the next run sees the same expired set and retries from the start
    fs.allow_remove("/backups/0900000000-a.tar");
    let second = build().expire_local().await;
    assert!(second.error.is_none());
    assert_eq!(
        second.removed,
        vec![
            Artifact::new("0900000000-a.tar", 900_000_000),
            Artifact::new("1000000000-b.tar", 1_000_000_000),
        ]
    );
    assert!(fs.exists("/backups/1500000000-c.tar"));
}
