#[path = "helpers/mod.rs"]
mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use helpers::{reviewer, setup_test_app, uploader, PARCEL_1};
use parcelsync_core::models::UploadStatus;
use parcelsync_core::{AllowAll, SyncError, User};
use parcelsync_services::{
    LogStore, StaticSystemOfRecord, Storage, StorageBackend, StorageError, StorageResult,
    SyncWorkflow, WorkflowOptions,
};

#[tokio::test]
async fn test_concurrent_stages_get_unique_ids() {
    let app = setup_test_app().await;
    let user = uploader();

    let results = join_all((0..20).map(|i| {
        let wf = &app.workflow;
        let user = &user;
        async move {
            wf.stage(user, &format!("parcel{}.xml", i), PARCEL_1)
                .await
                .unwrap()
                .record
                .upload_id
        }
    }))
    .await;

    let unique: HashSet<_> = results.iter().collect();
    assert_eq!(unique.len(), 20);
    assert_eq!(app.store().snapshot().await.unwrap().staging.len(), 20);
}

#[tokio::test]
async fn test_concurrent_approvals_of_same_id_have_one_winner() {
    let app = setup_test_app().await;
    let id = app
        .workflow
        .stage(&uploader(), "parcel1.xml", PARCEL_1)
        .await
        .unwrap()
        .record
        .upload_id;

    let user = reviewer();
    let results = join_all((0..10).map(|_| app.workflow.approve(&user, id))).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }

    let snapshot = app.store().snapshot().await.unwrap();
    assert!(snapshot.staging.is_empty());
    assert_eq!(snapshot.audit.len(), 1);
}

#[tokio::test]
async fn test_concurrent_mixed_operations_keep_tables_disjoint() {
    let app = setup_test_app().await;
    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(
            app.workflow
                .stage(&uploader(), &format!("{}.xml", i), PARCEL_1)
                .await
                .unwrap()
                .record
                .upload_id,
        );
    }

    let user = reviewer();
    join_all(ids.iter().map(|&id| {
        let wf = &app.workflow;
        let user = &user;
        async move {
            wf.approve(user, id).await.unwrap();
            if id.as_u128() % 2 == 0 {
                wf.rollback(user, id).await.unwrap();
            }
        }
    }))
    .await;

    let snapshot = app.store().snapshot().await.unwrap();
    let mut seen = HashSet::new();
    for (_, record) in snapshot.entries() {
        assert!(seen.insert(record.upload_id), "duplicate {}", record.upload_id);
    }
    let created: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(seen, created);
    assert!(snapshot.staging.is_empty());
    assert!(snapshot
        .rollback
        .iter()
        .all(|r| r.status == UploadStatus::RolledBack));
}

/// Storage whose writes always fail.
struct BrokenStorage;

#[async_trait]
impl Storage for BrokenStorage {
    async fn write(&self, _identifier: &str, _data: &[u8]) -> StorageResult<String> {
        Err(StorageError::WriteFailed("disk full".to_string()))
    }

    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(path.to_string()))
    }

    async fn exists(&self, _path: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _path: &str) -> StorageResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[tokio::test]
async fn test_storage_failure_leaves_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        LogStore::open(dir.path(), std::time::Duration::from_secs(5))
            .await
            .unwrap(),
    );
    let workflow = SyncWorkflow::new(
        Arc::clone(&store),
        Arc::new(BrokenStorage),
        Arc::new(AllowAll),
        Arc::new(StaticSystemOfRecord::default()),
        WorkflowOptions::default(),
    );

    let err = workflow
        .stage(&User::new("anyone"), "parcel1.xml", PARCEL_1)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::StorageFailure(_)));
    assert!(store.snapshot().await.unwrap().is_empty());
    assert!(store.journal().await.unwrap().is_empty());
}
