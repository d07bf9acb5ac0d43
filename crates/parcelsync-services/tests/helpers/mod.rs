//! Shared harness for workflow integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parcelsync_core::{Role, User};
use parcelsync_services::{
    LocalStorage, LogStore, StaticRoles, StaticSystemOfRecord, SyncWorkflow, WorkflowOptions,
};
use tempfile::TempDir;

pub const PARCEL_1: &[u8] = b"owner: Benton County\nprop_id: 4500\nland_value: 165000\nbuilding_value: 335000\n";

pub struct TestApp {
    pub workflow: SyncWorkflow,
    pub upload_dir: PathBuf,
    pub log_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn store(&self) -> &Arc<LogStore> {
        self.workflow.store()
    }

    /// Absolute path of a stored upload.
    pub fn stored_file(&self, storage_path: &str) -> PathBuf {
        self.upload_dir.join(storage_path)
    }
}

pub fn admin() -> User {
    User::new("alice")
}

pub fn reviewer() -> User {
    User::new("rita")
}

pub fn uploader() -> User {
    User::new("uma")
}

pub fn viewer() -> User {
    User::new("vic")
}

/// Not in the role table.
pub fn stranger() -> User {
    User::new("mallory")
}

fn roles() -> StaticRoles {
    StaticRoles::default()
        .with_user("alice", Role::Admin)
        .with_user("rita", Role::Reviewer)
        .with_user("uma", Role::Uploader)
        .with_user("vic", Role::Viewer)
}

fn system_of_record() -> StaticSystemOfRecord {
    StaticSystemOfRecord::default().with_property(
        "4500",
        [
            ("owner", "Benton County"),
            ("land_value", "150000"),
            ("building_value", "335000"),
            ("tax_due", "4800.50"),
        ],
    )
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(WorkflowOptions {
        io_timeout: Duration::from_secs(5),
        ..WorkflowOptions::default()
    })
    .await
}

pub async fn setup_test_app_with(options: WorkflowOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let upload_dir = temp_dir.path().join("uploads");
    let log_dir = temp_dir.path().join("logs");

    let storage = LocalStorage::new(&upload_dir).await.expect("upload storage");
    let store = LogStore::open(&log_dir, options.io_timeout)
        .await
        .expect("log store");

    let workflow = SyncWorkflow::new(
        Arc::new(store),
        Arc::new(storage),
        Arc::new(roles()),
        Arc::new(system_of_record()),
        options,
    );

    TestApp {
        workflow,
        upload_dir,
        log_dir,
        _temp_dir: temp_dir,
    }
}
