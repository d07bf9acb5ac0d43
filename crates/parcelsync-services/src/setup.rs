//! Process-level initialization.
//!
//! Owns the storage root: opens the log store, creates the byte storage and
//! picks the collaborator implementations from configuration. Call once per
//! process.

use std::sync::Arc;

use anyhow::Context;
use parcelsync_core::{AllowAll, Config, PermissionChecker, SystemOfRecord};
use parcelsync_db::LogStore;
use parcelsync_storage::create_storage;

use crate::services::{StaticRoles, StaticSystemOfRecord, SyncWorkflow, WorkflowOptions};

pub async fn initialize(config: &Config) -> anyhow::Result<SyncWorkflow> {
    config.validate()?;

    let storage = create_storage(config)
        .await
        .context("Failed to initialize upload storage")?;
    tracing::info!(
        backend = %storage.backend_type(),
        upload_dir = %config.upload_dir.display(),
        "Upload storage ready"
    );

    let store = LogStore::open(&config.log_dir, config.io_timeout)
        .await
        .context("Failed to open log store")?;

    let permissions: Arc<dyn PermissionChecker> = if config.users.is_empty() {
        tracing::warn!("PARCELSYNC_USERS is empty; every user may perform every action");
        Arc::new(AllowAll)
    } else {
        Arc::new(StaticRoles::from_config(config))
    };

    let system_of_record: Arc<dyn SystemOfRecord> = match &config.system_of_record_path {
        Some(path) => Arc::new(
            StaticSystemOfRecord::load(path, config.io_timeout)
                .await
                .with_context(|| format!("Failed to load system of record {}", path.display()))?,
        ),
        None => {
            tracing::info!("No system of record configured; diffs show proposed values only");
            Arc::new(StaticSystemOfRecord::default())
        }
    };

    Ok(SyncWorkflow::new(
        Arc::new(store),
        storage,
        permissions,
        system_of_record,
        WorkflowOptions::from(config),
    ))
}
