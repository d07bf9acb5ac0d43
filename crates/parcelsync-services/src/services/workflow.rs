//! The staging workflow engine.
//!
//! Creates upload records, moves them `PENDING -> APPROVED -> ROLLED_BACK`
//! through the log store, and gates every call on the permission checker.
//! Bytes are persisted before any row is written, so a storage failure never
//! leaves a record behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SubsecRound, Utc};
use parcelsync_core::models::{
    DiffReport, ExportRow, HealthReport, LogKind, RecordView, StagedUpload, TransitionEvent,
    TransitionKind, UploadRecord, UploadStatus,
};
use parcelsync_core::{
    bounded, content_hash, Action, ChainExtractor, Config, IdentifierExtractor,
    PermissionChecker, SyncError, SyncResult, SystemOfRecord, User,
};
use parcelsync_db::LogStore;
use parcelsync_storage::{generate_storage_key, Storage};
use uuid::Uuid;

use super::diff::DiffGenerator;
use super::export::LogExporter;
use super::permissions::ensure;

const MAX_FILENAME_BYTES: usize = 255;

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Refuse `approve` until a diff has been retrieved for the upload
    pub require_diff_before_approve: bool,
    pub max_upload_bytes: usize,
    pub io_timeout: Duration,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            require_diff_before_approve: false,
            max_upload_bytes: 50 * 1024 * 1024,
            io_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for WorkflowOptions {
    fn from(config: &Config) -> Self {
        Self {
            require_diff_before_approve: config.require_diff_before_approve,
            max_upload_bytes: config.max_upload_bytes,
            io_timeout: config.io_timeout,
        }
    }
}

pub struct SyncWorkflow {
    store: Arc<LogStore>,
    storage: Arc<dyn Storage>,
    permissions: Arc<dyn PermissionChecker>,
    extractor: Arc<dyn IdentifierExtractor>,
    diff: DiffGenerator,
    exporter: LogExporter,
    options: WorkflowOptions,
}

impl SyncWorkflow {
    pub fn new(
        store: Arc<LogStore>,
        storage: Arc<dyn Storage>,
        permissions: Arc<dyn PermissionChecker>,
        system_of_record: Arc<dyn SystemOfRecord>,
        options: WorkflowOptions,
    ) -> Self {
        let diff = DiffGenerator::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            system_of_record,
            options.io_timeout,
        );
        let exporter = LogExporter::new(Arc::clone(&store));
        Self {
            store,
            storage,
            permissions,
            extractor: Arc::new(ChainExtractor::default()),
            diff,
            exporter,
            options,
        }
    }

    /// Swap the identifier extraction strategy.
    pub fn with_extractor(mut self, extractor: Arc<dyn IdentifierExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Stage a file for review as a `PENDING` record.
    #[tracing::instrument(skip(self, user, bytes), fields(user = %user.id, size_bytes = bytes.len()))]
    pub async fn stage(&self, user: &User, filename: &str, bytes: &[u8]) -> SyncResult<StagedUpload> {
        ensure(self.permissions.as_ref(), user, Action::Upload).await?;
        self.create(user, filename, bytes, UploadStatus::Pending).await
    }

    /// Import a file straight into the audit table as `APPROVED`.
    ///
    /// Counts as both an upload and an approval, so both are checked.
    #[tracing::instrument(skip(self, user, bytes), fields(user = %user.id, size_bytes = bytes.len()))]
    pub async fn ingest(&self, user: &User, filename: &str, bytes: &[u8]) -> SyncResult<StagedUpload> {
        ensure(self.permissions.as_ref(), user, Action::Upload).await?;
        ensure(self.permissions.as_ref(), user, Action::Approve).await?;
        self.create(user, filename, bytes, UploadStatus::Approved).await
    }

    async fn create(
        &self,
        user: &User,
        filename: &str,
        bytes: &[u8],
        status: UploadStatus,
    ) -> SyncResult<StagedUpload> {
        let start = Instant::now();
        self.validate_upload(filename, bytes)?;

        let digest = content_hash(bytes);
        let extraction = self.extractor.extract(bytes);
        let upload_id = self.store.allocate_upload_id().await?;
        // Tables keep microseconds; the returned record must match a reload.
        let timestamp = Utc::now().trunc_subsecs(6);

        let key = generate_storage_key(upload_id, filename, timestamp);
        let storage_path = bounded(
            self.options.io_timeout,
            "upload write",
            self.storage.write(&key, bytes),
        )
        .await?;

        let record = UploadRecord {
            upload_id,
            timestamp,
            filename: filename.to_string(),
            content_hash: digest,
            property_id: extraction.property_id().to_string(),
            status,
            storage_path,
        };

        let record = match self.store.create(record, &user.id).await {
            Ok(record) => record,
            Err(err) => {
                self.discard_bytes(upload_id, &key).await;
                return Err(err);
            }
        };

        let risk_reason = extraction.risk_reason();
        if let Some(reason) = risk_reason {
            tracing::warn!(
                upload_id = %upload_id,
                filename = %filename,
                reason = ?reason,
                extractor = self.extractor.name(),
                "No property identifier found, upload flagged high risk"
            );
        }

        tracing::info!(
            upload_id = %upload_id,
            property_id = %record.property_id,
            status = %record.status,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload recorded"
        );

        Ok(StagedUpload::new(record, risk_reason))
    }

    fn validate_upload(&self, filename: &str, bytes: &[u8]) -> SyncResult<()> {
        if filename.trim().is_empty() {
            return Err(SyncError::InvalidInput("Filename must not be empty".to_string()));
        }
        if filename.len() > MAX_FILENAME_BYTES {
            return Err(SyncError::InvalidInput(format!(
                "Filename exceeds {} bytes",
                MAX_FILENAME_BYTES
            )));
        }
        if filename.chars().any(char::is_control) {
            return Err(SyncError::InvalidInput(
                "Filename must not contain control characters".to_string(),
            ));
        }
        if bytes.len() > self.options.max_upload_bytes {
            return Err(SyncError::InvalidInput(format!(
                "Upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.options.max_upload_bytes
            )));
        }
        Ok(())
    }

    /// Best-effort removal of bytes whose record was never written.
    async fn discard_bytes(&self, upload_id: Uuid, key: &str) {
        let removed = bounded(
            self.options.io_timeout,
            "upload delete",
            self.storage.delete(key),
        )
        .await;
        if let Err(e) = removed {
            tracing::warn!(
                upload_id = %upload_id,
                key = %key,
                error = %e,
                "Failed to remove bytes of an unrecorded upload"
            );
        }
    }

    /// Move a staged record to the audit table.
    ///
    /// The stored bytes must still hash to the recorded digest. With
    /// `require_diff_before_approve`, a diff must have been retrieved first.
    #[tracing::instrument(skip(self, user), fields(user = %user.id))]
    pub async fn approve(&self, user: &User, upload_id: Uuid) -> SyncResult<UploadRecord> {
        ensure(self.permissions.as_ref(), user, Action::Approve).await?;

        let record = self.store.find(LogKind::Staging, upload_id).await?;

        if self.options.require_diff_before_approve
            && !self
                .store
                .has_event(upload_id, TransitionKind::DiffViewed)
                .await?
        {
            return Err(SyncError::DiffRequired(upload_id.to_string()));
        }

        self.verify_integrity(&record).await?;

        self.store
            .move_record(LogKind::Staging, upload_id, UploadStatus::Approved, &user.id)
            .await
    }

    /// Move an approved record to the rollback table.
    ///
    /// Only the audit table is searched; a record still in staging was never
    /// approved and cannot be rolled back.
    #[tracing::instrument(skip(self, user), fields(user = %user.id))]
    pub async fn rollback(&self, user: &User, upload_id: Uuid) -> SyncResult<UploadRecord> {
        ensure(self.permissions.as_ref(), user, Action::Rollback).await?;
        self.store
            .move_record(LogKind::Audit, upload_id, UploadStatus::RolledBack, &user.id)
            .await
    }

    async fn verify_integrity(&self, record: &UploadRecord) -> SyncResult<()> {
        let bytes = bounded(
            self.options.io_timeout,
            "upload read",
            self.storage.read(&record.storage_path),
        )
        .await?;
        let actual = content_hash(&bytes);
        if actual != record.content_hash {
            tracing::error!(
                upload_id = %record.upload_id,
                expected = %record.content_hash,
                actual = %actual,
                "Stored bytes no longer match recorded digest"
            );
            return Err(SyncError::IntegrityMismatch {
                upload_id: record.upload_id.to_string(),
                expected: record.content_hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Field-level diff for a staged upload. Retrieval is journaled.
    #[tracing::instrument(skip(self, user), fields(user = %user.id))]
    pub async fn diff(&self, user: &User, upload_id: Uuid) -> SyncResult<DiffReport> {
        ensure(self.permissions.as_ref(), user, Action::Diff).await?;
        let report = self.diff.generate(upload_id).await?;
        self.store
            .record_event(&TransitionEvent::new(
                upload_id,
                TransitionKind::DiffViewed,
                None,
                None,
                user.id.clone(),
            ))
            .await?;
        Ok(report)
    }

    /// Staged rows without storage paths.
    pub async fn list_staging(&self, user: &User) -> SyncResult<Vec<RecordView>> {
        ensure(self.permissions.as_ref(), user, Action::View).await?;
        Ok(self
            .store
            .list(LogKind::Staging)
            .await?
            .iter()
            .map(UploadRecord::view)
            .collect())
    }

    /// Current state of an upload, wherever it is.
    pub async fn status(&self, user: &User, upload_id: Uuid) -> SyncResult<RecordView> {
        ensure(self.permissions.as_ref(), user, Action::View).await?;
        let (_, record) = self.store.locate(upload_id).await?;
        Ok(record.view())
    }

    /// Journaled transitions of an upload, oldest first.
    pub async fn history(&self, user: &User, upload_id: Uuid) -> SyncResult<Vec<TransitionEvent>> {
        ensure(self.permissions.as_ref(), user, Action::View).await?;
        let events = self.store.history(upload_id).await?;
        if events.is_empty() && self.store.locate(upload_id).await.is_err() {
            return Err(SyncError::NotFound(format!(
                "Upload {} does not exist",
                upload_id
            )));
        }
        Ok(events)
    }

    /// All three tables combined, newest first, without storage paths.
    pub async fn export(&self, user: &User) -> SyncResult<Vec<ExportRow>> {
        ensure(self.permissions.as_ref(), user, Action::Export).await?;
        self.exporter.rows().await
    }

    /// [`SyncWorkflow::export`] rendered as CSV.
    pub async fn export_csv(&self, user: &User) -> SyncResult<Vec<u8>> {
        ensure(self.permissions.as_ref(), user, Action::Export).await?;
        self.exporter.csv().await
    }

    pub async fn health(&self) -> SyncResult<HealthReport> {
        let snapshot = self.store.snapshot().await?;
        Ok(HealthReport {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            staged: snapshot.staging.len(),
            approved: snapshot.audit.len(),
            rolled_back: snapshot.rollback.len(),
        })
    }
}
