//! The log store: three CSV tables plus the transition journal.
//!
//! Nothing is cached between calls; every operation re-reads the tables it
//! touches. Reads share a store-wide gate, writes (append, remove, move,
//! reconcile) hold it exclusively, so a reader never sees one half of a move.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parcelsync_core::models::{
    LogKind, TransitionEvent, TransitionKind, UploadRecord, UploadStatus,
};
use parcelsync_core::{bounded, SyncError, SyncResult};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::journal::Journal;
use super::lock::DirectoryLock;
use super::table::LogTable;

/// All three tables read under one shared lock.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub staging: Vec<UploadRecord>,
    pub audit: Vec<UploadRecord>,
    pub rollback: Vec<UploadRecord>,
}

impl StoreSnapshot {
    pub fn table(&self, kind: LogKind) -> &[UploadRecord] {
        match kind {
            LogKind::Staging => &self.staging,
            LogKind::Audit => &self.audit,
            LogKind::Rollback => &self.rollback,
        }
    }

    /// Every record with the table it sits in.
    pub fn entries(&self) -> impl Iterator<Item = (LogKind, &UploadRecord)> {
        LogKind::ALL
            .into_iter()
            .flat_map(move |kind| self.table(kind).iter().map(move |r| (kind, r)))
    }

    pub fn locate(&self, upload_id: Uuid) -> Option<(LogKind, &UploadRecord)> {
        self.entries().find(|(_, r)| r.upload_id == upload_id)
    }

    pub fn contains(&self, upload_id: Uuid) -> bool {
        self.locate(upload_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.staging.len() + self.audit.len() + self.rollback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Repairs made by [`LogStore::reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rows dropped because a later-stage table holds the same upload
    pub cross_table_duplicates: usize,
    /// Repeated rows within one table (first kept)
    pub in_table_duplicates: usize,
    /// Rows whose status disagreed with their table
    pub status_repairs: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

pub struct LogStore {
    log_dir: PathBuf,
    staging: LogTable,
    audit: LogTable,
    rollback: LogTable,
    journal: Journal,
    io_timeout: Duration,
    gate: RwLock<()>,
    _lock: DirectoryLock,
    #[cfg(test)]
    failing_tables: std::sync::Mutex<HashSet<LogKind>>,
}

impl LogStore {
    /// Open the store rooted at `log_dir`.
    ///
    /// Creates the directory, takes the directory lock, bootstraps missing
    /// tables and repairs anything an interrupted move left behind. Run once
    /// per process, before any workflow call.
    pub async fn open(log_dir: impl AsRef<Path>, io_timeout: Duration) -> SyncResult<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        bounded(
            io_timeout,
            "create log directory",
            tokio::fs::create_dir_all(&log_dir),
        )
        .await?;

        let lock = DirectoryLock::acquire(&log_dir)?;

        let store = Self {
            staging: LogTable::new(&log_dir, LogKind::Staging),
            audit: LogTable::new(&log_dir, LogKind::Audit),
            rollback: LogTable::new(&log_dir, LogKind::Rollback),
            journal: Journal::new(&log_dir),
            log_dir,
            io_timeout,
            gate: RwLock::new(()),
            _lock: lock,
            #[cfg(test)]
            failing_tables: Default::default(),
        };

        for kind in LogKind::ALL {
            bounded(io_timeout, "bootstrap table", store.table(kind).bootstrap()).await?;
        }
        bounded(io_timeout, "journal repair", store.journal.repair_tail()).await?;

        let report = store.reconcile().await?;
        tracing::info!(
            log_dir = %store.log_dir.display(),
            repaired = !report.is_clean(),
            "Log store opened"
        );
        Ok(store)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn table(&self, kind: LogKind) -> &LogTable {
        match kind {
            LogKind::Staging => &self.staging,
            LogKind::Audit => &self.audit,
            LogKind::Rollback => &self.rollback,
        }
    }

    async fn load(&self, kind: LogKind) -> SyncResult<Vec<UploadRecord>> {
        bounded(self.io_timeout, "table read", self.table(kind).load()).await
    }

    async fn save(&self, kind: LogKind, records: &[UploadRecord]) -> SyncResult<()> {
        #[cfg(test)]
        {
            let failing = self
                .failing_tables
                .lock()
                .map(|tables| tables.contains(&kind))
                .unwrap_or(false);
            if failing {
                return Err(SyncError::StorageFailure(format!(
                    "Write to {} table refused",
                    kind
                )));
            }
        }
        bounded(self.io_timeout, "table write", self.table(kind).save(records)).await
    }

    async fn load_all(&self) -> SyncResult<StoreSnapshot> {
        Ok(StoreSnapshot {
            staging: self.load(LogKind::Staging).await?,
            audit: self.load(LogKind::Audit).await?,
            rollback: self.load(LogKind::Rollback).await?,
        })
    }

    /// Current rows of one table.
    #[tracing::instrument(skip(self), fields(log.table = %kind, log.operation = "select"))]
    pub async fn list(&self, kind: LogKind) -> SyncResult<Vec<UploadRecord>> {
        let _read = self.gate.read().await;
        self.load(kind).await
    }

    /// Look up `upload_id` in one table.
    #[tracing::instrument(skip(self), fields(log.table = %kind, log.operation = "select", log.record_id = %upload_id))]
    pub async fn find(&self, kind: LogKind, upload_id: Uuid) -> SyncResult<UploadRecord> {
        let _read = self.gate.read().await;
        self.load(kind)
            .await?
            .into_iter()
            .find(|r| r.upload_id == upload_id)
            .ok_or_else(|| not_in_table(upload_id, kind))
    }

    /// Find `upload_id` in whichever table holds it.
    #[tracing::instrument(skip(self), fields(log.operation = "select", log.record_id = %upload_id))]
    pub async fn locate(&self, upload_id: Uuid) -> SyncResult<(LogKind, UploadRecord)> {
        let snapshot = self.snapshot().await?;
        snapshot
            .locate(upload_id)
            .map(|(kind, record)| (kind, record.clone()))
            .ok_or_else(|| SyncError::NotFound(format!("Upload {} does not exist", upload_id)))
    }

    /// Consistent view of all three tables.
    pub async fn snapshot(&self) -> SyncResult<StoreSnapshot> {
        let _read = self.gate.read().await;
        self.load_all().await
    }

    /// A fresh upload id not present in any table.
    pub async fn allocate_upload_id(&self) -> SyncResult<Uuid> {
        let snapshot = self.snapshot().await?;
        loop {
            let candidate = Uuid::new_v4();
            if !snapshot.contains(candidate) {
                return Ok(candidate);
            }
            tracing::warn!(upload_id = %candidate, "Upload id collision, regenerating");
        }
    }

    /// Append a row to `kind`.
    ///
    /// Refused when the id already exists in any table or the status does not
    /// belong in `kind`.
    #[tracing::instrument(skip(self, record), fields(log.table = %kind, log.operation = "insert", log.record_id = %record.upload_id))]
    pub async fn append(&self, kind: LogKind, record: UploadRecord) -> SyncResult<()> {
        let _write = self.gate.write().await;
        self.append_locked(kind, record).await
    }

    async fn append_locked(&self, kind: LogKind, record: UploadRecord) -> SyncResult<()> {
        if record.status != kind.status() {
            return Err(SyncError::InvalidInput(format!(
                "A {} record cannot be appended to the {} table",
                record.status, kind
            )));
        }

        let mut snapshot = self.load_all().await?;
        if let Some((existing, _)) = snapshot.locate(record.upload_id) {
            return Err(SyncError::InvalidInput(format!(
                "Upload {} already exists in the {} table",
                record.upload_id, existing
            )));
        }

        let rows = match kind {
            LogKind::Staging => &mut snapshot.staging,
            LogKind::Audit => &mut snapshot.audit,
            LogKind::Rollback => &mut snapshot.rollback,
        };
        rows.push(record);
        self.save(kind, rows).await
    }

    /// Remove `upload_id` from `kind` and return the removed row.
    #[tracing::instrument(skip(self), fields(log.table = %kind, log.operation = "delete", log.record_id = %upload_id))]
    pub async fn remove(&self, kind: LogKind, upload_id: Uuid) -> SyncResult<UploadRecord> {
        let _write = self.gate.write().await;
        let mut rows = self.load(kind).await?;
        let position = rows
            .iter()
            .position(|r| r.upload_id == upload_id)
            .ok_or_else(|| not_in_table(upload_id, kind))?;
        let removed = rows.remove(position);
        self.save(kind, &rows).await?;
        Ok(removed)
    }

    /// Insert a newly created record into the table its status belongs to
    /// and journal the creation.
    #[tracing::instrument(skip(self, record), fields(log.operation = "create", log.record_id = %record.upload_id))]
    pub async fn create(&self, record: UploadRecord, actor: &str) -> SyncResult<UploadRecord> {
        let _write = self.gate.write().await;
        let kind = record.status.log_kind();
        self.append_locked(kind, record.clone()).await?;

        self.journal_after_commit(&TransitionEvent::created(
            record.upload_id,
            record.status,
            actor,
        ))
        .await;
        tracing::info!(
            upload_id = %record.upload_id,
            table = %kind,
            status = %record.status,
            actor = %actor,
            "Upload record created"
        );
        Ok(record)
    }

    /// Move `upload_id` out of `from` into the table for `next`.
    ///
    /// The destination is written first, then the source. If the source
    /// write fails the destination is put back as it was. Concurrent moves of
    /// the same id serialize on the write gate; the loser finds the record
    /// gone and gets `NotFound`.
    #[tracing::instrument(skip(self), fields(log.table = %from, log.operation = "move", log.record_id = %upload_id))]
    pub async fn move_record(
        &self,
        from: LogKind,
        upload_id: Uuid,
        next: UploadStatus,
        actor: &str,
    ) -> SyncResult<UploadRecord> {
        let start = Instant::now();
        let to = next.log_kind();
        let _write = self.gate.write().await;

        let mut source = self.load(from).await?;
        let position = source
            .iter()
            .position(|r| r.upload_id == upload_id)
            .ok_or_else(|| not_in_table(upload_id, from))?;
        let previous_status = source[position].status;
        let moved = source[position].clone().transition(next)?;

        let destination_before = self.load(to).await?;
        if destination_before.iter().any(|r| r.upload_id == upload_id) {
            return Err(SyncError::Internal(format!(
                "Upload {} is already present in the {} table",
                upload_id, to
            )));
        }

        let mut destination = destination_before.clone();
        destination.push(moved.clone());
        self.save(to, &destination).await?;

        source.remove(position);
        if let Err(err) = self.save(from, &source).await {
            tracing::warn!(
                upload_id = %upload_id,
                from = %from,
                to = %to,
                error = %err,
                "Source table write failed, restoring destination"
            );
            if let Err(restore_err) = self.save(to, &destination_before).await {
                tracing::error!(
                    upload_id = %upload_id,
                    table = %to,
                    error = %restore_err,
                    "Compensation failed; duplicate will be repaired on next open"
                );
            }
            return Err(err);
        }

        self.journal_after_commit(&TransitionEvent::moved(
            upload_id,
            previous_status,
            next,
            actor,
        ))
        .await;

        tracing::info!(
            upload_id = %upload_id,
            from = %from,
            to = %to,
            actor = %actor,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload record moved"
        );
        Ok(moved)
    }

    /// The tables are already committed; a journal failure is reported, not
    /// propagated.
    async fn journal_after_commit(&self, event: &TransitionEvent) {
        if let Err(e) = bounded(self.io_timeout, "journal append", self.journal.append(event)).await
        {
            tracing::error!(
                upload_id = %event.upload_id,
                kind = %event.kind,
                error = %e,
                "Failed to journal committed transition"
            );
        }
    }

    /// Journal an event that changes no table (e.g. a diff review).
    pub async fn record_event(&self, event: &TransitionEvent) -> SyncResult<()> {
        let _write = self.gate.write().await;
        bounded(self.io_timeout, "journal append", self.journal.append(event)).await
    }

    /// The whole journal in append order.
    pub async fn journal(&self) -> SyncResult<Vec<TransitionEvent>> {
        let _read = self.gate.read().await;
        bounded(self.io_timeout, "journal read", self.journal.read_all()).await
    }

    /// Journal events for one upload, oldest first.
    pub async fn history(&self, upload_id: Uuid) -> SyncResult<Vec<TransitionEvent>> {
        Ok(self
            .journal()
            .await?
            .into_iter()
            .filter(|e| e.upload_id == upload_id)
            .collect())
    }

    pub async fn has_event(&self, upload_id: Uuid, kind: TransitionKind) -> SyncResult<bool> {
        Ok(self
            .history(upload_id)
            .await?
            .iter()
            .any(|e| e.kind == kind))
    }

    /// Restore the one-table-per-record invariant.
    ///
    /// Within a table the first copy of an id wins. Across tables the copy in
    /// the later lifecycle table wins, since a move writes its destination
    /// before touching the source. Rows whose status disagrees with their
    /// table are rewritten to the table's status.
    #[tracing::instrument(skip(self), fields(log.operation = "reconcile"))]
    pub async fn reconcile(&self) -> SyncResult<ReconcileReport> {
        let _write = self.gate.write().await;
        let mut report = ReconcileReport::default();

        let mut tables: Vec<(LogKind, Vec<UploadRecord>, bool)> = Vec::new();
        for kind in LogKind::ALL {
            let rows = self.load(kind).await?;
            let mut seen = HashSet::new();
            let mut kept = Vec::with_capacity(rows.len());
            let mut changed = false;

            for mut row in rows {
                if !seen.insert(row.upload_id) {
                    report.in_table_duplicates += 1;
                    changed = true;
                    tracing::warn!(upload_id = %row.upload_id, table = %kind, "Dropping repeated row");
                    continue;
                }
                if row.status != kind.status() {
                    tracing::warn!(
                        upload_id = %row.upload_id,
                        table = %kind,
                        found = %row.status,
                        "Correcting row status to match its table"
                    );
                    row.status = kind.status();
                    report.status_repairs += 1;
                    changed = true;
                }
                kept.push(row);
            }
            tables.push((kind, kept, changed));
        }

        let mut latest: HashMap<Uuid, LogKind> = HashMap::new();
        for (kind, rows, _) in &tables {
            for row in rows {
                latest
                    .entry(row.upload_id)
                    .and_modify(|k| {
                        if kind.rank() > k.rank() {
                            *k = *kind;
                        }
                    })
                    .or_insert(*kind);
            }
        }

        for (kind, rows, changed) in &mut tables {
            let kind = *kind;
            let before = rows.len();
            rows.retain(|row| {
                let keep = latest.get(&row.upload_id) == Some(&kind);
                if !keep {
                    tracing::warn!(
                        upload_id = %row.upload_id,
                        table = %kind,
                        "Dropping copy superseded by a later table"
                    );
                }
                keep
            });
            if rows.len() != before {
                report.cross_table_duplicates += before - rows.len();
                *changed = true;
            }
        }

        for (kind, rows, changed) in &tables {
            if *changed {
                self.save(*kind, rows).await?;
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                cross_table = report.cross_table_duplicates,
                in_table = report.in_table_duplicates,
                status = report.status_repairs,
                "Log tables reconciled"
            );
        }
        Ok(report)
    }
}

fn not_in_table(upload_id: Uuid, kind: LogKind) -> SyncError {
    SyncError::NotFound(format!("Upload {} is not in the {} table", upload_id, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, Utc};
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn record(status: UploadStatus) -> UploadRecord {
        UploadRecord {
            upload_id: Uuid::new_v4(),
            timestamp: Utc::now().trunc_subsecs(6),
            filename: "parcel1.xml".to_string(),
            content_hash: parcelsync_core::content_hash(b"prop_id: 4500"),
            property_id: "4500".to_string(),
            status,
            storage_path: "20240101000000_x_parcel1.xml".to_string(),
        }
    }

    #[tokio::test]
    async fn open_bootstraps_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path().join("logs"), TIMEOUT).await.unwrap();

        for kind in LogKind::ALL {
            assert!(store.table(kind).path().exists());
            assert!(store.list(kind).await.unwrap().is_empty());
        }
        drop(store);

        // Reopening an existing store is a no-op.
        let store = LogStore::open(dir.path().join("logs"), TIMEOUT).await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_open_on_same_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let _store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();

        let err = LogStore::open(dir.path(), TIMEOUT).await.err().unwrap();
        assert!(matches!(err, SyncError::StorageFailure(_)));
    }

    #[tokio::test]
    async fn create_find_and_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let pending = record(UploadStatus::Pending);

        store.create(pending.clone(), "alice").await.unwrap();
        assert_eq!(
            store.find(LogKind::Staging, pending.upload_id).await.unwrap(),
            pending
        );
        assert!(store
            .find(LogKind::Audit, pending.upload_id)
            .await
            .unwrap_err()
            .is_not_found());

        let history = store.history(pending.upload_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransitionKind::Staged);
        assert_eq!(history[0].actor, "alice");
    }

    #[tokio::test]
    async fn append_rejects_duplicates_and_wrong_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let pending = record(UploadStatus::Pending);

        store.append(LogKind::Staging, pending.clone()).await.unwrap();

        let mut copy = pending.clone();
        copy.status = UploadStatus::Approved;
        let err = store.append(LogKind::Audit, copy).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));

        let err = store
            .append(LogKind::Audit, record(UploadStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn remove_returns_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let pending = record(UploadStatus::Pending);
        store.append(LogKind::Staging, pending.clone()).await.unwrap();

        let removed = store.remove(LogKind::Staging, pending.upload_id).await.unwrap();
        assert_eq!(removed, pending);
        assert!(store
            .remove(LogKind::Staging, pending.upload_id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn move_follows_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let pending = store.create(record(UploadStatus::Pending), "alice").await.unwrap();
        let id = pending.upload_id;

        // Pending cannot skip straight to rolled back.
        let err = store
            .move_record(LogKind::Staging, id, UploadStatus::RolledBack, "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));

        let approved = store
            .move_record(LogKind::Staging, id, UploadStatus::Approved, "bob")
            .await
            .unwrap();
        assert_eq!(approved.status, UploadStatus::Approved);
        assert_eq!(approved.content_hash, pending.content_hash);

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.staging.is_empty());
        assert_eq!(snapshot.audit, vec![approved.clone()]);

        let rolled_back = store
            .move_record(LogKind::Audit, id, UploadStatus::RolledBack, "bob")
            .await
            .unwrap();
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.rollback, vec![rolled_back]);

        let kinds: Vec<_> = store
            .history(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TransitionKind::Staged,
                TransitionKind::Approved,
                TransitionKind::RolledBack
            ]
        );
    }

    #[tokio::test]
    async fn failed_source_write_restores_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let earlier = record(UploadStatus::Approved);
        let pending = record(UploadStatus::Pending);
        store.create(earlier.clone(), "alice").await.unwrap();
        store.create(pending.clone(), "alice").await.unwrap();
        let audit_before = std::fs::read(store.table(LogKind::Audit).path()).unwrap();

        store
            .failing_tables
            .lock()
            .unwrap()
            .insert(LogKind::Staging);
        let err = store
            .move_record(LogKind::Staging, pending.upload_id, UploadStatus::Approved, "rita")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StorageFailure(_)));

        assert_eq!(store.list(LogKind::Audit).await.unwrap(), vec![earlier]);
        assert_eq!(
            std::fs::read(store.table(LogKind::Audit).path()).unwrap(),
            audit_before
        );
        assert_eq!(store.list(LogKind::Staging).await.unwrap(), vec![pending.clone()]);
        assert!(!store
            .has_event(pending.upload_id, TransitionKind::Approved)
            .await
            .unwrap());

        store.failing_tables.lock().unwrap().clear();
        let approved = store
            .move_record(LogKind::Staging, pending.upload_id, UploadStatus::Approved, "rita")
            .await
            .unwrap();
        assert_eq!(approved.status, UploadStatus::Approved);
        assert!(store.list(LogKind::Staging).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_destination_write_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let approved = record(UploadStatus::Approved);
        store.create(approved.clone(), "alice").await.unwrap();

        store
            .failing_tables
            .lock()
            .unwrap()
            .insert(LogKind::Rollback);
        let err = store
            .move_record(LogKind::Audit, approved.upload_id, UploadStatus::RolledBack, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StorageFailure(_)));
        assert_eq!(store.list(LogKind::Audit).await.unwrap(), vec![approved]);
        assert!(store.list(LogKind::Rollback).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_moves_of_one_id_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::open(dir.path(), TIMEOUT).await.unwrap());
        let id = store
            .create(record(UploadStatus::Pending), "alice")
            .await
            .unwrap()
            .upload_id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .move_record(LogKind::Staging, id, UploadStatus::Approved, &format!("r{}", i))
                        .await
                })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert!(e.is_not_found()),
            }
        }
        assert_eq!(wins, 1);

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.staging.is_empty());
        assert_eq!(snapshot.audit.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_moves_of_different_ids_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::open(dir.path(), TIMEOUT).await.unwrap());
        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(
                store
                    .create(record(UploadStatus::Pending), "alice")
                    .await
                    .unwrap()
                    .upload_id,
            );
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .move_record(LogKind::Staging, id, UploadStatus::Approved, "bob")
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.staging.is_empty());
        let mut approved: Vec<_> = snapshot.audit.iter().map(|r| r.upload_id).collect();
        approved.sort();
        ids.sort();
        assert_eq!(approved, ids);
    }

    #[tokio::test]
    async fn open_reconciles_interrupted_moves() {
        let dir = tempfile::tempdir().unwrap();
        let pending = record(UploadStatus::Pending);
        let mut approved = pending.clone();
        approved.status = UploadStatus::Approved;
        let mislabelled = record(UploadStatus::Approved);

        // A move that committed its destination but never rewrote the source,
        // a repeated row, and a row carrying the wrong status.
        LogTable::new(dir.path(), LogKind::Staging)
            .save(&[pending.clone(), mislabelled.clone()])
            .await
            .unwrap();
        LogTable::new(dir.path(), LogKind::Audit)
            .save(&[approved.clone(), approved.clone()])
            .await
            .unwrap();

        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.audit, vec![approved]);
        assert_eq!(snapshot.staging.len(), 1);
        assert_eq!(snapshot.staging[0].upload_id, mislabelled.upload_id);
        assert_eq!(snapshot.staging[0].status, UploadStatus::Pending);

        // Already clean now.
        assert!(store.reconcile().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn reconcile_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let approved = record(UploadStatus::Approved);
        let mut rolled_back = approved.clone();
        rolled_back.status = UploadStatus::RolledBack;

        store.table(LogKind::Audit).save(&[approved.clone(), approved]).await.unwrap();
        store.table(LogKind::Rollback).save(&[rolled_back]).await.unwrap();

        let report = store.reconcile().await.unwrap();
        assert_eq!(report.in_table_duplicates, 1);
        assert_eq!(report.cross_table_duplicates, 1);
        assert_eq!(report.status_repairs, 0);
        assert!(store.list(LogKind::Audit).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn allocated_ids_are_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path(), TIMEOUT).await.unwrap();
        let existing = store.create(record(UploadStatus::Pending), "a").await.unwrap();
        let id = store.allocate_upload_id().await.unwrap();
        assert_ne!(id, existing.upload_id);
        assert_eq!(id.get_version_num(), 4);
    }
}
