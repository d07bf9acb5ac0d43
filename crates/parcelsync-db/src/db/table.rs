//! One log table persisted as CSV.
//!
//! Every write replaces the whole file through a temp file and a rename, so a
//! concurrent reader sees either the old table or the new one, never a
//! partially written row.

use std::io;
use std::path::{Path, PathBuf};

use parcelsync_core::models::{LogKind, UploadRecord};
use parcelsync_core::{is_content_hash, SyncError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Column order written to every table.
pub const CANONICAL_HEADER: [&str; 7] = [
    "upload_id",
    "timestamp",
    "filename",
    "content_hash",
    "property_id",
    "status",
    "storage_path",
];

#[derive(Debug, Clone)]
pub struct LogTable {
    kind: LogKind,
    path: PathBuf,
}

impl LogTable {
    pub fn new(log_dir: &Path, kind: LogKind) -> Self {
        Self {
            kind,
            path: log_dir.join(kind.file_name()),
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table with just a header row if it does not exist yet.
    ///
    /// Returns `true` when the file was created. Safe to call on every start.
    pub async fn bootstrap(&self) -> Result<bool, SyncError> {
        if fs::try_exists(&self.path).await? {
            return Ok(false);
        }
        self.save(&[]).await?;
        tracing::info!(
            table = %self.kind,
            path = %self.path.display(),
            "Initialized empty log table"
        );
        Ok(true)
    }

    /// Read every row. A missing table is bootstrapped and reads as empty.
    pub async fn load(&self) -> Result<Vec<UploadRecord>, SyncError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.bootstrap().await?;
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SyncError::StorageFailure(format!(
                    "Failed to read {} table {}: {}",
                    self.kind,
                    self.path.display(),
                    e
                )))
            }
        };
        parse_rows(self.kind, &bytes)
    }

    /// Replace the table contents with `records`.
    pub async fn save(&self, records: &[UploadRecord]) -> Result<(), SyncError> {
        let bytes = render_rows(self.kind, records)?;
        write_atomic(&self.path, &bytes).await.map_err(|e| {
            SyncError::StorageFailure(format!(
                "Failed to write {} table {}: {}",
                self.kind,
                self.path.display(),
                e
            ))
        })
    }
}

/// Parse CSV bytes into records.
///
/// Columns are matched by header name, so legacy tables (`sha256`, `prop_id`,
/// `file_path`) and extra columns are accepted. Only header cells are
/// trimmed; values are read exactly as written. A malformed row fails the
/// whole read rather than being dropped.
pub fn parse_rows(kind: LogKind, bytes: &[u8]) -> Result<Vec<UploadRecord>, SyncError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let malformed = |line: u64, detail: String| {
        SyncError::StorageFailure(format!(
            "Malformed row in {} table at line {}: {}",
            kind, line, detail
        ))
    };
    let headers = reader
        .headers()
        .map_err(|e| malformed(1, e.to_string()))?
        .clone();

    let mut records = Vec::new();
    let mut raw = csv::StringRecord::new();
    loop {
        let line = reader.position().line();
        match reader.read_record(&mut raw) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(line);
                return Err(malformed(line, e.to_string()));
            }
        }
        let line = raw.position().map(|p| p.line()).unwrap_or(line);
        let record: UploadRecord = raw
            .deserialize(Some(&headers))
            .map_err(|e| malformed(line, e.to_string()))?;
        if !is_content_hash(&record.content_hash) {
            return Err(malformed(
                line,
                format!(
                    "content hash {:?} is not a SHA-256 hex digest",
                    record.content_hash
                ),
            ));
        }
        records.push(record);
    }
    Ok(records)
}

/// Render records with the canonical header, even when there are none.
pub fn render_rows(kind: LogKind, records: &[UploadRecord]) -> Result<Vec<u8>, SyncError> {
    let encode_err =
        |e: csv::Error| SyncError::StorageFailure(format!("Failed to encode {} table: {}", kind, e));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CANONICAL_HEADER).map_err(encode_err)?;
    for record in records {
        writer.serialize(record).map_err(encode_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| SyncError::StorageFailure(format!("Failed to flush {} table: {}", kind, e)))
}

/// Write `bytes` to `path` via a sibling temp file, fsync and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = write_then_rename(&temp_path, path, bytes).await;
    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    result
}

async fn write_then_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, path).await
}
