//! Combined export of all three log tables.

use std::sync::Arc;

use parcelsync_core::models::ExportRow;
use parcelsync_core::{SyncError, SyncResult};
use parcelsync_db::LogStore;

/// Export columns. Storage paths are never exported.
pub const EXPORT_HEADER: [&str; 7] = [
    "upload_id",
    "timestamp",
    "filename",
    "content_hash",
    "property_id",
    "status",
    "log_type",
];

pub struct LogExporter {
    store: Arc<LogStore>,
}

impl LogExporter {
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }

    /// Every record from every table, newest first.
    pub async fn rows(&self) -> SyncResult<Vec<ExportRow>> {
        let snapshot = self.store.snapshot().await?;
        let mut rows: Vec<ExportRow> = snapshot
            .entries()
            .map(|(kind, record)| ExportRow::from_record(record.clone(), kind))
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    pub async fn csv(&self) -> SyncResult<Vec<u8>> {
        to_csv(&self.rows().await?)
    }
}

/// Render rows as CSV with a header, even when there are no rows.
pub fn to_csv(rows: &[ExportRow]) -> SyncResult<Vec<u8>> {
    let encode_err = |e: csv::Error| SyncError::Internal(format!("Failed to encode export: {}", e));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER).map_err(encode_err)?;
    for row in rows {
        writer.serialize(row).map_err(encode_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| SyncError::Internal(format!("Failed to flush export: {}", e)))
}
