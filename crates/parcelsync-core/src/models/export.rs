//! Combined listing of all three log tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::upload::{iso_timestamp, LogKind, UploadRecord, UploadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Staged,
    Approved,
    RolledBack,
}

impl From<LogKind> for LogType {
    fn from(kind: LogKind) -> Self {
        match kind {
            LogKind::Staging => LogType::Staged,
            LogKind::Audit => LogType::Approved,
            LogKind::Rollback => LogType::RolledBack,
        }
    }
}

/// An exported row. Storage paths are never exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub upload_id: Uuid,
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub content_hash: String,
    pub property_id: String,
    pub status: UploadStatus,
    pub log_type: LogType,
}

impl ExportRow {
    pub fn from_record(record: UploadRecord, kind: LogKind) -> Self {
        Self {
            upload_id: record.upload_id,
            timestamp: record.timestamp,
            filename: record.filename,
            content_hash: record.content_hash,
            property_id: record.property_id,
            status: record.status,
            log_type: kind.into(),
        }
    }
}

/// Service health with per-table row counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub staged: usize,
    pub approved: usize,
    pub rolled_back: usize,
}
