//! Upload records and the log tables they live in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SyncError;

/// Review status of an upload.
///
/// Transitions are strictly `PENDING -> APPROVED -> ROLLED_BACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    Approved,
    RolledBack,
}

impl UploadStatus {
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (UploadStatus::Pending, UploadStatus::Approved)
                | (UploadStatus::Approved, UploadStatus::RolledBack)
        )
    }

    /// The table a record with this status belongs in.
    pub fn log_kind(self) -> LogKind {
        match self {
            UploadStatus::Pending => LogKind::Staging,
            UploadStatus::Approved => LogKind::Audit,
            UploadStatus::RolledBack => LogKind::Rollback,
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Pending => write!(f, "PENDING"),
            UploadStatus::Approved => write!(f, "APPROVED"),
            UploadStatus::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(UploadStatus::Pending),
            "APPROVED" => Ok(UploadStatus::Approved),
            "ROLLED_BACK" => Ok(UploadStatus::RolledBack),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// One of the three log tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Staging,
    Audit,
    Rollback,
}

impl LogKind {
    /// All tables, in lifecycle order.
    pub const ALL: [LogKind; 3] = [LogKind::Staging, LogKind::Audit, LogKind::Rollback];

    pub fn file_name(self) -> &'static str {
        match self {
            LogKind::Staging => "staging_area.csv",
            LogKind::Audit => "approved_changes.csv",
            LogKind::Rollback => "rollback_log.csv",
        }
    }

    /// Status every row of this table carries.
    pub fn status(self) -> UploadStatus {
        match self {
            LogKind::Staging => UploadStatus::Pending,
            LogKind::Audit => UploadStatus::Approved,
            LogKind::Rollback => UploadStatus::RolledBack,
        }
    }

    /// Position in the lifecycle; later tables win when a record shows up twice.
    pub fn rank(self) -> u8 {
        match self {
            LogKind::Staging => 0,
            LogKind::Audit => 1,
            LogKind::Rollback => 2,
        }
    }
}

impl Display for LogKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LogKind::Staging => write!(f, "staging"),
            LogKind::Audit => write!(f, "audit"),
            LogKind::Rollback => write!(f, "rollback"),
        }
    }
}

/// The unit of work: one uploaded file and its review state.
///
/// Only `status` changes after creation, and only through
/// [`UploadRecord::transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub upload_id: Uuid,
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    #[serde(alias = "sha256")]
    pub content_hash: String,
    #[serde(alias = "prop_id")]
    pub property_id: String,
    pub status: UploadStatus,
    #[serde(alias = "file_path")]
    pub storage_path: String,
}

impl UploadRecord {
    /// Move the record to `next`, refusing anything outside the lifecycle.
    pub fn transition(mut self, next: UploadStatus) -> Result<Self, SyncError> {
        if !self.status.can_transition_to(next) {
            return Err(SyncError::InvalidInput(format!(
                "Upload {} cannot move from {} to {}",
                self.upload_id, self.status, next
            )));
        }
        self.status = next;
        Ok(self)
    }

    /// Copy without the storage location.
    pub fn view(&self) -> RecordView {
        RecordView {
            upload_id: self.upload_id,
            timestamp: self.timestamp,
            filename: self.filename.clone(),
            content_hash: self.content_hash.clone(),
            property_id: self.property_id.clone(),
            status: self.status,
        }
    }
}

/// An upload record with its storage path stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub upload_id: Uuid,
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub content_hash: String,
    pub property_id: String,
    pub status: UploadStatus,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskFlag {
    #[default]
    None,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskReason {
    MissingIdentifier,
    UndecodableContent,
}

/// Result of staging or ingesting a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedUpload {
    pub record: UploadRecord,
    pub risk: RiskFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_reason: Option<RiskReason>,
}

impl StagedUpload {
    pub fn new(record: UploadRecord, risk_reason: Option<RiskReason>) -> Self {
        let risk = if risk_reason.is_some() {
            RiskFlag::High
        } else {
            RiskFlag::None
        };
        Self {
            record,
            risk,
            risk_reason,
        }
    }
}

/// ISO-8601 timestamps.
///
/// Written as RFC 3339 in UTC. Naive timestamps (no offset) are read as UTC.
pub mod iso_timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        let raw = raw.trim();
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
            Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                .map(|naive| naive.and_utc())
                .map_err(|_| rfc_err),
        }
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}
