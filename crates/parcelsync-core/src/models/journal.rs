//! Transition events: the append-only history behind the log tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::upload::{iso_timestamp, UploadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Created in staging as PENDING
    Staged,
    /// Created directly in the audit table as APPROVED
    Ingested,
    Approved,
    RolledBack,
    /// A reviewer retrieved the diff; no status change
    DiffViewed,
}

impl Display for TransitionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransitionKind::Staged => write!(f, "staged"),
            TransitionKind::Ingested => write!(f, "ingested"),
            TransitionKind::Approved => write!(f, "approved"),
            TransitionKind::RolledBack => write!(f, "rolled_back"),
            TransitionKind::DiffViewed => write!(f, "diff_viewed"),
        }
    }
}

/// One line of the transition journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub event_id: Uuid,
    pub upload_id: Uuid,
    pub kind: TransitionKind,
    pub from_status: Option<UploadStatus>,
    pub to_status: Option<UploadStatus>,
    pub actor: String,
    #[serde(with = "iso_timestamp")]
    pub at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(
        upload_id: Uuid,
        kind: TransitionKind,
        from_status: Option<UploadStatus>,
        to_status: Option<UploadStatus>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            upload_id,
            kind,
            from_status,
            to_status,
            actor: actor.into(),
            at: Utc::now(),
        }
    }

    /// Creation event for a record born with `status`.
    pub fn created(upload_id: Uuid, status: UploadStatus, actor: impl Into<String>) -> Self {
        let kind = match status {
            UploadStatus::Approved => TransitionKind::Ingested,
            _ => TransitionKind::Staged,
        };
        Self::new(upload_id, kind, None, Some(status), actor)
    }

    /// Status change event.
    pub fn moved(
        upload_id: Uuid,
        from: UploadStatus,
        to: UploadStatus,
        actor: impl Into<String>,
    ) -> Self {
        let kind = match to {
            UploadStatus::RolledBack => TransitionKind::RolledBack,
            _ => TransitionKind::Approved,
        };
        Self::new(upload_id, kind, Some(from), Some(to), actor)
    }
}
