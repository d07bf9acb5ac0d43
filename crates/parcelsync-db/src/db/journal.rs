//! Append-only transition journal (`transitions.jsonl`).
//!
//! One JSON object per line. Lines are only ever appended; a line torn by a
//! crash is skipped on read and fenced off by [`Journal::repair_tail`].

use std::io;
use std::path::{Path, PathBuf};

use parcelsync_core::models::TransitionEvent;
use parcelsync_core::SyncError;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const JOURNAL_FILE: &str = "transitions.jsonl";

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and flush it to disk.
    pub async fn append(&self, event: &TransitionEvent) -> Result<(), SyncError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Every readable event in append order.
    pub async fn read_all(&self) -> Result<Vec<TransitionEvent>, SyncError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TransitionEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping unreadable journal line"
                    );
                }
            }
        }
        Ok(events)
    }

    /// Terminate a torn final line so the next append starts on a fresh one.
    ///
    /// Returns `true` if a newline had to be added.
    pub async fn repair_tail(&self) -> Result<bool, SyncError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() || bytes.ends_with(b"\n") {
            return Ok(false);
        }

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(b"\n").await?;
        file.sync_data().await?;
        tracing::warn!(path = %self.path.display(), "Fenced off torn journal line");
        Ok(true)
    }
}
