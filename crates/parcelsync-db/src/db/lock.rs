//! Exclusive advisory lock on a log directory.
//!
//! Two processes writing the same CSV tables would lose updates even with
//! atomic renames, so a store holds `.lock` for as long as it is open.
//! Uses `fs2` (flock on Unix, LockFileEx on Windows).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parcelsync_core::SyncError;

pub const LOCK_FILE: &str = ".lock";

/// Held for the lifetime of a `LogStore`, released on drop.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Take the lock without blocking.
    pub fn acquire(log_dir: &Path) -> Result<Self, SyncError> {
        let path = log_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                SyncError::StorageFailure(format!(
                    "Failed to open lock file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        if FileExt::try_lock_exclusive(&file).is_err() {
            let holder = read_pid(&mut file);
            return Err(SyncError::StorageFailure(match holder {
                Some(pid) => format!(
                    "Log directory {} is in use by process {}",
                    log_dir.display(),
                    pid
                ),
                None => format!("Log directory {} is in use", log_dir.display()),
            }));
        }

        let pid = std::process::id();
        let stamp = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| writeln!(file, "{}", pid))
            .and_then(|_| file.sync_all());
        if let Err(e) = stamp {
            tracing::warn!(path = %path.display(), error = %e, "Could not record pid in lock file");
        }

        tracing::debug!(path = %path.display(), pid, "Acquired log directory lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock");
        }
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}
