//! Configuration module
//!
//! Settings for the storage root, the log directory, I/O bounds, review
//! policy and the static role table. Everything is read once at startup and
//! handed to the components that own the directories.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hooks::Role;
use crate::storage_types::StorageBackend;

const IO_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_MB: usize = 50;
const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Storage root; owns `logs/` and `uploads/` unless overridden
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub storage_backend: StorageBackend,
    pub io_timeout: Duration,
    pub require_diff_before_approve: bool,
    pub max_upload_bytes: usize,
    /// user id -> role, for the static permission checker
    pub users: BTreeMap<String, Role>,
    pub system_of_record_path: Option<PathBuf>,
    pub default_user: Option<String>,
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self {
            environment: "development".to_string(),
            log_dir: data_dir.join("logs"),
            upload_dir: data_dir.join("uploads"),
            data_dir,
            storage_backend: StorageBackend::Local,
            io_timeout: Duration::from_secs(IO_TIMEOUT_SECS),
            require_diff_before_approve: false,
            max_upload_bytes: MAX_UPLOAD_MB * 1024 * 1024,
            users: BTreeMap::new(),
            system_of_record_path: None,
            default_user: None,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("PARCELSYNC_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut config = Self::for_data_dir(data_dir);

        config.environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        if let Some(dir) = lookup("PARCELSYNC_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PARCELSYNC_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }

        if let Some(backend) = lookup("STORAGE_BACKEND") {
            config.storage_backend = backend.parse()?;
        }

        let io_timeout_secs = lookup("PARCELSYNC_IO_TIMEOUT_SECS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("PARCELSYNC_IO_TIMEOUT_SECS must be an integer: {}", e))?
            .unwrap_or(IO_TIMEOUT_SECS);
        config.io_timeout = Duration::from_secs(io_timeout_secs);

        config.require_diff_before_approve = lookup("PARCELSYNC_REQUIRE_DIFF_BEFORE_APPROVE")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let max_upload_mb = lookup("PARCELSYNC_MAX_UPLOAD_MB")
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("PARCELSYNC_MAX_UPLOAD_MB must be an integer: {}", e))?
            .unwrap_or(MAX_UPLOAD_MB);
        config.max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                anyhow::anyhow!("PARCELSYNC_MAX_UPLOAD_MB is too large: {}", max_upload_mb)
            })?;

        if let Some(users) = lookup("PARCELSYNC_USERS") {
            config.users = parse_users(&users)?;
        }

        config.system_of_record_path = lookup("PARCELSYNC_SYSTEM_OF_RECORD").map(PathBuf::from);
        config.default_user = lookup("PARCELSYNC_USER").filter(|u| !u.trim().is_empty());

        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.io_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "PARCELSYNC_IO_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("PARCELSYNC_MAX_UPLOAD_MB must be greater than zero"));
        }

        if self.is_production() && self.users.is_empty() {
            return Err(anyhow::anyhow!(
                "PARCELSYNC_USERS must define at least one user in production"
            ));
        }

        if self.is_production() && self.storage_backend == StorageBackend::Memory {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=memory does not survive restarts and is not allowed in production"
            ));
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse `alice:admin,bob:uploader`.
fn parse_users(value: &str) -> Result<BTreeMap<String, Role>, anyhow::Error> {
    let mut users = BTreeMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (user, role) = entry
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("PARCELSYNC_USERS entry '{}' must be user:role", entry))?;
        let user = user.trim();
        if user.is_empty() {
            return Err(anyhow::anyhow!("PARCELSYNC_USERS entry '{}' has no user", entry));
        }
        users.insert(user.to_string(), role.parse()?);
    }
    Ok(users)
}
