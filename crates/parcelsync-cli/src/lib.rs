//! Helpers shared by the `parcelsync` binary.

use std::env;
use std::path::Path;

use parcelsync_core::{Config, ErrorMetadata, LogLevel, SyncError, SyncResult, User};
use serde::Serialize;
use uuid::Uuid;

/// Default export file name.
pub const EXPORT_FILE: &str = "sync_import_log.csv";

/// Initialize tracing for CLI binaries.
///
/// Logs go to stderr so stdout carries only command output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Configuration from the environment, with `--data-dir` taking precedence.
pub fn load_config(data_dir: Option<&Path>) -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    let data_dir = data_dir.map(|d| d.to_string_lossy().to_string());
    Config::from_lookup(|key| match (key, &data_dir) {
        ("PARCELSYNC_DATA_DIR", Some(dir)) => Some(dir.clone()),
        _ => env::var(key).ok(),
    })
}

/// The acting user: `--user`, else `PARCELSYNC_USER`.
pub fn resolve_user(flag: Option<String>, config: &Config) -> SyncResult<User> {
    flag.or_else(|| config.default_user.clone())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(User::new)
        .ok_or_else(|| {
            SyncError::InvalidInput("No user given; pass --user or set PARCELSYNC_USER".to_string())
        })
}

pub fn parse_upload_id(raw: &str) -> SyncResult<Uuid> {
    Ok(Uuid::parse_str(raw.trim())?)
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub code: &'static str,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
    /// Full message and cause chain, omitted for sensitive errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorReport {
    pub fn from_error(err: &SyncError) -> Self {
        Self {
            error: err.client_message(),
            code: err.error_code(),
            error_type: err.error_type(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            details: (!err.is_sensitive()).then(|| err.detailed_message()),
        }
    }
}

/// Log a failed command at the level its error calls for.
///
/// The log line always carries the full cause chain, including for errors
/// whose details are kept out of the printed report.
pub fn log_error(err: &SyncError) {
    let details = err.detailed_message();
    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error_type = err.error_type(), code = err.error_code(), "{}", details)
        }
        LogLevel::Warn => {
            tracing::warn!(error_type = err.error_type(), code = err.error_code(), "{}", details)
        }
        LogLevel::Error => {
            tracing::error!(error_type = err.error_type(), code = err.error_code(), "{}", details)
        }
    }
}
