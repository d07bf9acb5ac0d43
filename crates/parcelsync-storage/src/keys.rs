//! Shared key generation for storage backends.
//!
//! Key format: `{YYYYmmddHHMMSS}_{upload_id}_{sanitized filename}`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;

/// Generate the storage key for an upload.
///
/// The timestamp prefix keeps keys sortable by arrival; the upload id keeps
/// two uploads of the same file in the same second apart.
pub fn generate_storage_key(upload_id: Uuid, filename: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        at.format("%Y%m%d%H%M%S"),
        upload_id,
        sanitize_filename(filename)
    )
}

/// Reduce a caller-supplied filename to a safe single path segment.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let truncated: String = cleaned.chars().take(MAX_NAME_LEN).collect();
    if truncated.is_empty() {
        "upload".to_string()
    } else {
        truncated
    }
}
