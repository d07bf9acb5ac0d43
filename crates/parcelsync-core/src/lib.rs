//! Parcelsync Core Library
//!
//! This crate provides the domain models, error types, configuration, content
//! hashing, identifier extraction and collaborator traits that are shared
//! across all Parcelsync components.

pub mod config;
pub mod error;
pub mod extractor;
pub mod hashing;
pub mod hooks;
pub mod models;
pub mod storage_types;
pub mod timeout;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorMetadata, LogLevel, SyncError, SyncResult};
pub use extractor::{
    is_identifier_label, normalize_key, parse_fields, ChainExtractor, Extraction,
    IdentifierExtractor, LineMarkerExtractor, XmlTagExtractor, UNKNOWN_PROPERTY_ID,
};
pub use hashing::{content_hash, is_content_hash};
pub use hooks::{Action, AllowAll, Decision, PermissionChecker, Role, SystemOfRecord, User};
pub use storage_types::StorageBackend;
pub use timeout::bounded;
