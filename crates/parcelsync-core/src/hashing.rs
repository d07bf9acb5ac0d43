//! Content fingerprinting.
//!
//! Uploaded bytes are identified by their SHA-256 digest, rendered as
//! lowercase hex. The digest is computed from the bytes we persist and is
//! never taken from caller input.

use sha2::{Digest, Sha256};

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the lowercase hex SHA-256 digest of `data`.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Whether `value` looks like a digest produced by [`content_hash`].
pub fn is_content_hash(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
