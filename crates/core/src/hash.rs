//! Filesystem-safe backend keys.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const BACKEND_KEY_LEN: usize = 32;

/// Derive a backend key from an arbitrary name.
///
/// The result is lowercase hex, so it is always accepted as a filename
/// prefix regardless of what `name` contains.
pub fn derive_backend_key(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(BACKEND_KEY_LEN);
    key
}
