//! Canonical serialization and hashing.
//!
//! Any structured value that implements [`serde::Serialize`] can be turned
//! into a canonical byte string: object keys in lexicographic order, arrays
//! in insertion order, primitives encoded exactly as standard JSON encodes
//! them. Two semantically equal structures always yield identical bytes.
//! SHA-256 is the mandated digest for every hash derived from canonical
//! bytes in this workspace.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Errors produced while canonicalizing a value.
#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    /// The value could not be serialized to JSON.
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` to its canonical byte representation.
///
/// `serde_json::Value`'s default map representation is a `BTreeMap`, so
/// object keys come out in lexicographic order without any extra sorting
/// pass; arrays preserve the order the caller built them in.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}

/// Serialize `value` to its canonical string representation.
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String, CanonError> {
    let bytes = canonical_bytes(value)?;
    // `serde_json::to_vec` always produces valid UTF-8.
    Ok(String::from_utf8(bytes).expect("canonical JSON is valid UTF-8"))
}

/// SHA-256 of the canonical byte representation of `value`, as lowercase hex.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<String, CanonError> {
    let bytes = canonical_bytes(value)?;
    Ok(hex_digest(&bytes))
}

/// SHA-256 of raw bytes, as lowercase hex. Used for content hashes computed
/// directly from file bytes (e.g. the policy hash) rather than from a
/// serializable structure.
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
