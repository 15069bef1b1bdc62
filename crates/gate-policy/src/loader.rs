use std::path::Path;

use gate_core::Policy;

/// Why policy loading failed. Always collapses to a `DENY` verdict at the
/// call site — this type exists for diagnostics, not for callers to branch
/// on permissively.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    /// The policy file does not exist or could not be read.
    #[error("policy file not readable at {path}: {source}")]
    NotReadable {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The policy file's contents did not parse as a valid document.
    #[error("policy file at {path} failed to parse: {source}")]
    Malformed {
        /// Path that was attempted.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Load and parse the policy document at `path`.
///
/// Any failure — missing file, parse error, missing/invalid `default`,
/// non-sequence `rules` — surfaces as a [`PolicyLoadError`]; the evaluator
/// in [`crate::matcher`] converts every variant into `DENY`.
pub fn load_policy(path: &Path) -> Result<Policy, PolicyLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| PolicyLoadError::NotReadable {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| PolicyLoadError::Malformed {
        path: path.display().to_string(),
        source,
    })
}

/// Content hash of the policy file's raw bytes, for binding into a
/// proposal or token.
///
/// Unlike [`load_policy`], this never fails: a missing file deterministically
/// hashes to the sentinel `"policy_not_found"`, and an unreadable file (e.g.
/// a permissions error) hashes to `"policy_read_error"`. Both sentinels are
/// themselves legitimate hash values that flow through the pipeline like any
/// other — a proposal built against a missing policy still has a
/// well-defined, reproducible `policy_hash`.
pub fn hash_policy_file(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => gate_canon::hex_digest(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "policy_not_found".to_string(),
        Err(_) => "policy_read_error".to_string(),
    }
}
