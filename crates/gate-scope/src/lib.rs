//! Scope elevation policy and the human-approval token store bridge.
//!
//! A matched rule's [`Scope`] decides whether a token may be auto-issued or
//! must be backed by a human-approved token fetched from a
//! [`TokenStore`]. The kernel still runs all seven verification steps on a
//! stored token exactly as it would on a freshly issued one; the store
//! only changes where the token came from.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use gate_core::{GateMode, Scope, VerifiedToken};
use gate_error::{ErrorCode, GateError};

/// What a matched rule's scope permits, given the current gate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    /// The token may be issued automatically.
    AutoIssue,
    /// A human-approved token must be retrieved from the [`TokenStore`].
    RequireApproval,
    /// Blocked outright; never auto-issued regardless of mode.
    Stop,
}

/// Decide how `scope` should be treated under `gate_mode`.
///
/// `safe` always auto-issues. `net` and `fs` always require a
/// human-approved token. `admin` is blocked outright (`SCOPE_ELEVATION_STOP`)
/// under `STRICT`; under `PERMISSIVE` it still requires human approval
/// rather than ever auto-issuing.
pub fn evaluate_scope(scope: Scope, gate_mode: GateMode) -> ScopeDecision {
    match (scope, gate_mode) {
        (Scope::Safe, _) => ScopeDecision::AutoIssue,
        (Scope::Net | Scope::Fs, _) => ScopeDecision::RequireApproval,
        (Scope::Admin, GateMode::Strict) => ScopeDecision::Stop,
        (Scope::Admin, GateMode::Permissive) => ScopeDecision::RequireApproval,
    }
}

/// Convert a [`ScopeDecision::Stop`] into its typed denial.
pub fn stop_error(scope: Scope) -> GateError {
    GateError::new(
        ErrorCode::ScopeElevationStop,
        format!("scope {scope:?} may never be auto-issued under STRICT"),
    )
}

/// Convert a [`ScopeDecision::RequireApproval`] into its typed denial, for
/// callers that have no stored token to hand the kernel.
pub fn hold_error(scope: Scope) -> GateError {
    GateError::new(
        ErrorCode::ScopeElevationHold,
        format!("scope {scope:?} requires a human-approved token"),
    )
}

/// Backend-agnostic human-approval token hand-off.
pub trait TokenStore {
    /// Persist `token` under `proposal_hash`.
    fn store(&self, proposal_hash: &str, token: &VerifiedToken) -> Result<(), GateError>;
    /// Retrieve the token stored under `proposal_hash`, if any.
    ///
    /// An expired entry is treated as absent and purged.
    fn retrieve(&self, proposal_hash: &str) -> Result<Option<VerifiedToken>, GateError>;
    /// Remove any token stored under `proposal_hash`.
    fn delete(&self, proposal_hash: &str) -> Result<(), GateError>;
    /// `true` if a (possibly expired) token is stored under `proposal_hash`.
    fn has(&self, proposal_hash: &str) -> Result<bool, GateError>;
}

/// A [`TokenStore`] backed by one JSON file per proposal hash.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// Root every stored token under `dir`, creating it if necessary.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, proposal_hash: &str) -> PathBuf {
        self.dir.join(format!("{proposal_hash}.json"))
    }
}

impl TokenStore for FileTokenStore {
    fn store(&self, proposal_hash: &str, token: &VerifiedToken) -> Result<(), GateError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            GateError::new(ErrorCode::ValidationError, "failed to create token store directory")
                .with_source(e)
        })?;
        let json = serde_json::to_string(token).map_err(|e| {
            GateError::new(ErrorCode::ValidationError, "failed to serialize stored token").with_source(e)
        })?;
        std::fs::write(self.path_for(proposal_hash), json).map_err(|e| {
            GateError::new(ErrorCode::ValidationError, "failed to write stored token").with_source(e)
        })
    }

    fn retrieve(&self, proposal_hash: &str) -> Result<Option<VerifiedToken>, GateError> {
        let path = self.path_for(proposal_hash);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GateError::new(ErrorCode::ValidationError, "failed to read stored token")
                    .with_source(e))
            }
        };
        let token: VerifiedToken = serde_json::from_str(&content).map_err(|e| {
            GateError::new(ErrorCode::ValidationError, "stored token is malformed").with_source(e)
        })?;
        if token.payload.expires_at < chrono::Utc::now().timestamp_millis() {
            let _ = self.delete(proposal_hash);
            return Ok(None);
        }
        Ok(Some(token))
    }

    fn delete(&self, proposal_hash: &str) -> Result<(), GateError> {
        match std::fs::remove_file(self.path_for(proposal_hash)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GateError::new(ErrorCode::ValidationError, "failed to delete stored token")
                .with_source(e)),
        }
    }

    fn has(&self, proposal_hash: &str) -> Result<bool, GateError> {
        Ok(self.path_for(proposal_hash).exists())
    }
}
