//! Replay-prevention token registry and append-only audit sink.
//!
//! The registry holds a process-local set of used token identifiers plus
//! two line-structured disk streams: `used_tokens.<stream>` (one record per
//! token the kernel has marked used) and `log.<stream>` (one record per
//! decision event, including STOP and pipeline errors that never reach a
//! token). The in-memory set is authoritative for replay decisions within
//! the current process; disk persistence is best-effort and failures there
//! never unblock replay.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// One record written to `used_tokens.<stream>` when a token is marked used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsedTokenRecord {
    /// Identifier of the token that was used.
    pub token_id: String,
    /// Unix-epoch milliseconds when the token was marked used.
    pub used_at: i64,
    /// Unix-epoch milliseconds after which the token would have expired.
    pub expires_at: i64,
    /// Identifier of the corresponding audit record.
    pub audit_ref: String,
    /// Canonical hash of the authorized proposal.
    pub proposal_hash: String,
    /// Content hash of the policy the token was bound to.
    pub policy_hash: String,
    /// Environment fingerprint the token was bound to.
    pub env_fingerprint: String,
    /// Command the token authorized.
    pub command: String,
    /// Scope recorded on the token, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Implementation identity of the issuing gate.
    pub guard_version: String,
}

/// One record written to `log.<stream>` for every decision event: `STOP`,
/// `HOLD` without a token, `TOKEN_ISSUED_*`, `PIPELINE_ERROR`, and
/// kernel-emitted verification outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// The decision this event pertains to.
    pub decision: String,
    /// Canonical hash of the proposal, if one was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_hash: Option<String>,
    /// Token identifier, if a token was issued or presented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Policy hash in force, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
    /// Environment fingerprint in force, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_fingerprint: Option<String>,
    /// Human-readable reason.
    pub reason: String,
    /// `true` if the spawn primitive was invoked for this event.
    pub executed: bool,
    /// Typed denial code, if this event was a kernel denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Unix-epoch milliseconds when this event occurred.
    pub time: i64,
}

/// Process-local replay-prevention registry and audit sink.
pub struct TokenRegistry {
    used: Mutex<HashSet<String>>,
    audit_dir: PathBuf,
    stream: String,
}

impl TokenRegistry {
    /// Initialize a registry rooted at `audit_dir`, using `stream` as the
    /// audit stream name. If a `used_tokens.<stream>` file already exists,
    /// hydrate the in-memory set from it, dropping entries whose
    /// `expires_at` is in the past. A malformed final line (e.g. a
    /// truncated write) is tolerated and ignored; disk contents are never
    /// rewritten.
    pub fn init(audit_dir: impl Into<PathBuf>, stream: impl Into<String>, now_unix_millis: i64) -> Self {
        let audit_dir = audit_dir.into();
        let stream = stream.into();
        let mut used = HashSet::new();

        if let Ok(content) = std::fs::read_to_string(Self::used_tokens_path_for(&audit_dir, &stream)) {
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<UsedTokenRecord>(line) {
                    Ok(record) if record.expires_at >= now_unix_millis => {
                        used.insert(record.token_id);
                    }
                    Ok(_) => {}
                    Err(_) => {
                        tracing::warn!("skipping malformed used-token record during hydration");
                    }
                }
            }
        }

        Self {
            used: Mutex::new(used),
            audit_dir,
            stream,
        }
    }

    fn used_tokens_path_for(audit_dir: &Path, stream: &str) -> PathBuf {
        audit_dir.join(format!("used_tokens.{stream}"))
    }

    fn log_path(&self) -> PathBuf {
        self.audit_dir.join(format!("log.{}", self.stream))
    }

    /// `true` if `token_id` has already been marked used in this process.
    pub fn is_used(&self, token_id: &str) -> bool {
        self.used.lock().expect("registry mutex poisoned").contains(token_id)
    }

    /// Mark `token_id` used and best-effort persist `record`.
    ///
    /// The in-memory set is updated first and unconditionally; disk
    /// persistence failures are logged and swallowed so they can never
    /// unblock replay protection.
    pub fn mark_used(&self, token_id: &str, record: UsedTokenRecord) {
        self.used
            .lock()
            .expect("registry mutex poisoned")
            .insert(token_id.to_string());
        if let Err(err) = self.append_line(
            &Self::used_tokens_path_for(&self.audit_dir, &self.stream),
            &record,
        ) {
            tracing::warn!(error = %err, "failed to persist used-token record");
        }
    }

    /// Append a non-token decision event to the log stream. Best-effort:
    /// failures are logged and swallowed.
    pub fn append_audit(&self, record: LogRecord) {
        if let Err(err) = self.append_line(&self.log_path(), &record) {
            tracing::warn!(error = %err, "failed to append audit record");
        }
    }

    fn append_line<T: Serialize>(&self, path: &Path, record: &T) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_used_record(token_id: &str, expires_at: i64) -> UsedTokenRecord {
        UsedTokenRecord {
            token_id: token_id.to_string(),
            used_at: 1_000,
            expires_at,
            audit_ref: "a1".to_string(),
            proposal_hash: "ph".to_string(),
            policy_hash: "polh".to_string(),
            env_fingerprint: "ef".to_string(),
            command: "echo".to_string(),
            scope: Some("safe".to_string()),
            guard_version: "v1".to_string(),
        }
    }

    #[test]
    fn fresh_registry_reports_unused() {
        let dir = tempfile::tempdir().unwrap();
        let reg = TokenRegistry::init(dir.path(), "test", 0);
        assert!(!reg.is_used("t1"));
    }

    #[test]
    fn mark_used_is_visible_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let reg = TokenRegistry::init(dir.path(), "test", 0);
        reg.mark_used("t1", sample_used_record("t1", 2_000));
        assert!(reg.is_used("t1"));
    }

    #[test]
    fn hydration_retains_unexpired_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let reg = TokenRegistry::init(dir.path(), "test", 0);
            reg.mark_used("live", sample_used_record("live", 10_000));
            reg.mark_used("dead", sample_used_record("dead", 1_000));
        }
        let rehydrated = TokenRegistry::init(dir.path(), "test", 5_000);
        assert!(rehydrated.is_used("live"));
        assert!(!rehydrated.is_used("dead"));
    }

    #[test]
    fn hydration_tolerates_a_truncated_final_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used_tokens.test");
        std::fs::write(&path, "{\"token_id\":\"t1\"").unwrap();
        let reg = TokenRegistry::init(dir.path(), "test", 0);
        assert!(!reg.is_used("t1"));
    }

    #[test]
    fn append_audit_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let reg = TokenRegistry::init(dir.path(), "test", 0);
        reg.append_audit(LogRecord {
            decision: "STOP".to_string(),
            proposal_hash: Some("ph".to_string()),
            token_id: None,
            policy_hash: None,
            environment_fingerprint: None,
            reason: "no rule matched".to_string(),
            executed: false,
            error_type: None,
            time: 1,
        });
        let content = std::fs::read_to_string(dir.path().join("log.test")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn audit_is_append_only_across_process_restarts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let reg = TokenRegistry::init(dir.path(), "test", 0);
            reg.mark_used("t1", sample_used_record("t1", 10_000));
        }
        {
            let reg = TokenRegistry::init(dir.path(), "test", 0);
            reg.mark_used("t2", sample_used_record("t2", 10_000));
        }
        let content = std::fs::read_to_string(dir.path().join("used_tokens.test")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
