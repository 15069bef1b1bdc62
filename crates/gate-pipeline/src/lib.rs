//! Authority pipeline: builds a canonical proposal, computes environment
//! and policy fingerprints, evaluates policy, and issues a signed,
//! time-bound token.
//!
//! The pipeline is total and never throws: any unexpected failure during
//! proposal construction, fingerprinting, or signing is converted to a
//! `STOP` outcome carrying a `PIPELINE_ERROR` reason, with an audit record
//! appended the same as any other `STOP`. Key material generated during
//! issuance never leaves this call.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::Path;

use gate_core::{
    CanonicalProposal, Decision, EnvironmentProfile, GateMode, TokenConstraints, TokenPayload,
    TokenScope, VerifiedToken,
};
use gate_id::GateId;
use gate_registry::{LogRecord, TokenRegistry};

/// Default token time-to-live: five minutes.
pub const DEFAULT_TOKEN_TTL_MILLIS: i64 = 5 * 60 * 1_000;

/// Terminal verdict of one pipeline call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A token with `decision = ALLOW` was issued.
    Allow,
    /// A token with `decision = HOLD` was issued.
    Hold,
    /// No token was issued; the request stops at the gate.
    Stop,
}

/// Everything the pipeline needs to evaluate one request.
pub struct PipelineRequest<'a> {
    /// Bare executable name.
    pub command: &'a str,
    /// Ordered argument vector.
    pub args: &'a [String],
    /// Resource locator for the policy document.
    pub policy_path: &'a Path,
    /// Gate mode controlling how a policy miss is treated.
    pub gate_mode: GateMode,
    /// Explicit opt-in to allow a `PERMISSIVE` miss through with an audit
    /// trail instead of holding it for approval.
    pub allow_with_audit: bool,
    /// Implementation identity attached to proposals and tokens.
    pub guard_version: &'a str,
}

/// Result of one authority-pipeline call.
pub struct PipelineOutcome {
    /// Terminal verdict.
    pub decision: Verdict,
    /// Canonical hash of the built proposal.
    pub proposal_hash: String,
    /// Human-readable reason for the verdict.
    pub reason: String,
    /// Issued token, present for `Allow` and `Hold`.
    pub token: Option<VerifiedToken>,
    /// The canonical proposal that was built, present whenever a token was
    /// issued.
    pub proposal: Option<CanonicalProposal>,
    /// Fingerprint of the environment this outcome was computed against.
    pub environment_fingerprint: String,
}

/// Compute the environment fingerprint for `policy_path`'s current
/// `policy_hash`, over the configured host-identity profile.
pub fn environment_fingerprint(policy_hash: &str) -> Result<String, gate_canon::CanonError> {
    let profile = EnvironmentProfile::from_host(policy_hash);
    gate_canon::canonical_hash(&profile)
}

/// Internal failure surfaced while building or signing a proposal/token.
/// Always absorbed into a `STOP` outcome by [`run`]; never propagated to
/// callers.
#[derive(Debug)]
enum PipelineBuildError {
    Canon(gate_canon::CanonError),
    Sign(gate_error::GateError),
}

impl std::fmt::Display for PipelineBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canon(e) => write!(f, "{e}"),
            Self::Sign(e) => write!(f, "{e}"),
        }
    }
}

impl From<gate_canon::CanonError> for PipelineBuildError {
    fn from(e: gate_canon::CanonError) -> Self {
        Self::Canon(e)
    }
}

impl From<gate_error::GateError> for PipelineBuildError {
    fn from(e: gate_error::GateError) -> Self {
        Self::Sign(e)
    }
}

/// Run the authority pipeline for one request.
///
/// `registry` receives the audit record for `STOP` and `TOKEN_ISSUED_*`
/// events; token issuance itself is recorded here, not by the kernel (the
/// kernel separately calls `mark_used` once a token is presented and
/// passes verification).
pub fn run(request: PipelineRequest<'_>, registry: &TokenRegistry) -> PipelineOutcome {
    match run_inner(&request) {
        Ok(outcome) => {
            registry.append_audit(issuance_log_record(&outcome));
            outcome
        }
        Err(err) => {
            let outcome = PipelineOutcome {
                decision: Verdict::Stop,
                proposal_hash: String::new(),
                reason: format!("pipeline_error: {err}"),
                token: None,
                proposal: None,
                environment_fingerprint: String::new(),
            };
            registry.append_audit(issuance_log_record(&outcome));
            outcome
        }
    }
}

fn run_inner(request: &PipelineRequest<'_>) -> Result<PipelineOutcome, PipelineBuildError> {
    let now = chrono::Utc::now();
    let policy_hash = gate_policy::hash_policy_file(request.policy_path);

    let proposal = CanonicalProposal::build(
        request.command,
        request.args,
        request.policy_path.display().to_string(),
        &policy_hash,
        request.guard_version,
        now.timestamp(),
    );
    let proposal_hash = gate_canon::canonical_hash(&proposal)?;
    let environment_fingerprint = environment_fingerprint(&policy_hash)?;

    let evaluation = gate_policy::evaluate_at_path(request.command, request.args, request.policy_path);

    let (verdict, decision, audited_permit, reason) = match (evaluation.allowed, request.gate_mode, request.allow_with_audit) {
        (true, _, _) => (Verdict::Allow, Decision::Allow, None, evaluation.reason),
        (false, GateMode::Strict, _) => {
            return Ok(PipelineOutcome {
                decision: Verdict::Stop,
                proposal_hash,
                reason: evaluation.reason,
                token: None,
                proposal: Some(proposal),
                environment_fingerprint,
            });
        }
        (false, GateMode::Permissive, false) => (Verdict::Hold, Decision::Hold, None, evaluation.reason),
        (false, GateMode::Permissive, true) => (
            Verdict::Allow,
            Decision::Allow,
            Some(true),
            "AUDITED_PERMIT".to_string(),
        ),
    };

    let issued_at = now.timestamp_millis();
    let payload = TokenPayload {
        token_id: GateId::new().as_str(),
        audit_ref: GateId::new().as_str(),
        proposal_hash: proposal_hash.clone(),
        policy_hash: policy_hash.clone(),
        environment_fingerprint: environment_fingerprint.clone(),
        decision,
        issued_at,
        expires_at: issued_at + DEFAULT_TOKEN_TTL_MILLIS,
        scope: TokenScope {
            action: "spawn".to_string(),
            resource: request.command.to_string(),
            constraints: TokenConstraints {
                policy_version: policy_hash,
                gate_mode: request.gate_mode,
                guard_version: request.guard_version.to_string(),
                audited_permit,
            },
        },
        gate_mode: request.gate_mode,
    };

    let signing_key = gate_token::generate_keypair();
    let token = gate_token::sign(payload, &signing_key)?;

    Ok(PipelineOutcome {
        decision: verdict,
        proposal_hash,
        reason,
        token: Some(token),
        proposal: Some(proposal),
        environment_fingerprint,
    })
}

fn issuance_log_record(outcome: &PipelineOutcome) -> LogRecord {
    let decision_str = match outcome.decision {
        Verdict::Allow => "TOKEN_ISSUED_ALLOW",
        Verdict::Hold => "TOKEN_ISSUED_HOLD",
        Verdict::Stop => "STOP",
    };
    LogRecord {
        decision: decision_str.to_string(),
        proposal_hash: if outcome.proposal_hash.is_empty() {
            None
        } else {
            Some(outcome.proposal_hash.clone())
        },
        token_id: outcome.token.as_ref().map(|t| t.payload.token_id.clone()),
        policy_hash: outcome.token.as_ref().map(|t| t.payload.policy_hash.clone()),
        environment_fingerprint: if outcome.environment_fingerprint.is_empty() {
            None
        } else {
            Some(outcome.environment_fingerprint.clone())
        },
        reason: outcome.reason.clone(),
        executed: false,
        error_type: None,
        time: chrono::Utc::now().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_policy(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("policy.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn registry(dir: &std::path::Path) -> TokenRegistry {
        TokenRegistry::init(dir, "test", 0)
    }

    #[test]
    fn allow_path_issues_an_allow_token() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = write_policy(
            dir.path(),
            "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
        );
        let reg = registry(dir.path());
        let outcome = run(
            PipelineRequest {
                command: "echo",
                args: &["t1".to_string()],
                policy_path: &policy_path,
                gate_mode: GateMode::Strict,
                allow_with_audit: false,
                guard_version: "v1",
            },
            &reg,
        );
        assert_eq!(outcome.decision, Verdict::Allow);
        let token = outcome.token.unwrap();
        assert_eq!(token.payload.decision, Decision::Allow);
    }

    #[test]
    fn strict_miss_stops_with_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = write_policy(
            dir.path(),
            "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
        );
        let reg = registry(dir.path());
        let outcome = run(
            PipelineRequest {
                command: "rm",
                args: &["-rf".to_string(), "/".to_string()],
                policy_path: &policy_path,
                gate_mode: GateMode::Strict,
                allow_with_audit: false,
                guard_version: "v1",
            },
            &reg,
        );
        assert_eq!(outcome.decision, Verdict::Stop);
        assert!(outcome.token.is_none());
    }

    #[test]
    fn permissive_miss_issues_a_hold_token() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = write_policy(
            dir.path(),
            "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
        );
        let reg = registry(dir.path());
        let outcome = run(
            PipelineRequest {
                command: "rm",
                args: &["-rf".to_string(), "/".to_string()],
                policy_path: &policy_path,
                gate_mode: GateMode::Permissive,
                allow_with_audit: false,
                guard_version: "v1",
            },
            &reg,
        );
        assert_eq!(outcome.decision, Verdict::Hold);
        assert_eq!(outcome.token.unwrap().payload.decision, Decision::Hold);
    }

    #[test]
    fn permissive_miss_with_audit_opt_in_issues_an_audited_allow() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = write_policy(dir.path(), "default = \"DENY\"\n");
        let reg = registry(dir.path());
        let outcome = run(
            PipelineRequest {
                command: "true",
                args: &[],
                policy_path: &policy_path,
                gate_mode: GateMode::Permissive,
                allow_with_audit: true,
                guard_version: "v1",
            },
            &reg,
        );
        assert_eq!(outcome.decision, Verdict::Allow);
        let token = outcome.token.unwrap();
        assert_eq!(token.payload.scope.constraints.audited_permit, Some(true));
    }

    #[test]
    fn missing_policy_fails_closed_to_stop_under_strict() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.toml");
        let reg = registry(dir.path());
        let outcome = run(
            PipelineRequest {
                command: "echo",
                args: &[],
                policy_path: &missing,
                gate_mode: GateMode::Strict,
                allow_with_audit: false,
                guard_version: "v1",
            },
            &reg,
        );
        assert_eq!(outcome.decision, Verdict::Stop);
    }

    #[test]
    fn same_inputs_within_a_minute_produce_the_same_proposal_hash() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = write_policy(
            dir.path(),
            "default = \"DENY\"\n[[rules]]\ncommand = \"echo\"\nargs = [\"*\"]\n",
        );
        let reg = registry(dir.path());
        let req = || PipelineRequest {
            command: "echo",
            args: &["t1".to_string()],
            policy_path: &policy_path,
            gate_mode: GateMode::Strict,
            allow_with_audit: false,
            guard_version: "v1",
        };
        let a = run(req(), &reg);
        let b = run(req(), &reg);
        assert_eq!(a.proposal_hash, b.proposal_hash);
    }
}
