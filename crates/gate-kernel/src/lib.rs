//! The execution kernel: the *only* code path permitted to invoke the
//! process-spawn primitive.
//!
//! [`execute`] runs the seven verification steps in fixed order, each
//! computing or rejecting independently. On all seven passing it marks the
//! token used, emits an audit record, and spawns the child process exactly
//! once — command and argument vector passed directly to the OS, shell
//! interpretation disabled, standard streams inherited. No other module in
//! this workspace constructs a [`tokio::process::Command`]; that invariant
//! is enforced by discipline here and checked by the source-tree scanner
//! in `xtask`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::Path;

use gate_core::CanonicalProposal;
use gate_core::VerifiedToken;
use gate_error::{ErrorCode, GateError};
use gate_registry::{LogRecord, TokenRegistry, UsedTokenRecord};

/// Everything that can go wrong while executing a verified token.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// One of the seven verification steps failed.
    #[error(transparent)]
    Denied(#[from] GateError),
    /// All seven verifications passed but the OS failed to launch the
    /// child process (e.g. the executable does not exist). This is not a
    /// typed denial — the kernel cleared the request, the shell found no
    /// such process.
    #[error("failed to spawn {command}: {source}")]
    SpawnFailed {
        /// The command that could not be launched.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a verified, executed command.
pub struct KernelSuccess {
    /// The child process's exit code, or `-1` if it was terminated by a
    /// signal with no exit code.
    pub exit_code: i32,
    /// Identifier of the token that authorized this execution.
    pub token_id: String,
    /// Identifier of the audit record for this execution.
    pub audit_ref: String,
    /// Always `true` for a [`KernelSuccess`]; the spawn primitive was reached.
    pub executed: bool,
}

/// Run the seven-step verification chain against `token` and, if every
/// step passes, spawn `command` with `args`.
///
/// `proposal` must be the canonical proposal the caller currently holds —
/// not necessarily the one embedded in the token — so that step 4 can
/// detect tampering between issuance and presentation.
pub async fn execute(
    command: &str,
    args: &[String],
    proposal: &CanonicalProposal,
    token: &VerifiedToken,
    registry: &TokenRegistry,
) -> Result<KernelSuccess, KernelError> {
    let now = chrono::Utc::now().timestamp_millis();

    // Step 1: TTL.
    if !token.is_within_ttl(now) {
        return Err(deny(registry, token, ErrorCode::TokenExpired, "token TTL has elapsed"));
    }

    // Step 2: decision gate.
    if !token.is_allow() {
        return Err(deny(
            registry,
            token,
            ErrorCode::DecisionNotAllow,
            "presented token's decision is not ALLOW",
        ));
    }

    // Step 3: replay. Precedes all expensive operations below.
    if registry.is_used(&token.payload.token_id) {
        return Err(deny(registry, token, ErrorCode::TokenReplayed, "token_id already used"));
    }

    // Step 4: proposal binding.
    let recomputed_proposal_hash = gate_canon::canonical_hash(proposal).map_err(|e| {
        deny_with_source(registry, token, ErrorCode::ProposalHashMismatch, "failed to recompute proposal hash", e)
    })?;
    if recomputed_proposal_hash != token.payload.proposal_hash {
        return Err(deny(
            registry,
            token,
            ErrorCode::ProposalHashMismatch,
            "recomputed proposal hash disagrees with token binding",
        ));
    }

    // Step 5: policy binding.
    let recomputed_policy_hash = gate_policy::hash_policy_file(Path::new(&proposal.policy_path));
    if recomputed_policy_hash != token.payload.policy_hash {
        return Err(deny(
            registry,
            token,
            ErrorCode::PolicyHashMismatch,
            "policy content changed since issuance",
        ));
    }

    // Step 6: environment binding.
    let recomputed_env_fingerprint =
        gate_pipeline::environment_fingerprint(&recomputed_policy_hash).map_err(|e| {
            deny_with_source(
                registry,
                token,
                ErrorCode::EnvFingerprintMismatch,
                "failed to recompute environment fingerprint",
                e,
            )
        })?;
    if recomputed_env_fingerprint != token.payload.environment_fingerprint {
        return Err(deny(
            registry,
            token,
            ErrorCode::EnvFingerprintMismatch,
            "host/runtime identity changed since issuance",
        ));
    }

    // Step 7: signature.
    if let Err(e) = gate_token::verify(token) {
        return Err(deny(registry, token, e.code, "signature verification failed"));
    }

    // All seven passed. Mark used before spawn so replay is blocked even
    // if the spawn hangs or the process crashes.
    registry.mark_used(
        &token.payload.token_id,
        UsedTokenRecord {
            token_id: token.payload.token_id.clone(),
            used_at: now,
            expires_at: token.payload.expires_at,
            audit_ref: token.payload.audit_ref.clone(),
            proposal_hash: token.payload.proposal_hash.clone(),
            policy_hash: token.payload.policy_hash.clone(),
            env_fingerprint: token.payload.environment_fingerprint.clone(),
            command: command.to_string(),
            scope: Some(token.payload.scope.action.clone()),
            guard_version: token.payload.scope.constraints.guard_version.clone(),
        },
    );
    registry.append_audit(LogRecord {
        decision: "ALLOW".to_string(),
        proposal_hash: Some(token.payload.proposal_hash.clone()),
        token_id: Some(token.payload.token_id.clone()),
        policy_hash: Some(token.payload.policy_hash.clone()),
        environment_fingerprint: Some(token.payload.environment_fingerprint.clone()),
        reason: "verification chain passed".to_string(),
        executed: true,
        error_type: None,
        time: now,
    });

    let status = tokio::process::Command::new(command)
        .args(args)
        .status()
        .await
        .map_err(|source| KernelError::SpawnFailed {
            command: command.to_string(),
            source,
        })?;

    Ok(KernelSuccess {
        exit_code: status.code().unwrap_or(-1),
        token_id: token.payload.token_id.clone(),
        audit_ref: token.payload.audit_ref.clone(),
        executed: true,
    })
}

fn deny(registry: &TokenRegistry, token: &VerifiedToken, code: ErrorCode, message: &str) -> KernelError {
    let now = chrono::Utc::now().timestamp_millis();
    registry.append_audit(LogRecord {
        decision: token_decision_label(token),
        proposal_hash: Some(token.payload.proposal_hash.clone()),
        token_id: Some(token.payload.token_id.clone()),
        policy_hash: Some(token.payload.policy_hash.clone()),
        environment_fingerprint: Some(token.payload.environment_fingerprint.clone()),
        reason: message.to_string(),
        executed: false,
        error_type: Some(code.as_str().to_string()),
        time: now,
    });
    KernelError::Denied(GateError::new(code, message.to_string()))
}

fn deny_with_source(
    registry: &TokenRegistry,
    token: &VerifiedToken,
    code: ErrorCode,
    message: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> KernelError {
    match deny(registry, token, code, message) {
        KernelError::Denied(e) => KernelError::Denied(e.with_source(source)),
        other => other,
    }
}

fn token_decision_label(token: &VerifiedToken) -> String {
    format!("{:?}", token.payload.decision).to_uppercase()
}
