//! Pre-validation adapter: shell-string rejection and canonicalization for
//! agent-originated proposals.
//!
//! Every proposal reaching the authority pipeline must first pass through
//! [`validate`]. Rejections happen before any policy evaluation so policy
//! logic never sees a shell string. Because a [`RawAgentProposal`] already
//! types `args` as `Vec<String>`, the "non-sequence `args`" failure mode
//! the interface contract names is structurally unreachable here; only the
//! CR/LF-in-an-element case remains to check.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use gate_error::{ErrorCode, GateError};
use serde::{Deserialize, Serialize};

/// Shell metacharacters and control bytes that disqualify a bare command.
const FORBIDDEN_COMMAND_CHARS: &[char] = &[
    '|', '&', ';', '<', '>', '`', '$', '"', '\'', '(', ')', '\r', '\n',
];

/// An execution request as received from an agent, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAgentProposal {
    /// Candidate bare executable name.
    pub command: String,
    /// Candidate ordered argument vector.
    pub args: Vec<String>,
    /// Identity of the conversation/session that produced this request.
    pub session_id: String,
    /// Identity of the turn within the session.
    pub turn_id: String,
    /// Identity of the agent that produced this request.
    pub agent_id: String,
    /// Mandatory tag identifying the originating integration.
    pub source: String,
    /// Optional working directory the command should run in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Optional allowlist of environment variable names to forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_allowlist: Option<Vec<String>>,
    /// Optional requested gate mode, subject to the adapter's own policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_mode: Option<String>,
}

/// A [`RawAgentProposal`] that has passed pre-validation.
///
/// Structurally identical to the raw form; the type itself is the
/// evidence that [`validate`] accepted it; there's no separate flag to
/// check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreValidatedAgentProposal {
    /// Validated bare executable name.
    pub command: String,
    /// Validated ordered argument vector.
    pub args: Vec<String>,
    /// Identity of the conversation/session that produced this request.
    pub session_id: String,
    /// Identity of the turn within the session.
    pub turn_id: String,
    /// Identity of the agent that produced this request.
    pub agent_id: String,
    /// Tag identifying the originating integration.
    pub source: String,
    /// Optional working directory the command should run in.
    pub cwd: Option<String>,
    /// Optional allowlist of environment variable names to forward.
    pub env_allowlist: Option<Vec<String>>,
    /// Optional requested gate mode.
    pub requested_mode: Option<String>,
}

/// Validate `raw`, rejecting shell metacharacters and blank identity
/// fields before anything reaches policy evaluation.
pub fn validate(raw: RawAgentProposal) -> Result<PreValidatedAgentProposal, GateError> {
    if raw.command.is_empty()
        || raw.command.chars().any(char::is_whitespace)
        || raw.command.chars().any(|c| FORBIDDEN_COMMAND_CHARS.contains(&c))
    {
        return Err(GateError::new(
            ErrorCode::ShellStringRejected,
            "command must be non-empty, contain no whitespace, and no shell metacharacters",
        )
        .with_context("command", raw.command.clone()));
    }

    for (index, arg) in raw.args.iter().enumerate() {
        if arg.contains('\r') || arg.contains('\n') {
            return Err(GateError::new(
                ErrorCode::ShellStringRejected,
                "argument contains a carriage return or line feed",
            )
            .with_context("arg_index", index));
        }
    }

    for (field, value) in [
        ("session_id", &raw.session_id),
        ("turn_id", &raw.turn_id),
        ("agent_id", &raw.agent_id),
    ] {
        if value.trim().is_empty() {
            return Err(GateError::new(
                ErrorCode::ValidationError,
                format!("{field} must be present and non-blank"),
            ));
        }
    }

    if raw.source.trim().is_empty() {
        return Err(GateError::new(
            ErrorCode::ValidationError,
            "source tag must be present and non-blank",
        ));
    }

    Ok(PreValidatedAgentProposal {
        command: raw.command,
        args: raw.args,
        session_id: raw.session_id,
        turn_id: raw.turn_id,
        agent_id: raw.agent_id,
        source: raw.source,
        cwd: raw.cwd,
        env_allowlist: raw.env_allowlist,
        requested_mode: raw.requested_mode,
    })
}

/// Canonical hash of `args`, for audit records that must never carry
/// plaintext argument content.
pub fn hash_args(args: &[String]) -> Result<String, gate_canon::CanonError> {
    gate_canon::canonical_hash(&args.to_vec())
}
