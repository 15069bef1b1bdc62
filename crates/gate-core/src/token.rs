use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mode::GateMode;

/// Outcome a token was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// The policy evaluator returned `ALLOW`, or the pipeline issued an
    /// audited permit under `PERMISSIVE`.
    Allow,
    /// A policy miss under `PERMISSIVE` without the audited-permit flag, or
    /// a scope elevation requiring human approval.
    Hold,
}

/// Additional constraints recorded inside a token's structured scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenConstraints {
    /// Content hash of the policy version this token was bound to.
    pub policy_version: String,
    /// Gate mode in force when this token was issued.
    pub gate_mode: GateMode,
    /// Implementation identity of the issuing gate.
    pub guard_version: String,
    /// Set when a `PERMISSIVE` policy miss was explicitly allowed through
    /// with an audit trail rather than held for approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audited_permit: Option<bool>,
}

/// Structured scope recorded on a token: what it authorizes and under what
/// constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenScope {
    /// The action this token authorizes, e.g. `"spawn"`.
    pub action: String,
    /// The resource the action targets, conventionally the command name.
    pub resource: String,
    /// Structured constraints narrowing the authorization.
    pub constraints: TokenConstraints,
}

/// The fields of a [`VerifiedToken`] that are bound by the issuer's
/// signature. Kept as its own struct so the signed payload can be
/// recomputed byte-for-byte without the signature or public key ever
/// being part of what gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenPayload {
    /// Time-ordered unique identifier for this token.
    pub token_id: String,
    /// Time-ordered unique identifier for this token's audit record.
    pub audit_ref: String,
    /// Canonical hash of the proposal this token authorizes.
    pub proposal_hash: String,
    /// Content hash of the policy document this token was bound to.
    pub policy_hash: String,
    /// Fingerprint of the host/runtime environment this token was bound to.
    pub environment_fingerprint: String,
    /// `ALLOW` or `HOLD`.
    pub decision: Decision,
    /// Unix-epoch milliseconds when this token was issued.
    pub issued_at: i64,
    /// Unix-epoch milliseconds after which this token is no longer valid.
    pub expires_at: i64,
    /// Structured scope and constraints this token carries.
    pub scope: TokenScope,
    /// Gate mode in force when this token was issued.
    pub gate_mode: GateMode,
}

/// A signed, time-bound authorization to execute one specific proposal.
///
/// Issued by the authority pipeline, consumed exactly once by the
/// execution kernel. The signature binds every field in `payload`; it
/// never covers `issuer_signature` or `public_key_hex` themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VerifiedToken {
    /// The signed fields.
    #[serde(flatten)]
    pub payload: TokenPayload,
    /// Asymmetric signature over the canonical serialization of `payload`.
    pub issuer_signature: String,
    /// Hex-encoded ephemeral public key, valid for this process's lifetime.
    pub public_key_hex: String,
}

impl VerifiedToken {
    /// `true` if `now_unix_millis` is at or before `expires_at`.
    pub fn is_within_ttl(&self, now_unix_millis: i64) -> bool {
        now_unix_millis <= self.payload.expires_at
    }

    /// `true` if this token's decision is `ALLOW`.
    pub fn is_allow(&self) -> bool {
        self.payload.decision == Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> TokenPayload {
        TokenPayload {
            token_id: "t1".to_string(),
            audit_ref: "a1".to_string(),
            proposal_hash: "ph".to_string(),
            policy_hash: "polh".to_string(),
            environment_fingerprint: "ef".to_string(),
            decision: Decision::Allow,
            issued_at: 1_000,
            expires_at: 2_000,
            scope: TokenScope {
                action: "spawn".to_string(),
                resource: "echo".to_string(),
                constraints: TokenConstraints {
                    policy_version: "polh".to_string(),
                    gate_mode: GateMode::Strict,
                    guard_version: "v1".to_string(),
                    audited_permit: None,
                },
            },
            gate_mode: GateMode::Strict,
        }
    }

    #[test]
    fn ttl_boundary_is_inclusive() {
        let token = VerifiedToken {
            payload: sample_payload(),
            issuer_signature: "sig".to_string(),
            public_key_hex: "pk".to_string(),
        };
        assert!(token.is_within_ttl(2_000));
        assert!(!token.is_within_ttl(2_001));
    }

    #[test]
    fn flatten_keeps_signature_fields_outside_payload_json() {
        let token = VerifiedToken {
            payload: sample_payload(),
            issuer_signature: "sig".to_string(),
            public_key_hex: "pk".to_string(),
        };
        let json = serde_json::to_value(&token).unwrap();
        assert!(json.get("issuer_signature").is_some());
        assert!(json.get("token_id").is_some(), "flatten should inline payload fields");
    }
}
