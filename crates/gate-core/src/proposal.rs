use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Minute-granularity issuance window. `timestamp_floor` collapses
/// near-simultaneous requests into one fingerprint so replay semantics
/// stay well-defined; production variants that want finer windows should
/// adjust this constant rather than the flooring logic.
pub const TIMESTAMP_FLOOR_SECONDS: i64 = 60;

/// Floor a unix timestamp (seconds) to the nearest 60-second boundary.
pub fn floor_to_window(unix_seconds: i64) -> i64 {
    unix_seconds.div_euclid(TIMESTAMP_FLOOR_SECONDS) * TIMESTAMP_FLOOR_SECONDS
}

/// Immutable record describing a requested execution.
///
/// Two structurally equal proposals produce the same `proposal_hash` under
/// canonical serialization; `timestamp_floor` only changes the hash at
/// minute boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalProposal {
    /// Bare executable name — no whitespace, no shell metacharacters.
    pub command: String,
    /// Ordered sequence of opaque argument strings; order is significant.
    pub args: Vec<String>,
    /// Resource locator for the policy document used at build time.
    pub policy_path: String,
    /// Content hash of the policy document at build time.
    pub policy_hash: String,
    /// Implementation identity of the gate that built this proposal.
    pub guard_version: String,
    /// Wall-clock time floored to a 60-second boundary.
    pub timestamp_floor: i64,
}

impl CanonicalProposal {
    /// Construct a proposal, defensively copying `args` to preserve order
    /// and flooring `now_unix_seconds` to the issuance window.
    pub fn build(
        command: impl Into<String>,
        args: &[String],
        policy_path: impl Into<String>,
        policy_hash: impl Into<String>,
        guard_version: impl Into<String>,
        now_unix_seconds: i64,
    ) -> Self {
        Self {
            command: command.into(),
            args: args.to_vec(),
            policy_path: policy_path.into(),
            policy_hash: policy_hash.into(),
            guard_version: guard_version.into(),
            timestamp_floor: floor_to_window(now_unix_seconds),
        }
    }
}
