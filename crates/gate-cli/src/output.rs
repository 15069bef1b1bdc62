//! The structured decision line printed to standard output.

use serde::Serialize;

/// One line printed per decision, matching the adapter surface's machine
/// output contract and the kernel's structured log line.
#[derive(Debug, Serialize)]
pub struct DecisionLine {
    /// Terminal verdict: `ALLOW`, `HOLD`, or `STOP`.
    pub verdict: &'static str,
    /// Canonical hash of the built proposal, empty if none was built.
    pub proposal_hash: String,
    /// Content hash of the policy document in force, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
    /// Human-readable reason for the verdict.
    pub reason: String,
    /// Identifier of the token presented or issued, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Identifier of the corresponding audit record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_ref: Option<String>,
    /// Fingerprint of the environment this decision was computed against.
    pub environment_fingerprint: String,
    /// `true` once the process-spawn primitive has been reached.
    pub executed: bool,
    /// Gate mode in force for this decision.
    pub gate_mode: &'static str,
    /// Typed denial code, present only for kernel- or adapter-raised
    /// denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl DecisionLine {
    /// Serialize and print this line to standard output.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("failed to serialize decision line: {e}"),
        }
    }
}
