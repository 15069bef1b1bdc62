use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Host-identity record hashed (together with `policy_hash`) into the
/// environment fingerprint.
///
/// The field set is a configured profile. The minimum reference profile is
/// `{host_os, host_arch, runtime_version, policy_hash}`; extended profiles
/// add workflow/run identifiers, repository commit, and guard version.
/// Whatever fields are populated here, mutating any of them between
/// issuance and kernel verification must change the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentProfile {
    /// Operating system family (`"linux"`, `"macos"`, `"windows"`, ...).
    pub host_os: String,
    /// CPU architecture (`"x86_64"`, `"aarch64"`, ...).
    pub host_arch: String,
    /// Identity of the runtime executing the gate (e.g. a rustc/target triple tag).
    pub runtime_version: String,
    /// Content hash of the policy document in force for this request.
    pub policy_hash: String,
    /// Optional CI/workflow run identifier, when running under automation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_run_id: Option<String>,
    /// Optional source-repository commit, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_commit: Option<String>,
    /// Implementation identity of the gate computing this fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard_version: Option<String>,
}

impl EnvironmentProfile {
    /// Build the minimum reference profile: `{host_os, host_arch,
    /// runtime_version, policy_hash}` with no extended fields.
    pub fn minimal(
        host_os: impl Into<String>,
        host_arch: impl Into<String>,
        runtime_version: impl Into<String>,
        policy_hash: impl Into<String>,
    ) -> Self {
        Self {
            host_os: host_os.into(),
            host_arch: host_arch.into(),
            runtime_version: runtime_version.into(),
            policy_hash: policy_hash.into(),
            workflow_run_id: None,
            repository_commit: None,
            guard_version: None,
        }
    }

    /// Read the minimum reference profile from the current process's
    /// compile-time target information and the given policy hash.
    pub fn from_host(policy_hash: impl Into<String>) -> Self {
        Self::minimal(
            std::env::consts::OS,
            std::env::consts::ARCH,
            env!("CARGO_PKG_VERSION"),
            policy_hash,
        )
    }
}
