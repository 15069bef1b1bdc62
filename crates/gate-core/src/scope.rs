use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Rule metadata controlling whether auto-issuance is permitted or a
/// human-approved token is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Auto-issue permitted in both gate modes.
    Safe,
    /// Requires a human-approved token even when a rule matches.
    Net,
    /// Requires a human-approved token even when a rule matches.
    Fs,
    /// Never auto-issued under `STRICT`; blocked outright.
    Admin,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scope_is_safe() {
        assert_eq!(Scope::default(), Scope::Safe);
    }

    #[test]
    fn serializes_to_lowercase() {
        assert_eq!(serde_json::to_string(&Scope::Admin).unwrap(), "\"admin\"");
    }
}
