use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Fallback verdict applied when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyDefault {
    /// Deny any command with no matching rule.
    Deny,
    /// Allow any command with no matching rule.
    Allow,
}

/// A single rule: a command identity plus an optional argument constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyRule {
    /// Bare executable name this rule matches.
    pub command: String,
    /// Argument constraint. `None` matches any argument vector; `Some(["*"])`
    /// (single-element wildcard) also matches any argument vector;
    /// otherwise lengths must match and each position either equals or the
    /// rule element is `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Scope metadata controlling auto-issuance vs. human approval.
    #[serde(default)]
    pub scope: Scope,
    /// Informational description, not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A declarative policy document: a default verdict plus an ordered list of
/// rules evaluated first-match-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Policy {
    /// Verdict applied when no rule matches.
    pub default: PolicyDefault,
    /// Ordered rules; earlier rules mask later ones.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_without_args_defaults_to_safe_scope() {
        let rule = PolicyRule {
            command: "echo".to_string(),
            args: None,
            scope: Scope::default(),
            description: None,
        };
        assert_eq!(rule.scope, Scope::Safe);
    }

    #[test]
    fn policy_round_trips_through_json() {
        let policy = Policy {
            default: PolicyDefault::Deny,
            rules: vec![PolicyRule {
                command: "echo".to_string(),
                args: Some(vec!["*".to_string()]),
                scope: Scope::Safe,
                description: Some("allow echo".to_string()),
            }],
        };
        let json = serde_json::to_string(&policy).unwrap();
        let back: Policy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }
}
