use std::path::Path;

use gate_core::{Policy, PolicyDefault, Scope};

use crate::loader::load_policy;

/// The result of evaluating a proposal against a policy document.
///
/// Evaluation is total: it always returns an outcome, never an error.
/// Load failures are absorbed into `allowed = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Whether the command is permitted.
    pub allowed: bool,
    /// Human-readable reason for the verdict.
    pub reason: String,
    /// Scope recorded by the rule that matched, if any.
    pub scope: Option<Scope>,
}

impl EvaluationOutcome {
    fn fail_closed(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            scope: None,
        }
    }
}

/// Load the policy at `policy_path` and evaluate `(command, args)` against
/// it. Any load failure fail-closes to `DENY`.
pub fn evaluate_at_path(command: &str, args: &[String], policy_path: &Path) -> EvaluationOutcome {
    match load_policy(policy_path) {
        Ok(policy) => evaluate(command, args, &policy),
        Err(_) => EvaluationOutcome::fail_closed("no valid policy; fail-closed"),
    }
}

/// Evaluate `(command, args)` against an already-loaded policy document.
///
/// Rules are walked in order; the first rule whose `command` is byte-equal
/// and whose `args` constraint is satisfied wins and the command is
/// allowed under that rule's scope. No match falls through to the
/// document's `default` verdict.
pub fn evaluate(command: &str, args: &[String], policy: &Policy) -> EvaluationOutcome {
    for rule in &policy.rules {
        if rule.command == command && args_match(rule.args.as_deref(), args) {
            return EvaluationOutcome {
                allowed: true,
                reason: "rule matched".to_string(),
                scope: Some(rule.scope),
            };
        }
    }
    match policy.default {
        PolicyDefault::Allow => EvaluationOutcome {
            allowed: true,
            reason: "no rule matched".to_string(),
            scope: None,
        },
        PolicyDefault::Deny => EvaluationOutcome {
            allowed: false,
            reason: "no rule matched".to_string(),
            scope: None,
        },
    }
}

/// `true` when `actual` satisfies `rule_args`.
///
/// `None` matches any argument vector. A single-element `["*"]` also
/// matches any argument vector. Otherwise lengths must match exactly and
/// each position either equals the corresponding rule element or the rule
/// element is `*`.
fn args_match(rule_args: Option<&[String]>, actual: &[String]) -> bool {
    let Some(rule_args) = rule_args else {
        return true;
    };
    if rule_args.len() == 1 && rule_args[0] == "*" {
        return true;
    }
    if rule_args.len() != actual.len() {
        return false;
    }
    rule_args
        .iter()
        .zip(actual.iter())
        .all(|(expected, got)| expected == "*" || expected == got)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::PolicyRule;

    fn policy(default: PolicyDefault, rules: Vec<PolicyRule>) -> Policy {
        Policy { default, rules }
    }

    fn rule(command: &str, args: Option<Vec<&str>>, scope: Scope) -> PolicyRule {
        PolicyRule {
            command: command.to_string(),
            args: args.map(|v| v.into_iter().map(String::from).collect()),
            scope,
            description: None,
        }
    }

    #[test]
    fn wildcard_args_matches_any_argv() {
        let p = policy(
            PolicyDefault::Deny,
            vec![rule("echo", Some(vec!["*"]), Scope::Safe)],
        );
        let out = evaluate("echo", &["t1".to_string()], &p);
        assert!(out.allowed);
        assert_eq!(out.scope, Some(Scope::Safe));
    }

    #[test]
    fn absent_args_matches_any_argv() {
        let p = policy(PolicyDefault::Deny, vec![rule("echo", None, Scope::Safe)]);
        assert!(evaluate("echo", &["a".to_string(), "b".to_string()], &p).allowed);
        assert!(evaluate("echo", &[], &p).allowed);
    }

    #[test]
    fn explicit_args_require_positional_equality() {
        let p = policy(
            PolicyDefault::Deny,
            vec![rule("cp", Some(vec!["a", "*"]), Scope::Safe)],
        );
        assert!(evaluate("cp", &["a".to_string(), "b".to_string()], &p).allowed);
        assert!(!evaluate("cp", &["x".to_string(), "b".to_string()], &p).allowed);
        assert!(!evaluate("cp", &["a".to_string()], &p).allowed);
    }

    #[test]
    fn no_match_falls_through_to_default_deny() {
        let p = policy(
            PolicyDefault::Deny,
            vec![rule("echo", Some(vec!["*"]), Scope::Safe)],
        );
        let out = evaluate("rm", &["-rf".to_string(), "/".to_string()], &p);
        assert!(!out.allowed);
        assert_eq!(out.reason, "no rule matched");
    }

    #[test]
    fn no_match_falls_through_to_default_allow() {
        let p = policy(PolicyDefault::Allow, vec![]);
        assert!(evaluate("anything", &[], &p).allowed);
    }

    #[test]
    fn first_matching_rule_wins() {
        let p = policy(
            PolicyDefault::Deny,
            vec![
                rule("git", Some(vec!["status"]), Scope::Safe),
                rule("git", None, Scope::Admin),
            ],
        );
        let out = evaluate("git", &["status".to_string()], &p);
        assert_eq!(out.scope, Some(Scope::Safe));
    }

    #[test]
    fn command_equality_is_exact_not_substring() {
        let p = policy(
            PolicyDefault::Deny,
            vec![rule("echo", None, Scope::Safe)],
        );
        assert!(!evaluate("echoes", &[], &p).allowed);
    }

    proptest::proptest! {
        #[test]
        fn wildcard_rule_always_allows(args: Vec<String>) {
            let p = policy(
                PolicyDefault::Deny,
                vec![rule("cmd", Some(vec!["*"]), Scope::Safe)],
            );
            proptest::prop_assert!(evaluate("cmd", &args, &p).allowed);
        }
    }
}
