//! Command-line argument surface.

use clap::Parser;

/// Gate a single command invocation and, if authorized, execute it.
#[derive(Debug, Parser)]
#[command(name = "gate", version, about = "Deterministic execution gate for command invocations")]
pub struct Cli {
    /// Bare executable name to gate. Must contain no whitespace and no
    /// shell metacharacters.
    pub command: String,

    /// Arguments passed to `command` if authorized.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Path to a TOML gate config file. Overridden field-by-field by the
    /// flags below and by `GATE_*` environment variables.
    #[arg(long)]
    pub config: Option<String>,

    /// Path to the policy document. Defaults to `./policy.toml`.
    #[arg(long)]
    pub policy_path: Option<String>,

    /// Gate mode: `STRICT` or `PERMISSIVE`. Unknown values coerce to
    /// `STRICT`. Defaults to `STRICT`.
    #[arg(long)]
    pub gate_mode: Option<String>,

    /// Exit non-zero on a `HOLD` verdict.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub fail_on_hold: bool,

    /// Exit zero on a `HOLD` verdict, overriding `--fail-on-hold` and any
    /// configured default.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_fail_on_hold: bool,

    /// Under `PERMISSIVE`, upgrade a policy miss to an audited `ALLOW`
    /// instead of holding it for approval.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub allow_with_audit: bool,

    /// Directory holding the used-token and audit-log streams.
    #[arg(long)]
    pub audit_dir: Option<String>,

    /// Name of the audit stream within `--audit-dir`.
    #[arg(long)]
    pub audit_stream: Option<String>,

    /// Identity of the conversation/session issuing this request.
    #[arg(long, default_value = "cli-session")]
    pub session_id: String,

    /// Identity of the turn within the session issuing this request.
    #[arg(long, default_value = "cli-turn")]
    pub turn_id: String,

    /// Identity of the agent issuing this request.
    #[arg(long, default_value = "cli")]
    pub agent_id: String,

    /// Tag identifying the originating integration.
    #[arg(long, default_value = "cli")]
    pub source: String,
}
