//! Binary entry point: parses the command-line adapter surface, runs the
//! pre-validation adapter, the authority pipeline (with scope elevation),
//! and the execution kernel, and reports one structured decision line.
//!
//! This crate is the only place the other gate crates are composed
//! together; none of them depend on it.

mod cli;
mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use gate_core::{GateMode, Scope};
use gate_scope::{ScopeDecision, TokenStore};
use output::DecisionLine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();
    let exit_code = run(cli).await;
    std::process::exit(exit_code);
}

async fn run(cli: cli::Cli) -> i32 {
    let mut config = match gate_config::load_config(cli.config.as_deref().map(Path::new)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            return 1;
        }
    };

    if let Some(p) = &cli.policy_path {
        config.policy_path = p.clone();
    }
    if let Some(m) = &cli.gate_mode {
        config.gate_mode = m.parse().unwrap_or_default();
    }
    if cli.no_fail_on_hold {
        config.fail_on_hold = false;
    } else if cli.fail_on_hold {
        config.fail_on_hold = true;
    }
    if cli.allow_with_audit {
        config.allow_with_audit = true;
    }
    if let Some(d) = &cli.audit_dir {
        config.audit_dir = d.clone();
    }
    if let Some(s) = &cli.audit_stream {
        config.audit_stream = s.clone();
    }

    if let Err(e) = gate_config::validate_config(&config) {
        eprintln!("invalid config: {e}");
        return 1;
    }

    let raw = gate_adapter::RawAgentProposal {
        command: cli.command.clone(),
        args: cli.args.clone(),
        session_id: cli.session_id.clone(),
        turn_id: cli.turn_id.clone(),
        agent_id: cli.agent_id.clone(),
        source: cli.source.clone(),
        cwd: None,
        env_allowlist: None,
        requested_mode: cli.gate_mode.clone(),
    };
    let validated = match gate_adapter::validate(raw) {
        Ok(v) => v,
        Err(e) => {
            DecisionLine {
                verdict: "STOP",
                proposal_hash: String::new(),
                policy_hash: None,
                reason: e.message.clone(),
                token_id: None,
                audit_ref: None,
                environment_fingerprint: String::new(),
                executed: false,
                gate_mode: gate_mode_label(config.gate_mode),
                error_type: Some(e.code.as_str().to_string()),
            }
            .emit();
            return 1;
        }
    };

    let policy_path = PathBuf::from(&config.policy_path);
    let registry = gate_registry::TokenRegistry::init(
        Path::new(&config.audit_dir),
        &config.audit_stream,
        chrono::Utc::now().timestamp_millis(),
    );

    let evaluation = gate_policy::evaluate_at_path(&validated.command, &validated.args, &policy_path);

    if evaluation.allowed {
        let scope = evaluation.scope.unwrap_or_default();
        match gate_scope::evaluate_scope(scope, config.gate_mode) {
            ScopeDecision::AutoIssue => {}
            ScopeDecision::Stop => {
                return handle_scope_stop(&validated, &policy_path, &config, &registry, scope);
            }
            ScopeDecision::RequireApproval => {
                return handle_scope_approval(&validated, &policy_path, &config, &registry, scope).await;
            }
        }
    }

    let outcome = gate_pipeline::run(
        gate_pipeline::PipelineRequest {
            command: &validated.command,
            args: &validated.args,
            policy_path: &policy_path,
            gate_mode: config.gate_mode,
            allow_with_audit: config.allow_with_audit,
            guard_version: &config.guard_version,
        },
        &registry,
    );

    finish(&validated, outcome, &config, &registry).await
}

fn handle_scope_stop(
    validated: &gate_adapter::PreValidatedAgentProposal,
    policy_path: &Path,
    config: &gate_config::GateConfig,
    registry: &gate_registry::TokenRegistry,
    scope: Scope,
) -> i32 {
    let err = gate_scope::stop_error(scope);
    let policy_hash = gate_policy::hash_policy_file(policy_path);
    let proposal_hash = proposal_hash_for(validated, policy_path, &policy_hash, config);
    registry.append_audit(gate_registry::LogRecord {
        decision: "SCOPE_ELEVATION_STOP".to_string(),
        proposal_hash: Some(proposal_hash.clone()),
        token_id: None,
        policy_hash: Some(policy_hash.clone()),
        environment_fingerprint: None,
        reason: err.message.clone(),
        executed: false,
        error_type: Some(err.code.as_str().to_string()),
        time: chrono::Utc::now().timestamp_millis(),
    });
    DecisionLine {
        verdict: "STOP",
        proposal_hash,
        policy_hash: Some(policy_hash),
        reason: err.message,
        token_id: None,
        audit_ref: None,
        environment_fingerprint: String::new(),
        executed: false,
        gate_mode: gate_mode_label(config.gate_mode),
        error_type: Some(err.code.as_str().to_string()),
    }
    .emit();
    1
}

async fn handle_scope_approval(
    validated: &gate_adapter::PreValidatedAgentProposal,
    policy_path: &Path,
    config: &gate_config::GateConfig,
    registry: &gate_registry::TokenRegistry,
    scope: Scope,
) -> i32 {
    let policy_hash = gate_policy::hash_policy_file(policy_path);
    let proposal_hash = proposal_hash_for(validated, policy_path, &policy_hash, config);
    let store = gate_scope::FileTokenStore::new(Path::new(&config.audit_dir).join("approved_tokens"));

    let stored = match store.retrieve(&proposal_hash) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("token store read failed: {e}");
            None
        }
    };

    let Some(token) = stored else {
        let err = gate_scope::hold_error(scope);
        registry.append_audit(gate_registry::LogRecord {
            decision: "SCOPE_ELEVATION_HOLD".to_string(),
            proposal_hash: Some(proposal_hash.clone()),
            token_id: None,
            policy_hash: Some(policy_hash.clone()),
            environment_fingerprint: None,
            reason: err.message.clone(),
            executed: false,
            error_type: Some(err.code.as_str().to_string()),
            time: chrono::Utc::now().timestamp_millis(),
        });
        DecisionLine {
            verdict: "HOLD",
            proposal_hash,
            policy_hash: Some(policy_hash),
            reason: err.message,
            token_id: None,
            audit_ref: None,
            environment_fingerprint: String::new(),
            executed: false,
            gate_mode: gate_mode_label(config.gate_mode),
            error_type: Some(err.code.as_str().to_string()),
        }
        .emit();
        return if config.fail_on_hold { 1 } else { 0 };
    };

    let environment_fingerprint = gate_pipeline::environment_fingerprint(&policy_hash).unwrap_or_default();
    let proposal = gate_core::CanonicalProposal::build(
        validated.command.as_str(),
        &validated.args,
        policy_path.display().to_string(),
        policy_hash.as_str(),
        config.guard_version.as_str(),
        chrono::Utc::now().timestamp(),
    );

    run_kernel(&validated.command, &validated.args, &proposal, &token, registry, config, environment_fingerprint).await
}

fn proposal_hash_for(
    validated: &gate_adapter::PreValidatedAgentProposal,
    policy_path: &Path,
    policy_hash: &str,
    config: &gate_config::GateConfig,
) -> String {
    let proposal = gate_core::CanonicalProposal::build(
        validated.command.as_str(),
        &validated.args,
        policy_path.display().to_string(),
        policy_hash,
        config.guard_version.as_str(),
        chrono::Utc::now().timestamp(),
    );
    gate_canon::canonical_hash(&proposal).unwrap_or_default()
}

async fn finish(
    validated: &gate_adapter::PreValidatedAgentProposal,
    outcome: gate_pipeline::PipelineOutcome,
    config: &gate_config::GateConfig,
    registry: &gate_registry::TokenRegistry,
) -> i32 {
    match outcome.decision {
        gate_pipeline::Verdict::Stop => {
            DecisionLine {
                verdict: "STOP",
                proposal_hash: outcome.proposal_hash,
                policy_hash: None,
                reason: outcome.reason,
                token_id: None,
                audit_ref: None,
                environment_fingerprint: outcome.environment_fingerprint,
                executed: false,
                gate_mode: gate_mode_label(config.gate_mode),
                error_type: None,
            }
            .emit();
            1
        }
        gate_pipeline::Verdict::Hold => {
            let token = outcome.token.expect("HOLD verdict always carries a token");
            DecisionLine {
                verdict: "HOLD",
                proposal_hash: outcome.proposal_hash,
                policy_hash: Some(token.payload.policy_hash.clone()),
                reason: outcome.reason,
                token_id: Some(token.payload.token_id.clone()),
                audit_ref: Some(token.payload.audit_ref.clone()),
                environment_fingerprint: outcome.environment_fingerprint,
                executed: false,
                gate_mode: gate_mode_label(config.gate_mode),
                error_type: None,
            }
            .emit();
            if config.fail_on_hold {
                1
            } else {
                0
            }
        }
        gate_pipeline::Verdict::Allow => {
            let token = outcome.token.expect("ALLOW verdict always carries a token");
            let proposal = outcome.proposal.expect("ALLOW verdict always carries a proposal");
            run_kernel(
                &validated.command,
                &validated.args,
                &proposal,
                &token,
                registry,
                config,
                outcome.environment_fingerprint,
            )
            .await
        }
    }
}

async fn run_kernel(
    command: &str,
    args: &[String],
    proposal: &gate_core::CanonicalProposal,
    token: &gate_core::VerifiedToken,
    registry: &gate_registry::TokenRegistry,
    config: &gate_config::GateConfig,
    environment_fingerprint: String,
) -> i32 {
    match gate_kernel::execute(command, args, proposal, token, registry).await {
        Ok(success) => {
            DecisionLine {
                verdict: "ALLOW",
                proposal_hash: token.payload.proposal_hash.clone(),
                policy_hash: Some(token.payload.policy_hash.clone()),
                reason: "verification chain passed".to_string(),
                token_id: Some(success.token_id),
                audit_ref: Some(success.audit_ref),
                environment_fingerprint,
                executed: success.executed,
                gate_mode: gate_mode_label(config.gate_mode),
                error_type: None,
            }
            .emit();
            success.exit_code
        }
        Err(gate_kernel::KernelError::Denied(e)) => {
            DecisionLine {
                verdict: "STOP",
                proposal_hash: token.payload.proposal_hash.clone(),
                policy_hash: Some(token.payload.policy_hash.clone()),
                reason: e.message.clone(),
                token_id: Some(token.payload.token_id.clone()),
                audit_ref: Some(token.payload.audit_ref.clone()),
                environment_fingerprint,
                executed: false,
                gate_mode: gate_mode_label(config.gate_mode),
                error_type: Some(e.code.as_str().to_string()),
            }
            .emit();
            1
        }
        Err(gate_kernel::KernelError::SpawnFailed { command, source }) => {
            eprintln!("failed to spawn {command}: {source}");
            1
        }
    }
}

fn gate_mode_label(mode: GateMode) -> &'static str {
    match mode {
        GateMode::Strict => "STRICT",
        GateMode::Permissive => "PERMISSIVE",
    }
}
