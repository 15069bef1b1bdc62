//! Configuration loading, validation, and merging for the execution gate.
//!
//! This crate provides [`GateConfig`] — the top-level runtime settings that
//! the CLI and any embedding host read before building a pipeline request —
//! together with helpers for loading from TOML files, overlaying environment
//! variables, merging layered configs, and producing advisory
//! [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use gate_core::GateMode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// Two configs could not be merged because of conflicting constraints.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Description of the conflict.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A deprecated field was used in the configuration.
    DeprecatedField {
        /// Name of the deprecated field.
        field: String,
        /// Suggested replacement, if any.
        suggestion: Option<String>,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A path field is relative, and will resolve against the process's
    /// current working directory rather than a fixed location.
    RelativePath {
        /// Name of the field holding the relative path.
        field: String,
        /// The relative path value.
        value: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => {
                write!(f, "deprecated field '{field}'")?;
                if let Some(s) = suggestion {
                    write!(f, " — use '{s}' instead")?;
                }
                Ok(())
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::RelativePath { field, value } => {
                write!(f, "'{field}' ({value}) is relative; it resolves against the process cwd")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config type
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the execution gate.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GateConfig {
    /// Path to the policy file evaluated by every proposal.
    #[serde(default = "default_policy_path")]
    pub policy_path: String,

    /// Gate mode applied when no CLI override is given.
    #[serde(default)]
    pub gate_mode: GateMode,

    /// Whether a `HOLD` verdict should make the CLI exit non-zero.
    #[serde(default = "default_fail_on_hold")]
    pub fail_on_hold: bool,

    /// Whether a policy miss under `PERMISSIVE` may be upgraded to an
    /// audited `ALLOW` instead of a `HOLD`.
    #[serde(default)]
    pub allow_with_audit: bool,

    /// Version tag stamped into every issued token's constraints, binding
    /// it to the guard build that issued it.
    #[serde(default = "default_guard_version")]
    pub guard_version: String,

    /// Directory holding the append-only used-token and audit-log streams.
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,

    /// Name of the audit stream within `audit_dir`.
    #[serde(default = "default_audit_stream")]
    pub audit_stream: String,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_policy_path() -> String {
    "./policy.toml".to_string()
}

fn default_fail_on_hold() -> bool {
    true
}

fn default_guard_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_audit_dir() -> String {
    "./audit".to_string()
}

fn default_audit_stream() -> String {
    "default".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy_path: default_policy_path(),
            gate_mode: GateMode::default(),
            fail_on_hold: default_fail_on_hold(),
            allow_with_audit: false,
            guard_version: default_guard_version(),
            audit_dir: default_audit_dir(),
            audit_stream: default_audit_stream(),
            log_level: Some("info".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`GateConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`GateConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => GateConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`GateConfig`].
pub fn parse_toml(content: &str) -> Result<GateConfig, ConfigError> {
    toml::from_str::<GateConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `GATE_POLICY_PATH`
/// - `GATE_MODE`
/// - `GATE_FAIL_ON_HOLD`
/// - `GATE_ALLOW_WITH_AUDIT`
/// - `GATE_GUARD_VERSION`
/// - `GATE_AUDIT_DIR`
/// - `GATE_AUDIT_STREAM`
/// - `GATE_LOG_LEVEL`
pub fn apply_env_overrides(config: &mut GateConfig) {
    if let Ok(val) = std::env::var("GATE_POLICY_PATH") {
        config.policy_path = val;
    }
    if let Ok(val) = std::env::var("GATE_MODE") {
        config.gate_mode = val.parse().unwrap_or_default();
    }
    if let Ok(val) = std::env::var("GATE_FAIL_ON_HOLD") {
        config.fail_on_hold = parse_bool_env(&val, config.fail_on_hold);
    }
    if let Ok(val) = std::env::var("GATE_ALLOW_WITH_AUDIT") {
        config.allow_with_audit = parse_bool_env(&val, config.allow_with_audit);
    }
    if let Ok(val) = std::env::var("GATE_GUARD_VERSION") {
        config.guard_version = val;
    }
    if let Ok(val) = std::env::var("GATE_AUDIT_DIR") {
        config.audit_dir = val;
    }
    if let Ok(val) = std::env::var("GATE_AUDIT_STREAM") {
        config.audit_stream = val;
    }
    if let Ok(val) = std::env::var("GATE_LOG_LEVEL") {
        config.log_level = Some(val);
    }
}

fn parse_bool_env(val: &str, fallback: bool) -> bool {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown log level, blank paths) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &GateConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if config.policy_path.trim().is_empty() {
        errors.push("policy_path must not be empty".into());
    } else if !Path::new(&config.policy_path).is_absolute() {
        warnings.push(ConfigWarning::RelativePath {
            field: "policy_path".into(),
            value: config.policy_path.clone(),
        });
    }

    if config.audit_dir.trim().is_empty() {
        errors.push("audit_dir must not be empty".into());
    } else if !Path::new(&config.audit_dir).is_absolute() {
        warnings.push(ConfigWarning::RelativePath {
            field: "audit_dir".into(),
            value: config.audit_dir.clone(),
        });
    }

    if config.audit_stream.trim().is_empty() {
        errors.push("audit_stream must not be empty".into());
    }

    if config.guard_version.trim().is_empty() {
        errors.push("guard_version must not be empty".into());
    }

    if config.allow_with_audit && config.gate_mode == GateMode::Strict {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "gate_mode".into(),
            hint: "allow_with_audit only takes effect under PERMISSIVE".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`
/// except where `overlay` still holds its own struct default, in which case
/// `base`'s value is kept.
pub fn merge_configs(base: GateConfig, overlay: GateConfig) -> GateConfig {
    let defaults = GateConfig::default();
    GateConfig {
        policy_path: pick(overlay.policy_path, base.policy_path, &defaults.policy_path),
        gate_mode: if overlay.gate_mode != defaults.gate_mode {
            overlay.gate_mode
        } else {
            base.gate_mode
        },
        fail_on_hold: if overlay.fail_on_hold != defaults.fail_on_hold {
            overlay.fail_on_hold
        } else {
            base.fail_on_hold
        },
        allow_with_audit: overlay.allow_with_audit || base.allow_with_audit,
        guard_version: pick(overlay.guard_version, base.guard_version, &defaults.guard_version),
        audit_dir: pick(overlay.audit_dir, base.audit_dir, &defaults.audit_dir),
        audit_stream: pick(overlay.audit_stream, base.audit_stream, &defaults.audit_stream),
        log_level: overlay.log_level.or(base.log_level),
    }
}

fn pick(overlay: String, base: String, default_value: &str) -> String {
    if overlay != default_value {
        overlay
    } else {
        base
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
