//! Typed denial taxonomy for the execution gate.
//!
//! Every denial the kernel, pipeline, or adapter can raise carries an
//! [`ErrorCode`] (a machine-readable, stable string tag), a human-readable
//! message, an optional cause chain, and arbitrary key-value context. Use the
//! builder returned by [`GateError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Kernel verification-chain denials (steps 1-7).
    Kernel,
    /// Pre-validation adapter rejections.
    Validation,
    /// Authority pipeline failures.
    Pipeline,
    /// Scope elevation denials.
    Scope,
    /// Policy document load/parse errors.
    Policy,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Kernel => "kernel",
            Self::Validation => "validation",
            Self::Pipeline => "pipeline",
            Self::Scope => "scope",
            Self::Policy => "policy",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases. This set is exhaustive
/// for the kernel's seven-step verification chain plus the adjacent
/// adapter, pipeline, and scope denials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Step 1: `now > token.expires_at`.
    TokenExpired,
    /// Step 2: presented token's decision is not `ALLOW`.
    DecisionNotAllow,
    /// Step 3: `token_id` already present in the registry.
    TokenReplayed,
    /// Step 4: recomputed proposal hash disagrees with the token binding.
    ProposalHashMismatch,
    /// Step 5: recomputed policy hash disagrees with the token binding.
    PolicyHashMismatch,
    /// Step 6: recomputed environment fingerprint disagrees with the token binding.
    EnvFingerprintMismatch,
    /// Step 7: signature fails verification or key material is malformed.
    SignatureInvalid,
    /// Pre-validation: shell metacharacters or control bytes in `command`/`args`.
    ShellStringRejected,
    /// Pre-validation: structurally invalid proposal (non-array args, blank identity fields).
    ValidationError,
    /// Authority pipeline: unexpected failure converted to `STOP`.
    PipelineError,
    /// Scope policy: `admin` scope may never be auto-issued under `STRICT`.
    ScopeElevationStop,
    /// Scope policy: `net`/`fs` scope requires a human-approved token.
    ScopeElevationHold,
    /// Policy document could not be loaded; fail-closed to `DENY`.
    PolicyNotFound,
    /// Policy document exists but failed to parse.
    PolicyReadError,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TokenExpired
            | Self::DecisionNotAllow
            | Self::TokenReplayed
            | Self::ProposalHashMismatch
            | Self::PolicyHashMismatch
            | Self::EnvFingerprintMismatch
            | Self::SignatureInvalid => ErrorCategory::Kernel,

            Self::ShellStringRejected | Self::ValidationError => ErrorCategory::Validation,

            Self::PipelineError => ErrorCategory::Pipeline,

            Self::ScopeElevationStop | Self::ScopeElevationHold => ErrorCategory::Scope,

            Self::PolicyNotFound | Self::PolicyReadError => ErrorCategory::Policy,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"TOKEN_EXPIRED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::DecisionNotAllow => "DECISION_NOT_ALLOW",
            Self::TokenReplayed => "TOKEN_REPLAYED",
            Self::ProposalHashMismatch => "PROPOSAL_HASH_MISMATCH",
            Self::PolicyHashMismatch => "POLICY_HASH_MISMATCH",
            Self::EnvFingerprintMismatch => "ENV_FINGERPRINT_MISMATCH",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::ShellStringRejected => "SHELL_STRING_REJECTED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::PipelineError => "PIPELINE_ERROR",
            Self::ScopeElevationStop => "SCOPE_ELEVATION_STOP",
            Self::ScopeElevationHold => "SCOPE_ELEVATION_HOLD",
            Self::PolicyNotFound => "POLICY_NOT_FOUND",
            Self::PolicyReadError => "POLICY_READ_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GateError
// ---------------------------------------------------------------------------

/// Unified gate error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use gate_error::{GateError, ErrorCode};
///
/// let err = GateError::new(ErrorCode::TokenExpired, "token expired 4s ago")
///     .with_context("token_id", "01HXYZ")
///     .with_context("expires_at_ms", 1_700_000_000_000i64);
/// ```
pub struct GateError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GateError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GateError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`GateError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&GateError> for GateErrorDto {
    fn from(err: &GateError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<GateErrorDto> for GateError {
    fn from(dto: GateErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
