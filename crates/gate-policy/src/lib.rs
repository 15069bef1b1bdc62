//! Deny-by-default policy loader and evaluator.
//!
//! Policy documents are TOML on disk (the external interface block
//! literally sketches YAML-like indentation; this implementation commits
//! to TOML as the concrete on-disk format — see `DESIGN.md` for the
//! rationale). Loading is total and fail-closed: any missing file, parse
//! failure, or malformed `default`/`rules` collapses to `DENY` rather than
//! propagating an error to the caller.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod loader;
mod matcher;

pub use loader::{hash_policy_file, load_policy, PolicyLoadError};
pub use matcher::{evaluate, evaluate_at_path, EvaluationOutcome};
