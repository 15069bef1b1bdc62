//! Time-ordered, unique identifiers for tokens and audit references.
//!
//! Identifiers are 128-bit UUIDv7 values: a 48-bit millisecond timestamp
//! prefix, a version nibble, a variant pair, and a cryptographically random
//! remainder. Two identifiers generated in the same process sort
//! lexicographically by creation time down to millisecond resolution;
//! collisions within a millisecond are resolved by the random tail.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A time-ordered unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(Uuid);

impl GateId {
    /// Generate a fresh identifier stamped with the current wall-clock time.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Render the identifier's canonical hyphenated string form.
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    /// Parse an identifier from its canonical string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for GateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<GateId> for String {
    fn from(id: GateId) -> Self {
        id.as_str()
    }
}
