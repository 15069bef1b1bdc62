use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How the authority pipeline treats a policy miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateMode {
    /// A policy miss stops the request with no token issued.
    Strict,
    /// A policy miss issues a `HOLD` token (or, with explicit opt-in, an
    /// audited `ALLOW`) that still passes through the kernel.
    Permissive,
}

impl Default for GateMode {
    /// Unknown or unset gate modes are silently coerced to `STRICT`.
    fn default() -> Self {
        Self::Strict
    }
}

impl std::str::FromStr for GateMode {
    type Err = std::convert::Infallible;

    /// Parses the adapter-facing `gate_mode` input. Anything other than an
    /// exact, case-insensitive `"permissive"` coerces to `STRICT` — the
    /// adapter surface never rejects this input outright.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("permissive") {
            Ok(Self::Permissive)
        } else {
            Ok(Self::Strict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_coerce_to_strict() {
        assert_eq!("garbage".parse::<GateMode>().unwrap(), GateMode::Strict);
        assert_eq!("".parse::<GateMode>().unwrap(), GateMode::Strict);
    }

    #[test]
    fn permissive_is_case_insensitive() {
        assert_eq!(
            "PERMISSIVE".parse::<GateMode>().unwrap(),
            GateMode::Permissive
        );
    }

    #[test]
    fn default_is_strict() {
        assert_eq!(GateMode::default(), GateMode::Strict);
    }
}
