//! Configuration for round-based resolution.

use serde::{Deserialize, Serialize};

/// Default number of rounds [`resolve_all`](crate::resolve_all) runs before giving up.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Resolution settings carried on a [`Scope`](crate::Scope).
///
/// # Defaults
/// Missing fields fall back to the `default_*` helpers, so an empty document
/// deserializes to [`ResolveConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Maximum number of resolve rounds before pending work is reported as unresolved.
    ///
    /// Each round lets one more level of dependent lookups converge
    /// (resolver B keyed by values resolver A produced).
    ///
    /// Default: `default_max_rounds()` (10)
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

impl ResolveConfig {
    /// Creates a new configuration with the specified round budget.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_budget() {
        assert_eq!(ResolveConfig::default().max_rounds, 10);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ResolveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ResolveConfig::default());
    }

    #[test]
    fn test_override_round_budget() {
        let config: ResolveConfig = serde_json::from_str(r#"{"max_rounds": 3}"#).unwrap();
        assert_eq!(config.max_rounds, 3);
        assert_eq!(ResolveConfig::default().with_max_rounds(3), config);
    }
}
