//! Calibration search configuration.

use serde::{Deserialize, Serialize};

use dp_chain_core::{DEFAULT_MAX_BISECTIONS, DEFAULT_MAX_DOUBLINGS};

/// Iteration caps for the calibration search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Doublings tried on each side of the centre while bracketing.
    pub max_doublings: u32,
    /// Bisection steps before the search stops refining.
    pub max_bisections: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_doublings: DEFAULT_MAX_DOUBLINGS,
            max_bisections: DEFAULT_MAX_BISECTIONS,
        }
    }
}

impl SearchConfig {
    /// Set the bracketing cap.
    pub fn with_max_doublings(mut self, max_doublings: u32) -> Self {
        self.max_doublings = max_doublings;
        self
    }

    /// Set the bisection cap.
    pub fn with_max_bisections(mut self, max_bisections: u32) -> Self {
        self.max_bisections = max_bisections;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"max_doublings": 8}"#).unwrap();
        assert_eq!(config.max_doublings, 8);
        assert_eq!(config.max_bisections, DEFAULT_MAX_BISECTIONS);
    }

    #[test]
    fn setters_chain() {
        let config = SearchConfig::default()
            .with_max_doublings(4)
            .with_max_bisections(16);
        assert_eq!(config, SearchConfig { max_doublings: 4, max_bisections: 16 });
    }
}
