//! Common configuration types for pod components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default tracing filter when neither `RUST_LOG` nor `POD_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level / filter directive (trace, debug, info, warn, error)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read `POD_LOG_LEVEL` and `POD_LOG_JSON` from a variable map.
    ///
    /// Unparseable booleans fall back to plain-text logs.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let log_level = vars
            .get("POD_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_logs = vars
            .get("POD_LOG_JSON")
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        Self {
            log_level,
            json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_defaults() {
        let config = ObservabilityConfig::from_vars(&HashMap::new());
        assert_eq!(config, ObservabilityConfig::default());
    }

    #[test]
    fn test_observability_from_vars() {
        let vars = HashMap::from([
            ("POD_LOG_LEVEL".to_string(), "debug".to_string()),
            ("POD_LOG_JSON".to_string(), "true".to_string()),
        ]);
        let config = ObservabilityConfig::from_vars(&vars);
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
    }

    #[test]
    fn test_observability_bad_bool_falls_back() {
        let vars = HashMap::from([("POD_LOG_JSON".to_string(), "yes please".to_string())]);
        assert!(!ObservabilityConfig::from_vars(&vars).json_logs);
    }
}
