//! Pod service configuration.
//!
//! Configuration is loaded from environment variables. The auth challenge is
//! redacted in Debug output.

use crate::actors::{ControllerLimits, DEFAULT_MAX_PODS, DEFAULT_SHARD_COUNT};
use crate::pods::DEFAULT_MAX_MEMBERS_PER_POD;
use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Default signaling (WebSocket) bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health and metrics bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "pod";

/// Pod service configuration.
#[derive(Clone)]
pub struct Config {
    /// Signaling server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Unique identifier for this instance, used in logs.
    pub instance_id: String,

    /// Number of shard actors pods are spread across.
    pub shard_count: usize,

    /// Maximum live pods on this instance.
    pub max_pods: usize,

    /// Maximum members in a single pod.
    pub max_members_per_pod: usize,

    /// Message clients sign to prove key ownership.
    pub auth_challenge: String,

    pub observability: ObservabilityConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("instance_id", &self.instance_id)
            .field("shard_count", &self.shard_count)
            .field("max_pods", &self.max_pods)
            .field("max_members_per_pod", &self.max_members_per_pod)
            .field("auth_challenge", &"[REDACTED]")
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// `MissingEnvVar` if `POD_AUTH_CHALLENGE` is unset or empty,
    /// `InvalidValue` if a numeric limit does not parse or is zero.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_challenge = vars
            .get("POD_AUTH_CHALLENGE")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("POD_AUTH_CHALLENGE".to_string()))?
            .clone();

        let bind_address = vars
            .get("POD_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("POD_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let instance_id = vars.get("POD_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let suffix = Uuid::new_v4().simple().to_string();
            format!(
                "{DEFAULT_INSTANCE_ID_PREFIX}-{}",
                suffix.get(..8).unwrap_or(&suffix)
            )
        });

        let shard_count = parse_limit(vars, "POD_SHARD_COUNT", DEFAULT_SHARD_COUNT)?;
        let max_pods = parse_limit(vars, "POD_MAX_PODS", DEFAULT_MAX_PODS)?;
        let max_members_per_pod =
            parse_limit(vars, "POD_MAX_MEMBERS_PER_POD", DEFAULT_MAX_MEMBERS_PER_POD)?;

        Ok(Self {
            bind_address,
            health_bind_address,
            instance_id,
            shard_count,
            max_pods,
            max_members_per_pod,
            auth_challenge,
            observability: ObservabilityConfig::from_vars(vars),
        })
    }

    /// Controller limits derived from this configuration.
    #[must_use]
    pub fn limits(&self) -> ControllerLimits {
        ControllerLimits {
            shard_count: self.shard_count,
            max_pods: self.max_pods,
            max_members_per_pod: self.max_members_per_pod,
        }
    }
}

/// Parse a positive integer, falling back to `default` when unset.
fn parse_limit<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => Err(ConfigError::InvalidValue(format!(
            "{key} must be a positive integer, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "POD_AUTH_CHALLENGE".to_string(),
            "sign-in to pods".to_string(),
        )])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.shard_count, 8);
        assert_eq!(config.max_pods, 1000);
        assert_eq!(config.max_members_per_pod, 500);
        assert!(config.instance_id.starts_with("pod-"));
        assert!(!config.observability.json_logs);
        assert_eq!(config.limits(), ControllerLimits::default());
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("POD_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("POD_INSTANCE_ID".to_string(), "pod-test-1".to_string());
        vars.insert("POD_SHARD_COUNT".to_string(), "2".to_string());
        vars.insert("POD_MAX_PODS".to_string(), "10".to_string());
        vars.insert("POD_MAX_MEMBERS_PER_POD".to_string(), "3".to_string());
        vars.insert("POD_LOG_JSON".to_string(), "true".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.instance_id, "pod-test-1");
        assert_eq!(
            config.limits(),
            ControllerLimits {
                shard_count: 2,
                max_pods: 10,
                max_members_per_pod: 3,
            }
        );
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_missing_challenge() {
        let err = Config::from_vars(&HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "POD_AUTH_CHALLENGE"));

        let vars = HashMap::from([("POD_AUTH_CHALLENGE".to_string(), String::new())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_invalid_limits() {
        for (key, value) in [
            ("POD_SHARD_COUNT", "0"),
            ("POD_MAX_PODS", "lots"),
            ("POD_MAX_MEMBERS_PER_POD", "-1"),
        ] {
            let mut vars = base_vars();
            vars.insert(key.to_string(), value.to_string());
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidValue(_))),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_redacts_challenge() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sign-in to pods"));
    }
}
