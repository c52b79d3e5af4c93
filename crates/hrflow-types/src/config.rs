//! Global configuration types for hrflow.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! engine retry policy, the HTTP listener and the role directory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.hrflow/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Role directory: role name to member identities.
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

/// Optimistic-concurrency retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Total attempts of the read-decide-write cycle before giving up.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,

    /// Base backoff; attempt `k` sleeps `k * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_commit_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    25
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: default_max_commit_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.engine.max_commit_attempts, 3);
        assert_eq!(config.engine.retry_backoff_ms, 25);
        assert_eq!(config.server.port, 3000);
        assert!(config.roles.is_empty());
    }

    #[test]
    fn test_global_config_deserialize_empty() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_commit_attempts, 3);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[engine]
max_commit_attempts = 5

[server]
port = 8080

[roles]
finance = ["fay", "finn"]
hr = ["hana"]
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.max_commit_attempts, 5);
        assert_eq!(config.engine.retry_backoff_ms, 25);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.roles["finance"], vec!["fay", "finn"]);
        assert_eq!(config.roles["hr"].len(), 1);
    }
}
