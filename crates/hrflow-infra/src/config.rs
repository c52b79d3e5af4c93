//! Global configuration loader for hrflow.
//!
//! Reads `config.toml` from the data directory (`~/.hrflow/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;

use hrflow_core::resolver::RoleDirectoryResolver;
use hrflow_types::config::GlobalConfig;

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`GlobalConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => normalize(config),
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// At least one commit attempt is always made.
fn normalize(mut config: GlobalConfig) -> GlobalConfig {
    if config.engine.max_commit_attempts == 0 {
        tracing::warn!("engine.max_commit_attempts = 0 is invalid, using 1");
        config.engine.max_commit_attempts = 1;
    }
    config
}

/// Build the role directory from the `[roles]` table.
pub fn role_resolver(config: &GlobalConfig) -> RoleDirectoryResolver {
    RoleDirectoryResolver::new(config.roles.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrflow_core::resolver::ApproverResolver;
    use hrflow_types::template::ApproverRef;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.engine.max_commit_attempts, 3);
        assert_eq!(config.server.port, 3000);
        assert!(config.roles.is_empty());
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[engine]
max_commit_attempts = 5

[server]
port = 8080

[roles]
finance = ["fay", "finn"]
hr = ["hana"]
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.engine.max_commit_attempts, 5);
        assert_eq!(config.engine.retry_backoff_ms, 25);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.roles["finance"], vec!["fay", "finn"]);
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "[engine\nbroken = ")
            .await
            .unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.engine.max_commit_attempts, 3);
    }

    #[tokio::test]
    async fn zero_attempts_is_raised_to_one() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            "[engine]\nmax_commit_attempts = 0\n",
        )
        .await
        .unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.engine.max_commit_attempts, 1);
    }

    #[tokio::test]
    async fn role_resolver_uses_roles_table() {
        let mut config = GlobalConfig::default();
        config
            .roles
            .insert("hr".to_string(), vec!["hana".to_string()]);
        let resolver = role_resolver(&config);
        let members = resolver.resolve(&ApproverRef::role("hr")).await.unwrap();
        assert_eq!(members, vec!["hana"]);
    }
}
