use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use assubot_core::CoreConfig;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when the config has an email but no password
pub const PASSWORD_ENV: &str = "ASSUBOT_PASSWORD";

/// CLI configuration: the core settings plus optional login credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub core: CoreConfig,

    /// Used to log in non-interactively when no stored session exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    /// Password from the config, else from `ASSUBOT_PASSWORD`
    pub fn resolve_password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()))
    }
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `~/.config/assubot/cli.json` (platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("assubot").join("cli.json"))
    }

    /// Explicit path if given, else the default file when it exists, else defaults.
    /// Environment overrides apply last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        Ok(Self {
            core: config.core.with_env_overrides(),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_minimal() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.core.api_base_url, "https://api.assubot.fr/api/v1");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_parse_config_with_credentials() {
        let json = r#"{
            "apiBaseUrl": "http://localhost:3000/api/v1",
            "realtime": {"maxReconnectAttempts": 2},
            "credentials": {"email": "jeanne@example.fr", "password": "secret"}
        }"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.core.api_base_url, "http://localhost:3000/api/v1");
        assert_eq!(config.core.realtime.max_reconnect_attempts, 2);
        assert_eq!(config.core.realtime.base_delay_ms, 1000);

        let creds = config.credentials.unwrap();
        assert_eq!(creds.email, "jeanne@example.fr");
        assert_eq!(creds.resolve_password().as_deref(), Some("secret"));
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = CliConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_resolve_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"processingPruneDelayMs": 500}}"#).unwrap();

        let config = CliConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.core.processing_prune_delay_ms, 500);
    }
}
