use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    API_BASE_URL, CACHE_KEEP_UNUSED_SECS, DEFAULT_NAMESPACE, MAX_RECONNECT_ATTEMPTS,
    PROCESSING_PRUNE_DELAY_MS, RECONNECT_BASE_DELAY_MS, SOCKET_IO_PATH,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid API base URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Core configuration, loadable from a camelCase JSON file.
/// Every field has a default so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub api_base_url: String,
    pub realtime: RealtimeConfig,
    pub processing_prune_delay_ms: u64,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeConfig {
    pub base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub keep_unused_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            realtime: RealtimeConfig::default(),
            processing_prune_delay_ms: PROCESSING_PRUNE_DELAY_MS,
            cache: CacheConfig::default(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: RECONNECT_BASE_DELAY_MS,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            keep_unused_secs: CACHE_KEEP_UNUSED_SECS,
        }
    }
}

impl CoreConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `ASSUBOT_API_URL` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("ASSUBOT_API_URL") {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
        self
    }

    pub fn prune_delay(&self) -> Duration {
        Duration::from_millis(self.processing_prune_delay_ms)
    }

    /// Period at which long-running front-ends evict unobserved cache entries
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.keep_unused_secs.max(1))
    }

    /// Websocket URL of the push channel.
    ///
    /// The backend origin is the REST base URL with everything from the first
    /// `/api` path segment stripped.
    pub fn realtime_url(&self) -> Result<Url, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidUrl {
            url: self.api_base_url.clone(),
            message,
        };

        let mut url = Url::parse(&self.api_base_url).map_err(|e| invalid(e.to_string()))?;

        let prefix: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .take_while(|s| *s != "api")
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(invalid(format!("unsupported scheme {}", other))),
        };
        url.set_scheme(scheme)
            .map_err(|_| invalid("cannot change scheme".to_string()))?;

        let mut path = String::new();
        for segment in &prefix {
            path.push('/');
            path.push_str(segment);
        }
        path.push_str(SOCKET_IO_PATH);
        url.set_path(&path);
        url.set_query(Some("EIO=4&transport=websocket"));
        url.set_fragment(None);
        Ok(url)
    }
}
