//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys are loaded from GEMINI_API_KEYS / GEMINI_API_KEY / GOOGLE_API_KEY
//! or api_keys_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Resolved from the environment or `gemini.api_keys_file`, in order.
    #[serde(skip)]
    pub api_keys: Vec<Secret<String>>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Hosted model settings
#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// File with one API key per line (alternative to the env vars)
    #[serde(default)]
    pub api_keys_file: Option<PathBuf>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout(),
            api_keys_file: None,
        }
    }
}

/// Retry and cooldown knobs for key rotation
#[derive(Debug, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            retry_budget: default_retry_budget(),
            backoff_ms: default_backoff_ms(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl RotationConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Document store location
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_max_connections() -> usize {
    256
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_model() -> String {
    "gemini-1.5-flash".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_timeout() -> u64 {
    60
}

fn default_retry_budget() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/news.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. GEMINI_API_KEYS env var (comma separated)
    /// 2. GEMINI_API_KEY, then GOOGLE_API_KEY (single key)
    /// 3. api_keys_file path from config
    ///
    /// An empty key list is not rejected here; the key pool refuses to start
    /// without keys.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            let model = model.trim();
            if !model.is_empty() {
                config.gemini.model = model.to_owned();
            }
        }

        config.validate()?;
        config.api_keys = resolve_api_keys(config.gemini.api_keys_file.as_deref())?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.gemini.base_url.starts_with("http://")
            && !self.gemini.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.gemini.base_url
            )));
        }

        if self.gemini.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.rotation.retry_budget == 0 {
            return Err(common::Error::Config(
                "retry_budget must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("news-desk.toml")
    }
}

fn resolve_api_keys(keys_file: Option<&Path>) -> common::Result<Vec<Secret<String>>> {
    if let Ok(list) = std::env::var("GEMINI_API_KEYS") {
        let keys = split_keys(&list, ',');
        if !keys.is_empty() {
            return Ok(keys);
        }
    }

    for var in ["GEMINI_API_KEY", "GOOGLE_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            let keys = split_keys(&key, ',');
            if !keys.is_empty() {
                return Ok(keys);
            }
        }
    }

    if let Some(file) = keys_file {
        let contents = std::fs::read_to_string(file).map_err(|e| {
            common::Error::Config(format!(
                "failed to read api_keys_file {}: {e}",
                file.display()
            ))
        })?;
        return Ok(split_keys(&contents, '\n'));
    }

    Ok(Vec::new())
}

/// Split, trim and drop blanks, keeping order.
fn split_keys(raw: &str, separator: char) -> Vec<Secret<String>> {
    raw.split(separator)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| Secret::new(k.to_owned()))
        .collect()
}
