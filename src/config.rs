use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{ChatError, ChatResult, RetryConfig};
use crate::transcript::DEFAULT_GREETING;

pub const DEFAULT_BASE_URL: &str = "https://megathon-24.onrender.com";
pub const BASE_URL_ENV: &str = "MOODCHAT_BASE_URL";
pub const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "moodchat";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub retry: RetryConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub greeting: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl BackendConfig {
    pub fn url(&self) -> ChatResult<Url> {
        parse_base_url(&self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// `<config_dir>/moodchat/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads `path` when given (it must exist), else the default location when
    /// present, else the built-in defaults.
    pub fn load(path: Option<&Path>) -> ChatResult<Self> {
        let path = match path {
            Some(p) => Some(expand_path(p)?),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let Some(path) = path else {
            debug!("no config file, using defaults");
            return Ok(Config::default());
        };

        debug!(path = %path.display(), "loading config");
        let raw = fs::read_to_string(&path).map_err(|e| {
            ChatError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::parse(&raw)?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> ChatResult<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the environment override; `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env<F>(&mut self, lookup: F) -> ChatResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(BASE_URL_ENV) {
            self.backend.base_url = parse_base_url(&raw)?.to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> ChatResult<()> {
        self.backend.url()?;
        if self.backend.timeout_secs == 0 {
            return Err(ChatError::config("backend.timeout_secs must be greater than 0"));
        }
        if self.chat.greeting.trim().is_empty() {
            return Err(ChatError::config("chat.greeting must not be blank"));
        }
        self.retry.validate()?;
        Ok(())
    }

    pub fn to_toml(&self) -> ChatResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ChatError::config(format!("cannot serialize config: {e}")))
    }
}

pub fn parse_base_url(raw: &str) -> ChatResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ChatError::config(format!("invalid base URL {raw:?}: {e}")))?;
    check_scheme(&url)?;
    Ok(url)
}

fn check_scheme(url: &Url) -> ChatResult<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ChatError::config(format!(
            "base URL must be http or https, got {other}"
        ))),
    }
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &Path) -> ChatResult<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map_err(|e| ChatError::config(format!("cannot expand {raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
