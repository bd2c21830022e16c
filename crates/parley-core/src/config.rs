//! Configuration file management for Parley.
//!
//! Reads `~/.config/parley/config.toml`. A missing file yields defaults;
//! selected values can be overridden from the environment.

use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "PARLEY_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "PARLEY_AUTH_TOKEN";

/// Root configuration structure for config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub backend: BackendConfig,
    pub conversation: ConversationConfig,
}

/// Backend endpoint configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub start_path: String,
    pub chat_path: String,
    pub request_timeout_secs: u64,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            start_path: "/chat/start".to_string(),
            chat_path: "/chat/send".to_string(),
            request_timeout_secs: 60,
            auth_token: None,
        }
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("start_path", &self.start_path)
            .field("chat_path", &self.chat_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn start_url(&self) -> String {
        join_url(&self.base_url, &self.start_path)
    }

    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }
}

/// Conversation pacing and opening configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// The fixed signal sent with the start call.
    pub begin_message: String,
    /// Delay between revealed persona messages, in milliseconds.
    pub reveal_delay_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            begin_message: "begin".to_string(),
            reveal_delay_ms: 1200,
        }
    }
}

impl ConversationConfig {
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }
}

impl ParleyConfig {
    /// Loads configuration from `path`, or from the default location when
    /// `path` is `None`, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file. A missing or blank file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&content).map_err(|e| {
            ParleyError::config(format!(
                "Failed to parse configuration file at {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies `PARLEY_*` overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url.trim().to_string();
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.backend.auth_token = Some(token.trim().to_string());
        }
    }

    /// Checks values that would make every exchange fail.
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ParleyError::config("backend.base_url must not be empty"));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ParleyError::config(
                "backend.request_timeout_secs must be greater than zero",
            ));
        }
        if self.conversation.begin_message.trim().is_empty() {
            return Err(ParleyError::config(
                "conversation.begin_message must not be empty",
            ));
        }
        Ok(())
    }
}

/// Returns the path to the configuration file: ~/.config/parley/config.toml
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ParleyError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("parley").join("config.toml"))
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
