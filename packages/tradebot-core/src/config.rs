//! Configuration loaded from TOML with environment overrides.
//!
//! Resolution order: built-in defaults, then the config file
//! (`TRADEBOT_CONFIG` or `<platform config dir>/tradebot/config.toml`), then
//! `TELEGRAM_BOT_TOKEN`, `TELEGRAM_WEBHOOK_SECRET`, `TRADEBOT_LEDGER_FILE` and
//! `TRADEBOT_BIND`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::JsonFileStorage;
use crate::Result;

/// Top-level TradeBot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Ledger JSON file; defaults to `~/.tradebot/ledger.json`
    pub ledger_file: Option<PathBuf>,
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub api_url: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls
    pub webhook_secret: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.telegram.org".to_string(),
            webhook_secret: None,
        }
    }
}

/// HTTP server and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load from the default config file and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific file (missing is fine) and the process environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "Reading config");
            Self::from_toml_str(&fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("TRADEBOT_CONFIG") {
            return PathBuf::from(path);
        }

        directories::ProjectDirs::from("", "", "tradebot")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("tradebot.toml"))
    }

    /// Override settings from environment-style variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram.token = Some(token);
        }
        if let Some(secret) = lookup("TELEGRAM_WEBHOOK_SECRET").filter(|s| !s.is_empty()) {
            self.telegram.webhook_secret = Some(secret);
        }
        if let Some(path) = lookup("TRADEBOT_LEDGER_FILE").filter(|p| !p.is_empty()) {
            self.ledger_file = Some(PathBuf::from(path));
        }
        if let Some(bind) = lookup("TRADEBOT_BIND").filter(|b| !b.is_empty()) {
            self.server.bind = bind;
        }
    }

    /// Ledger file to use.
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_file
            .clone()
            .unwrap_or_else(JsonFileStorage::default_path)
    }
}
