use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Empty when unset; a bad token only shows up as a failed API call.
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

/// Time zone used by the `/time` command.
#[derive(Debug, Deserialize, Clone)]
pub struct ClockConfig {
    #[serde(default = "default_zone_name")]
    pub zone_name: String,
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            webhook_path: default_webhook_path(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            zone_name: default_zone_name(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_zone_name() -> String {
    "Asia/Shanghai".to_string()
}

fn default_utc_offset_minutes() -> i32 {
    8 * 60
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Bot API base URL: `{api_url}/bot{token}`.
    pub fn api_base(&self) -> String {
        format!("{}/bot{}", self.api_url.trim_end_matches('/'), self.bot_token)
    }
}

impl Config {
    /// Load from a TOML file, or from the environment when the file is absent.
    /// `TELEGRAM_BOT_TOKEN` always wins over the file's token.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::from_env(&env)
        };

        if let Some(token) = env("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = token;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn from_env(env: &impl Fn(&str) -> Option<String>) -> Self {
        let mut server = ServerConfig::default();
        if let Some(bind) = env("WEBHOOK_BIND") {
            server.bind = bind;
        }
        Self {
            telegram: TelegramConfig::new(env("TELEGRAM_BOT_TOKEN").unwrap_or_default()),
            server,
            clock: ClockConfig::default(),
        }
    }

    /// The webhook path must be absolute and must not shadow the index page.
    fn validate(&self) -> Result<()> {
        let path = &self.server.webhook_path;
        anyhow::ensure!(
            path.starts_with('/'),
            "server.webhook_path must start with '/': {:?}",
            path
        );
        anyhow::ensure!(
            path.as_str() != "/",
            "server.webhook_path must not be \"/\" (reserved for the index page)"
        );
        Ok(())
    }

    pub fn api_base(&self) -> String {
        self.telegram.api_base()
    }
}
