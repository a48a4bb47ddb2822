use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const TOKEN_ENV: &str = "RELAYBOT_BOT_TOKEN";
const API_URL_ENV: &str = "RELAYBOT_API_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_storage_config")]
    pub storage: StorageConfig,
    #[serde(default = "default_assets_config")]
    pub assets: AssetsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Base URL of the Bot API; point this at a self-hosted server to bypass the public one.
    #[serde(default)]
    pub api_url: String,
}

impl TelegramConfig {
    /// Returns the effective api_url: the public Bot API when unset.
    pub fn effective_api_url(&self) -> &str {
        if self.api_url.is_empty() {
            DEFAULT_API_URL
        } else {
            &self.api_url
        }
    }

    pub fn api_url(&self) -> Result<Url> {
        Url::parse(self.effective_api_url())
            .with_context(|| format!("Invalid Bot API url: {}", self.effective_api_url()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Where uploaded attachments are archived
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    /// Directory holding image.jpg, video.mp4, pdf.pdf and sound.wav
    #[serde(default = "default_assets_dir")]
    pub directory: PathBuf,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("storage/bot.log")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_storage_config() -> StorageConfig {
    StorageConfig {
        directory: default_storage_dir(),
        log_file: default_log_file(),
    }
}

fn default_assets_config() -> AssetsConfig {
    AssetsConfig {
        directory: default_assets_dir(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Non-empty environment values replace the token and api_url from the file.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.telegram.api_url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "telegram.bot_token is empty (set it in the config file or {})",
                TOKEN_ENV
            );
        }
        self.telegram.api_url()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse("[telegram]\nbot_token = \"123:abc\"\n").unwrap();
        assert_eq!(config.telegram.effective_api_url(), "https://api.telegram.org");
        assert_eq!(config.storage.directory, PathBuf::from("storage"));
        assert_eq!(config.storage.log_file, PathBuf::from("storage/bot.log"));
        assert_eq!(config.assets.directory, PathBuf::from("files"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "123:abc"
api_url = "http://localhost:8081"

[storage]
directory = "/var/lib/relaybot"
log_file = "/var/log/relaybot.log"

[assets]
directory = "/srv/assets"
"#,
        )
        .unwrap();
        assert_eq!(
            config.telegram.api_url().unwrap().as_str(),
            "http://localhost:8081/"
        );
        assert_eq!(config.storage.directory, PathBuf::from("/var/lib/relaybot"));
        assert_eq!(config.assets.directory, PathBuf::from("/srv/assets"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::parse("[telegram]\nbot_token = \"file\"\n").unwrap();
        config.apply_env_overrides(|key| match key {
            TOKEN_ENV => Some("env".to_string()),
            API_URL_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.telegram.bot_token, "env");
        assert_eq!(config.telegram.effective_api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_empty_token_rejected() {
        let config = Config::parse("[telegram]\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let config =
            Config::parse("[telegram]\nbot_token = \"t\"\napi_url = \"not a url\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/relaybot.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
