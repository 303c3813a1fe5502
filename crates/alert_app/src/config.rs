use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alert_core::{DecodeOptions, ExtractOptions};
use alert_engine::GmailSettings;
use alert_logging::LogDestination;
use anyhow::{anyhow, bail, Context, Result};
use log::LevelFilter;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILENAME: &str = "alert_harvester.ron";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gmail: GmailConfig,
    pub decode: DecodeOptions,
    pub extract: ExtractOptions,
    pub sink: SinkConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    pub base_url: String,
    pub user_id: String,
    pub query: String,
    /// Environment variable holding the OAuth access token.
    pub token_env: String,
    /// Fallback when the variable is unset.
    pub token_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for GmailConfig {
    fn default() -> Self {
        let defaults = GmailSettings::default();
        Self {
            base_url: defaults.base_url,
            user_id: defaults.user_id,
            query: defaults.query,
            token_env: "GMAIL_ACCESS_TOKEN".to_string(),
            token_file: None,
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            max_retries: defaults.max_retries,
            retry_backoff_ms: defaults.retry_backoff.as_millis() as u64,
        }
    }
}

impl GmailConfig {
    pub fn settings(&self) -> GmailSettings {
        GmailSettings {
            base_url: self.base_url.clone(),
            user_id: self.user_id.clone(),
            query: self.query.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    /// Access token from `token_env`, else the first line of `token_file`.
    pub fn access_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(&self.token_env) {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
        let Some(path) = &self.token_file else {
            bail!(
                "no access token: set {} or configure gmail.token_file",
                self.token_env
            );
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading token file {}", path.display()))?;
        let token = content.lines().next().unwrap_or("").trim();
        if token.is_empty() {
            bail!("token file {} is empty", path.display());
        }
        Ok(token.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum SinkConfig {
    Sqlite { path: PathBuf },
    Json { dir: PathBuf, filename: String },
    Memory,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Sqlite {
            path: PathBuf::from("alerts.sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogDestination,
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::Terminal,
            level: "info".to_string(),
            file: PathBuf::from("alert_harvester.log"),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| anyhow!("unknown log level {:?}", self.level))
    }
}

/// Load the RON config at `path`; a missing file means all defaults.
pub fn load(path: &Path) -> Result<AppConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading config {}", path.display()));
        }
    };
    parse(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let config: AppConfig = ron::from_str(content)?;
    config.log.level_filter()?;
    Ok(config)
}
