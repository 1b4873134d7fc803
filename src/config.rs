use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".timelog";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_INGEST_TIME: &str = "09:00";
pub const DEFAULT_SUBJECT_PREFIX: &str = "Your Daily Report";
pub const MIN_EMBEDDING_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mail_dir: PathBuf,
    pub sender_filter: Option<String>,
    pub subject_prefix: String,
    pub max_results: usize,
    pub ingest_time: String,
    pub db_path: PathBuf,
    pub api_port: u16,
    pub embedding_enabled: bool,
    pub embedding_api_key: Option<String>,
    pub embedding_api_base_url: String,
    pub embedding_model: String,
    pub embedding_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            mail_dir: root.join("inbox"),
            sender_filter: None,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            max_results: 1,
            ingest_time: DEFAULT_INGEST_TIME.to_string(),
            db_path: root.join("db").join("timelog.db"),
            api_port: 7891,
            embedding_enabled: true,
            embedding_api_key: None,
            embedding_api_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_timeout_seconds: 20,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.mail_dir).with_context(|| {
            format!(
                "Failed to create mail directory: {}",
                self.mail_dir.as_path().display()
            )
        })?;

        Ok(())
    }

    pub fn parse_ingest_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.ingest_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "mail_dir" => {
                self.mail_dir = expand_home(value.trim());
            }
            "sender_filter" => {
                self.sender_filter = (!value.trim().is_empty()).then(|| value.trim().to_string());
            }
            "subject_prefix" => {
                if value.trim().is_empty() {
                    bail!("subject_prefix must not be empty");
                }
                self.subject_prefix = value.trim().to_string();
            }
            "max_results" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("max_results must be a number"))?;
                if parsed == 0 {
                    bail!("max_results must be at least 1");
                }
                self.max_results = parsed;
            }
            "ingest_time" => {
                parse_hhmm(value)?;
                self.ingest_time = value.to_string();
            }
            "db_path" => {
                self.db_path = expand_home(value.trim());
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "embedding_enabled" => {
                self.embedding_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("embedding_enabled must be true/false"))?;
            }
            "embedding_api_key" => {
                self.embedding_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "embedding_api_base_url" => {
                self.embedding_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "embedding_model" => {
                self.embedding_model = value.trim().to_string();
            }
            "embedding_timeout_seconds" => {
                self.embedding_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("embedding_timeout_seconds must be a number"))?
                    .max(MIN_EMBEDDING_TIMEOUT_SECONDS);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: mail_dir|mail.dir, sender_filter|mail.sender, subject_prefix|mail.subject_prefix, max_results|mail.max_results, ingest_time|ingest.time, db_path|db.path, api_port|api.port, embedding_enabled|embedding.enabled, embedding_api_key|embedding.api_key, embedding_api_base_url|embedding.base_url, embedding_model|embedding.model, embedding_timeout_seconds|embedding.timeout_seconds"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "mail_dir" => Some(self.mail_dir.display().to_string()),
            "sender_filter" => Some(
                self.sender_filter
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "subject_prefix" => Some(self.subject_prefix.clone()),
            "max_results" => Some(self.max_results.to_string()),
            "ingest_time" => Some(self.ingest_time.clone()),
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "embedding_enabled" => Some(self.embedding_enabled.to_string()),
            "embedding_api_key" => Some(
                self.embedding_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "embedding_api_base_url" => Some(self.embedding_api_base_url.clone()),
            "embedding_model" => Some(self.embedding_model.clone()),
            "embedding_timeout_seconds" => Some(self.embedding_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "mail_dir" | "mail.dir" => "mail_dir",
        "sender_filter" | "mail.sender" => "sender_filter",
        "subject_prefix" | "mail.subject_prefix" => "subject_prefix",
        "max_results" | "mail.max_results" => "max_results",
        "ingest_time" | "ingest.time" => "ingest_time",
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "embedding_enabled" | "embedding.enabled" => "embedding_enabled",
        "embedding_api_key" | "embedding.api_key" => "embedding_api_key",
        "embedding_api_base_url" | "embedding.base_url" => "embedding_api_base_url",
        "embedding_model" | "embedding.model" => "embedding_model",
        "embedding_timeout_seconds" | "embedding.timeout_seconds" => "embedding_timeout_seconds",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 09:00 (24-hour format)",))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
