use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::DEFAULT_UNDO_DEPTH;
use crate::queue_builder::DEFAULT_BATCH_SIZE;
use crate::remote::client::DEFAULT_PAGE_SIZE;
use crate::remote::spotify::DEFAULT_API_BASE_URL;
use crate::retry::{BackoffPolicy, RetryMode};
use crate::session::{CollectionRefs, DEFAULT_PRIMARY_NAME, DEFAULT_SECONDARY_NAME};
use swipify_common::CollectionRole;

const PRIMARY_ENV: &str = "SWIPIFY_PRIMARY_COLLECTION";
const SECONDARY_ENV: &str = "SWIPIFY_SECONDARY_COLLECTION";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_primary_name() -> String {
    DEFAULT_PRIMARY_NAME.to_string()
}

fn default_secondary_name() -> String {
    DEFAULT_SECONDARY_NAME.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    16_000
}

fn default_undo_depth() -> usize {
    DEFAULT_UNDO_DEPTH
}

/// On-disk shape of `config.yaml`. Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigYaml {
    #[serde(default = "default_primary_name")]
    pub primary_collection_name: String,
    #[serde(default = "default_secondary_name")]
    pub secondary_collection_name: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Items per metadata lookup while filtering
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default)]
    pub retry_mode: RetryMode,
    #[serde(default = "default_undo_depth")]
    pub undo_depth: usize,
    /// Session snapshot location. None = `state.json` next to the config.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

/// Application configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SwipifyConfig {
    /// Directory holding `config.yaml` (and by default the state file)
    pub config_dir: PathBuf,
    pub primary_collection_name: String,
    pub secondary_collection_name: String,
    pub page_size: usize,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub retry_mode: RetryMode,
    pub undo_depth: usize,
    pub state_path: PathBuf,
    pub api_base_url: String,
}

impl SwipifyConfig {
    /// Defaults rooted at `config_dir`.
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self {
            state_path: config_dir.join("state.json"),
            config_dir,
            primary_collection_name: default_primary_name(),
            secondary_collection_name: default_secondary_name(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            retry_mode: RetryMode::default(),
            undo_depth: DEFAULT_UNDO_DEPTH,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    pub fn load() -> Self {
        let dev_mode = std::env::var("SWIPIFY_DEV_MODE").is_ok() || dotenvy::dotenv().is_ok();
        if dev_mode {
            info!("Dev mode activated - loading from .env");
            Self::from_env()
        } else {
            info!("Production mode - loading from config.yaml");
            Self::from_config_file()
        }
    }

    fn from_env() -> Self {
        let config_dir = env_value::<PathBuf>("SWIPIFY_CONFIG_DIR").unwrap_or_else(default_dir);
        let defaults = Self::with_dir(config_dir);

        Self {
            primary_collection_name: env_value(PRIMARY_ENV)
                .unwrap_or(defaults.primary_collection_name),
            secondary_collection_name: env_value(SECONDARY_ENV)
                .unwrap_or(defaults.secondary_collection_name),
            page_size: env_value("SWIPIFY_PAGE_SIZE").unwrap_or(defaults.page_size),
            batch_size: env_value("SWIPIFY_BATCH_SIZE").unwrap_or(defaults.batch_size),
            max_attempts: env_value("SWIPIFY_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            backoff_base_ms: env_value("SWIPIFY_BACKOFF_BASE_MS")
                .unwrap_or(defaults.backoff_base_ms),
            backoff_max_ms: env_value("SWIPIFY_BACKOFF_MAX_MS").unwrap_or(defaults.backoff_max_ms),
            retry_mode: env_value("SWIPIFY_RETRY_MODE").unwrap_or(defaults.retry_mode),
            undo_depth: env_value("SWIPIFY_UNDO_DEPTH").unwrap_or(defaults.undo_depth),
            state_path: env_value("SWIPIFY_STATE_PATH").unwrap_or(defaults.state_path),
            api_base_url: env_value("SWIPIFY_API_BASE_URL").unwrap_or(defaults.api_base_url),
            config_dir: defaults.config_dir,
        }
    }

    fn from_config_file() -> Self {
        let dir = default_dir();
        match Self::load_from_dir(&dir) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable config in {}: {}", dir.display(), e);
                Self::with_dir(dir)
            }
        }
    }

    /// Read `config.yaml` from `dir`. A missing file yields the defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join("config.yaml");
        if !config_path.exists() {
            info!("No config.yaml at {}, using defaults", config_path.display());
            return Ok(Self::with_dir(dir.to_path_buf()));
        }
        let yaml: ConfigYaml = serde_yaml::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        Ok(Self::from_yaml(dir.to_path_buf(), yaml))
    }

    fn from_yaml(config_dir: PathBuf, yaml: ConfigYaml) -> Self {
        Self {
            state_path: yaml
                .state_path
                .unwrap_or_else(|| config_dir.join("state.json")),
            api_base_url: yaml
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            config_dir,
            primary_collection_name: yaml.primary_collection_name,
            secondary_collection_name: yaml.secondary_collection_name,
            page_size: yaml.page_size,
            batch_size: yaml.batch_size,
            max_attempts: yaml.max_attempts,
            backoff_base_ms: yaml.backoff_base_ms,
            backoff_max_ms: yaml.backoff_max_ms,
            retry_mode: yaml.retry_mode,
            undo_depth: yaml.undo_depth,
        }
    }

    pub fn is_dev_mode() -> bool {
        std::env::var("SWIPIFY_DEV_MODE").is_ok() || Path::new(".env").exists()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if Self::is_dev_mode() {
            self.save_to_env(Path::new(".env"))
        } else {
            self.save_to_config_yaml()
        }
    }

    /// Write the collection names into a `.env` file. Other entries are
    /// kept as they are.
    pub fn save_to_env(&self, env_path: &Path) -> Result<(), ConfigError> {
        let existing = match std::fs::read_to_string(env_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let names = [
            (PRIMARY_ENV, &self.primary_collection_name),
            (SECONDARY_ENV, &self.secondary_collection_name),
        ];

        let mut text: String = existing
            .lines()
            .filter(|line| match line.split_once('=') {
                Some((key, _)) => !names.iter().any(|(name, _)| *name == key.trim()),
                None => true,
            })
            .map(|line| format!("{line}\n"))
            .collect();
        for (key, value) in names {
            text.push_str(&format!("{key}={}\n", quote_env(value)));
        }
        std::fs::write(env_path, text)?;
        Ok(())
    }

    pub fn save_to_config_yaml(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.config_dir)?;
        let yaml = ConfigYaml {
            primary_collection_name: self.primary_collection_name.clone(),
            secondary_collection_name: self.secondary_collection_name.clone(),
            page_size: self.page_size,
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            backoff_base_ms: self.backoff_base_ms,
            backoff_max_ms: self.backoff_max_ms,
            retry_mode: self.retry_mode,
            undo_depth: self.undo_depth,
            state_path: Some(self.state_path.clone()),
            api_base_url: Some(self.api_base_url.clone()),
        };
        let text =
            serde_yaml::to_string(&yaml).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        std::fs::write(self.config_dir.join("config.yaml"), text)?;
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
            mode: self.retry_mode,
        }
    }

    pub fn set_collection_name(&mut self, role: CollectionRole, name: &str) {
        let slot = match role {
            CollectionRole::Primary => &mut self.primary_collection_name,
            CollectionRole::Secondary => &mut self.secondary_collection_name,
        };
        *slot = name.to_string();
    }

    pub fn collection_refs(&self) -> CollectionRefs {
        CollectionRefs::new(&self.primary_collection_name, &self.secondary_collection_name)
    }
}

/// `~/.swipify`
fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".swipify")
}

/// Double-quoted `.env` value; names may hold spaces, quotes or `$`.
fn quote_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Non-empty environment value parsed as `T`. Unparseable values are
/// logged and ignored.
fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok().filter(|s| !s.trim().is_empty())?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={}", key, raw);
            None
        }
    }
}
