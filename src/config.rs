use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_CACHE_LIMIT;
use crate::theme::DEFAULT_SCHEME;

const DEFAULT_ENV_PREFIX: &str = "GOPHER_TUI";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_color_scheme")]
    pub color_scheme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            color_scheme: default_color_scheme(),
        }
    }
}

fn default_color_scheme() -> String {
    DEFAULT_SCHEME.into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_idle_threshold", with = "humantime_serde")]
    pub idle_threshold: Duration,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            idle_threshold: default_idle_threshold(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_idle_threshold() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_response_bytes() -> usize {
    1024 * 1024
}

fn default_user_agent() -> String {
    format!("gopher-tui/{}", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_cache_limit_bytes")]
    pub cache_limit_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cache_limit_bytes: default_cache_limit_bytes(),
        }
    }
}

fn default_cache_limit_bytes() -> usize {
    DEFAULT_CACHE_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DownloadConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl DownloadConfig {
    pub fn target(&self, file_name: &str) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.ui.color_scheme.is_empty() {
        base.ui.color_scheme = other.ui.color_scheme;
    }

    if !other.network.poll_interval.is_zero() {
        base.network.poll_interval = other.network.poll_interval;
    }
    base.network.idle_threshold = other.network.idle_threshold;
    if !other.network.timeout.is_zero() {
        base.network.timeout = other.network.timeout;
    }
    if !other.network.connect_timeout.is_zero() {
        base.network.connect_timeout = other.network.connect_timeout;
    }
    if other.network.max_response_bytes != 0 {
        base.network.max_response_bytes = other.network.max_response_bytes;
    }
    if !other.network.user_agent.trim().is_empty() {
        base.network.user_agent = other.network.user_agent;
    }

    if other.history.cache_limit_bytes != 0 {
        base.history.cache_limit_bytes = other.history.cache_limit_bytes;
    }

    if other.downloads.directory.is_some() {
        base.downloads.directory = other.downloads.directory;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "ui.color_scheme" => cfg.ui.color_scheme = value,
        "network.poll_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.network.poll_interval = duration;
            }
        }
        "network.idle_threshold" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.network.idle_threshold = duration;
            }
        }
        "network.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.network.timeout = duration;
            }
        }
        "network.connect_timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.network.connect_timeout = duration;
            }
        }
        "network.max_response_bytes" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.network.max_response_bytes = parsed;
            }
        }
        "network.user_agent" => cfg.network.user_agent = value,
        "history.cache_limit_bytes" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.history.cache_limit_bytes = parsed;
            }
        }
        "downloads.directory" => cfg.downloads.directory = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gopher-tui").join("config.yaml"))
}
