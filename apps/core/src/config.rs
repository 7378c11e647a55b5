use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR_NAME: &str = "handoff";
const CONFIG_FILE_NAME: &str = "config.toml";
const MAX_SHORTCUT_TTL_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A directory scanned for shortcuts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortcutRoot {
    pub path: PathBuf,
    #[serde(default)]
    pub recursive: bool,
}

impl ShortcutRoot {
    pub fn recursive(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: true,
        }
    }

    pub fn flat(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub icon_cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub shortcut_cache_ttl_secs: u64,
    /// Empty means the platform's well-known shortcut directories.
    pub shortcut_roots: Vec<ShortcutRoot>,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            database_path: base.join("handlers.sqlite3"),
            icon_cache_dir: base.join("icons"),
            log_dir: base.join("logs"),
            shortcut_cache_ttl_secs: 300,
            shortcut_roots: Vec::new(),
            config_path: base.join(CONFIG_FILE_NAME),
        }
    }
}

impl Config {
    pub fn effective_shortcut_roots(&self) -> Vec<ShortcutRoot> {
        if self.shortcut_roots.is_empty() {
            default_shortcut_roots()
        } else {
            self.shortcut_roots.clone()
        }
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| stable_app_data_dir().join(CONFIG_FILE_NAME));

    let mut cfg = if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)?;
        toml::from_str::<Config>(&raw)?
    } else {
        Config::default()
    };
    cfg.config_path = config_path;

    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg).map_err(ConfigError::Invalid)?;
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let encoded = toml::to_string_pretty(cfg)?;
    std::fs::write(&cfg.config_path, encoded)?;
    Ok(())
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if cfg.database_path.as_os_str().is_empty() {
        return Err("database_path is required".into());
    }

    if cfg.icon_cache_dir.as_os_str().is_empty() {
        return Err("icon_cache_dir is required".into());
    }

    if cfg.log_dir.as_os_str().is_empty() {
        return Err("log_dir is required".into());
    }

    if cfg.shortcut_cache_ttl_secs == 0 || cfg.shortcut_cache_ttl_secs > MAX_SHORTCUT_TTL_SECS {
        return Err("shortcut_cache_ttl_secs out of range".into());
    }

    if cfg
        .shortcut_roots
        .iter()
        .any(|root| root.path.as_os_str().is_empty())
    {
        return Err("shortcut_roots entries need a path".into());
    }

    Ok(())
}

#[cfg(target_os = "windows")]
pub fn default_shortcut_roots() -> Vec<ShortcutRoot> {
    let mut roots = Vec::new();
    if let Some(app_data) = std::env::var_os("APPDATA") {
        roots.push(ShortcutRoot::recursive(
            PathBuf::from(app_data).join(r"Microsoft\Windows\Start Menu\Programs"),
        ));
    }
    if let Some(program_data) = std::env::var_os("ProgramData") {
        roots.push(ShortcutRoot::recursive(
            PathBuf::from(program_data).join(r"Microsoft\Windows\Start Menu\Programs"),
        ));
    }
    if let Some(desktop) = dirs::desktop_dir() {
        roots.push(ShortcutRoot::flat(desktop));
    }
    if let Some(public) = std::env::var_os("PUBLIC") {
        roots.push(ShortcutRoot::flat(PathBuf::from(public).join("Desktop")));
    }
    roots
}

#[cfg(not(target_os = "windows"))]
pub fn default_shortcut_roots() -> Vec<ShortcutRoot> {
    let mut roots = Vec::new();
    if let Some(data) = dirs::data_dir() {
        roots.push(ShortcutRoot::recursive(data.join("applications")));
    }
    roots.push(ShortcutRoot::recursive("/usr/share/applications"));
    if let Some(desktop) = dirs::desktop_dir() {
        roots.push(ShortcutRoot::flat(desktop));
    }
    roots
}
