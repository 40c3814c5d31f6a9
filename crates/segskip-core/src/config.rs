use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::error::ConfigError;
use super::platform;
use super::segments::Category;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sponsorblock: SponsorBlockConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorBlockConfig {
    /// Master switch. When off, navigation never creates a handler.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Categories that are never auto-skipped; left for a manual skip.
    #[serde(default = "default_manual_skips")]
    pub manual_skips: Vec<Category>,
    #[serde(default)]
    pub categories: CategoryToggles,
}

/// One auto-skip switch per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryToggles {
    #[serde(default = "default_on")]
    pub sponsor: bool,
    #[serde(default = "default_on")]
    pub intro: bool,
    #[serde(default = "default_on")]
    pub outro: bool,
    #[serde(default = "default_on")]
    pub interaction: bool,
    #[serde(default = "default_on")]
    pub selfpromo: bool,
    #[serde(default = "default_on")]
    pub preview: bool,
    #[serde(default)]
    pub filler: bool,
    #[serde(default = "default_on")]
    pub music_offtopic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpvConfig {
    /// Explicit mpv binary; `mpv` from PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl CategoryToggles {
    pub fn get(&self, category: Category) -> bool {
        match category {
            Category::Sponsor => self.sponsor,
            Category::Intro => self.intro,
            Category::Outro => self.outro,
            Category::Interaction => self.interaction,
            Category::SelfPromo => self.selfpromo,
            Category::Preview => self.preview,
            Category::Filler => self.filler,
            Category::MusicOfftopic => self.music_offtopic,
        }
    }

    pub fn set(&mut self, category: Category, enabled: bool) {
        let slot = match category {
            Category::Sponsor => &mut self.sponsor,
            Category::Intro => &mut self.intro,
            Category::Outro => &mut self.outro,
            Category::Interaction => &mut self.interaction,
            Category::SelfPromo => &mut self.selfpromo,
            Category::Preview => &mut self.preview,
            Category::Filler => &mut self.filler,
            Category::MusicOfftopic => &mut self.music_offtopic,
        };
        *slot = enabled;
    }
}

impl Default for SponsorBlockConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            manual_skips: default_manual_skips(),
            categories: CategoryToggles::default(),
        }
    }
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            sponsor: true,
            intro: true,
            outro: true,
            interaction: true,
            selfpromo: true,
            preview: true,
            filler: false,
            music_offtopic: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_on() -> bool {
    true
}

fn default_api_url() -> String {
    crate::repository::DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_manual_skips() -> Vec<Category> {
    vec![Category::Intro, Category::Outro, Category::Filler]
}

fn default_api_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sponsorblock: SponsorBlockConfig::default(),
            api: ApiConfig::default(),
            mpv: MpvConfig::default(),
        }
    }
}

// ── key/value access ──────────────────────────────────────────────────────────

/// Runtime-settable keys: `enabled`, `manual_skips`, `category.<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Enabled,
    ManualSkips,
    Category(Category),
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(ConfigKey::Enabled),
            "manual_skips" => Ok(ConfigKey::ManualSkips),
            _ => s
                .strip_prefix("category.")
                .and_then(|name| name.parse::<Category>().ok())
                .map(ConfigKey::Category)
                .ok_or_else(|| ConfigError::UnknownKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Categories(Vec<Category>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub key: ConfigKey,
    pub value: ConfigValue,
}

/// Shared configuration with change notification.
///
/// Writes go to memory, then to disk (when backed by a file), then out to
/// every subscriber. Readers take a snapshot; nothing holds the lock across
/// a scheduling pass.
pub struct ConfigStore {
    config: RwLock<Config>,
    path: Option<PathBuf>,
    changes: broadcast::Sender<ConfigChange>,
}

impl ConfigStore {
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(32);
        Self {
            config: RwLock::new(config),
            path,
            changes,
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(config, None)
    }

    pub fn snapshot(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }

    pub fn read(&self, key: &str) -> Result<ConfigValue, ConfigError> {
        let key: ConfigKey = key.parse()?;
        let config = self.snapshot();
        let sb = &config.sponsorblock;
        Ok(match key {
            ConfigKey::Enabled => ConfigValue::Bool(sb.enabled),
            ConfigKey::ManualSkips => ConfigValue::Categories(sb.manual_skips.clone()),
            ConfigKey::Category(category) => ConfigValue::Bool(sb.categories.get(category)),
        })
    }

    pub fn write(&self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        let parsed: ConfigKey = key.parse()?;
        let updated = {
            let mut config = self
                .config
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let sb = &mut config.sponsorblock;
            match (parsed, &value) {
                (ConfigKey::Enabled, ConfigValue::Bool(on)) => sb.enabled = *on,
                (ConfigKey::Category(category), ConfigValue::Bool(on)) => {
                    sb.categories.set(category, *on)
                }
                (ConfigKey::ManualSkips, ConfigValue::Categories(list)) => {
                    let mut list = list.clone();
                    let mut seen = Vec::with_capacity(list.len());
                    list.retain(|c| {
                        let first = !seen.contains(c);
                        seen.push(*c);
                        first
                    });
                    sb.manual_skips = list;
                }
                (ConfigKey::ManualSkips, _) => {
                    return Err(ConfigError::TypeMismatch {
                        key: key.to_string(),
                        expected: "a list of categories",
                    })
                }
                _ => {
                    return Err(ConfigError::TypeMismatch {
                        key: key.to_string(),
                        expected: "a boolean",
                    })
                }
            }
            config.clone()
        };

        info!("Config: {} set to {:?}", key, value);
        if let Some(path) = &self.path {
            if let Err(e) = updated.save_to(path) {
                warn!("Config: failed to persist {:?}: {}", path, e);
            }
        }

        // No subscribers is fine
        let _ = self.changes.send(ConfigChange {
            key: parsed,
            value,
        });
        Ok(())
    }
}
