use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const LOG_LEVEL_KEY: &str = "ZEN_BRIDGE_LOG_LEVEL";
pub const LOG_DIR_KEY: &str = "ZEN_BRIDGE_LOG_DIR";
pub const LOG_FILE_KEY: &str = "ZEN_BRIDGE_LOG_FILE";
pub const STRICT_TEMPLATES_KEY: &str = "ZEN_BRIDGE_STRICT_TEMPLATES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("invalid value `{value}` for {key}")]
    Invalid { key: String, value: String },
}

/// A read-only key/value source of settings.
pub trait ConfigManagerType: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn debug_box(&self) -> String;
}

pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Process environment, optionally seeded from a `.env` file.
///
/// Variables already set in the environment win over the file. A missing
/// file is fine; one that does not parse is an error.
#[derive(Clone, Debug)]
pub struct EnvConfigManager {
    env_file: PathBuf,
    loaded: bool,
}

impl EnvConfigManager {
    pub fn new(env_file: PathBuf) -> Result<Box<Self>, ConfigError> {
        let loaded = env_file.exists();
        if loaded {
            dotenvy::from_path(&env_file).map_err(|source| ConfigError::EnvFile {
                path: env_file.clone(),
                source,
            })?;
        }

        Ok(Box::new(Self { env_file, loaded }))
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    /// Whether the `.env` file existed and was applied.
    pub fn loaded(&self) -> bool {
        self.loaded
    }
}

impl ConfigManagerType for EnvConfigManager {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn debug_box(&self) -> String {
        "EnvConfigManager".to_string()
    }
}

/// Fixed in-memory settings, for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct MapConfigManager {
    map: DashMap<String, String>,
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigManager {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl ConfigManagerType for MapConfigManager {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}

/// Settings of the bridge binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub log_file: String,
    pub strict_templates: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            log_file: "zen-bridge.log".to_string(),
            strict_templates: false,
        }
    }
}

impl BridgeConfig {
    pub fn load(config: &ConfigManager) -> Result<Self, ConfigError> {
        let source = &config.0;
        let defaults = Self::default();

        let strict_templates = match source.get(STRICT_TEMPLATES_KEY) {
            Some(raw) => parse_bool(STRICT_TEMPLATES_KEY, &raw)?,
            None => defaults.strict_templates,
        };

        Ok(Self {
            log_level: non_empty(source.get(LOG_LEVEL_KEY)).unwrap_or(defaults.log_level),
            log_dir: non_empty(source.get(LOG_DIR_KEY)).map(PathBuf::from),
            log_file: non_empty(source.get(LOG_FILE_KEY)).unwrap_or(defaults.log_file),
            strict_templates,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
