use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};
use tracing::debug;

pub const CONFIG_DIR_NAME: &str = ".stylecast";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_TEXT_PROVIDER: &str = "openai";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEXT_API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

pub const DEFAULT_IMAGE_PROVIDER: &str = "gemini";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_IMAGE_API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

pub const DEFAULT_STYLE_GUIDE_DIR: &str = "style-guides";
pub const DEFAULT_IMAGE_OUTPUT_DIR: &str = "images";
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_ANALYSIS_FAILURE_POLICY: &str = "abort";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    ConfigDirUnavailable,
    #[error("failed to read or write configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level scalars come before the tables so the file serializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style_guide_dir: String,
    pub image_output_dir: String,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub analysis_failure_policy: String,
    pub log_level: String,
    pub text: TextSettings,
    pub image: ImageSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style_guide_dir: DEFAULT_STYLE_GUIDE_DIR.to_string(),
            image_output_dir: DEFAULT_IMAGE_OUTPUT_DIR.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            analysis_failure_policy: DEFAULT_ANALYSIS_FAILURE_POLICY.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            text: TextSettings::default(),
            image: ImageSettings::default(),
        }
    }
}

/// Model used to write style guides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub provider: String,
    pub model: String,
    pub api_key_env_var: String,
    pub temperature: f64,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_TEXT_PROVIDER.to_string(),
            model: DEFAULT_TEXT_MODEL.to_string(),
            api_key_env_var: DEFAULT_TEXT_API_KEY_ENV_VAR.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Model used to render images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub provider: String,
    pub model: String,
    pub api_key_env_var: String,
    pub aspect_ratio: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_IMAGE_PROVIDER.to_string(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            api_key_env_var: DEFAULT_IMAGE_API_KEY_ENV_VAR.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
        }
    }
}

/// Value of the named environment variable, ignoring blank values.
pub fn api_key_from_env(env_var: &str) -> Option<String> {
    let name = env_var.trim();
    if name.is_empty() {
        return None;
    }
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Loads the stylecast configuration from disk, creating a default file if absent.
///
/// An existing file that lacks some keys is rewritten with the defaults filled
/// in, so the file on disk always lists every setting.
pub fn load_or_init() -> Result<LoadOutcome, ConfigError> {
    let path = config_file_path()?;

    if path.exists() {
        let contents = fs::read_to_string(&path)?;
        let raw: Table = toml::from_str(&contents)?;
        let config: Config = toml::from_str(&contents)?;

        let updated = has_missing_keys(&config, &raw)?;
        if updated {
            debug!(path = %path.display(), "backfilling missing configuration keys");
            save(&config, &path)?;
        }

        Ok(LoadOutcome {
            config,
            path,
            created: false,
            updated,
        })
    } else {
        let config = Config::default();
        save(&config, &path)?;
        Ok(LoadOutcome {
            config,
            path,
            created: true,
            updated: false,
        })
    }
}

/// Persist the given configuration to disk at the provided path.
pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    ensure_parent_exists(path)?;
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub config: Config,
    pub path: PathBuf,
    pub created: bool,
    pub updated: bool,
}

fn has_missing_keys(config: &Config, raw: &Table) -> Result<bool, ConfigError> {
    match Value::try_from(config)? {
        Value::Table(expected) => Ok(table_missing_keys(&expected, raw)),
        _ => Ok(false),
    }
}

fn table_missing_keys(expected: &Table, actual: &Table) -> bool {
    expected
        .iter()
        .any(|(key, value)| match (value, actual.get(key)) {
            (_, None) => true,
            (Value::Table(expected), Some(Value::Table(actual))) => {
                table_missing_keys(expected, actual)
            }
            _ => false,
        })
}

fn ensure_parent_exists(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn config_file_path() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::ConfigDirUnavailable)?;
    Ok(base_dirs
        .home_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests;
