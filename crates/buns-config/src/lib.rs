use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Environment variable that overrides the persisted API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("settings file is not a JSON object")]
    NotAnObject,
}

/// Effective assistant settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Anthropic API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model ID sent with every query.
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound on generated tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Settings {
    /// Apply a partial update. Fields present in `update` win.
    pub fn merge(&mut self, update: SettingsUpdate) {
        if let Some(api_key) = update.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
    }

    /// API key suitable for display: only the last four characters survive.
    pub fn masked_api_key(&self) -> String {
        match self.api_key.as_deref() {
            None => "(not set)".to_string(),
            Some(key) if key.chars().count() <= 4 => "****".to_string(),
            Some(key) => {
                let tail: String = key
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("****{tail}")
            }
        }
    }
}

/// Partial settings used by [`ConfigStore::set`].
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Resolve the buns config directory (~/.buns/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".buns"))
        .ok_or(ConfigError::NoDirFound)
}

/// Directory older releases kept their settings in (~/.claude-buns/).
pub fn legacy_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".claude-buns"))
        .ok_or(ConfigError::NoDirFound)
}

/// Persisted settings plus the environment override, held for the process lifetime.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    settings: Settings,
}

impl ConfigStore {
    /// Initialise from `~/.buns/config.json` and the process environment.
    pub fn init() -> Result<Self, ConfigError> {
        // Load .env if present
        let _ = dotenvy::dotenv();

        let env_api_key = std::env::var(API_KEY_ENV).ok();
        Self::init_with_legacy(config_dir()?, legacy_config_dir().ok(), env_api_key)
    }

    /// Initialise from an explicit directory and environment API key.
    ///
    /// The directory is created if missing. An unreadable or malformed
    /// settings file is treated as absent.
    pub fn init_at(
        dir: impl Into<PathBuf>,
        env_api_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::init_with_legacy(dir, None, env_api_key)
    }

    /// Like [`ConfigStore::init_at`], but when `dir` has no settings file yet
    /// the one in `legacy_dir` is read instead. Saves always go to `dir`.
    pub fn init_with_legacy(
        dir: impl Into<PathBuf>,
        legacy_dir: Option<PathBuf>,
        env_api_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }

        let path = dir.join(CONFIG_FILE_NAME);
        let source = match legacy_dir.map(|d| d.join(CONFIG_FILE_NAME)) {
            Some(legacy) if !path.exists() && legacy.exists() => {
                tracing::info!(
                    from = %legacy.display(),
                    to = %path.display(),
                    "Reading settings from legacy location"
                );
                legacy
            }
            _ => path.clone(),
        };

        let settings = load_settings(&source, env_api_key);
        Ok(Self { path, settings })
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.settings.clone()
    }

    /// Merge `update` into the settings and persist them.
    pub fn set(&mut self, update: SettingsUpdate) {
        self.settings.merge(update);
        self.save();
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.set(SettingsUpdate {
            api_key: Some(api_key.into()),
            ..Default::default()
        });
    }

    /// Write the settings to disk. Failures are logged, never returned.
    pub fn save(&self) {
        if let Err(e) = write_settings(&self.path, &self.settings) {
            tracing::error!(path = %self.path.display(), "Failed to save config: {e}");
        }
    }
}

/// Compose effective settings: environment key > persisted file > defaults.
fn load_settings(path: &Path, env_api_key: Option<String>) -> Settings {
    let mut settings = match read_settings(path) {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Settings::default()
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                "Could not load config file, using defaults: {e}"
            );
            Settings::default()
        }
    };

    if let Some(key) = env_api_key.filter(|k| !k.is_empty()) {
        settings.api_key = Some(key);
    }
    settings
}

/// Read the settings file field by field. A field with the wrong type is
/// logged and left at its default; the other fields still load.
fn read_settings(path: &Path) -> Result<Option<Settings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let Value::Object(mut fields) = serde_json::from_str::<Value>(&content)? else {
        return Err(ConfigError::NotAnObject);
    };

    let mut settings = Settings::default();
    if let Some(api_key) = take_field::<Option<String>>(&mut fields, "apiKey", path) {
        settings.api_key = api_key;
    }
    if let Some(model) = take_field(&mut fields, "model", path) {
        settings.model = model;
    }
    if let Some(max_tokens) = take_field(&mut fields, "maxTokens", path) {
        settings.max_tokens = max_tokens;
    }
    if let Some(temperature) = take_field(&mut fields, "temperature", path) {
        settings.temperature = temperature;
    }
    Ok(Some(settings))
}

fn take_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
    path: &Path,
) -> Option<T> {
    let value = fields.remove(key)?;
    match serde_json::from_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                field = key,
                "Ignoring invalid config field, keeping default: {e}"
            );
            None
        }
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
