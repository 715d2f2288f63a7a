//! Client configuration.
//!
//! Resolution order, lowest to highest: built-in defaults, `config.json` in
//! the config directory, `IRIS_*` environment variables, then whatever the
//! caller (the CLI) sets explicitly.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::speech::default_speech_command;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IrisConfig {
    pub api_base_url: String,
    /// Read every reply aloud as it arrives
    pub voice_output: bool,
    /// Overrides the platform text-to-speech command
    pub speech_command: Option<String>,
    pub timeout_secs: u64,
    /// Directory for the request/response wire log; off when unset
    pub wire_log_dir: Option<PathBuf>,
}

impl Default for IrisConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            voice_output: false,
            speech_command: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            wire_log_dir: None,
        }
    }
}

impl IrisConfig {
    /// Load `config.json` from `dir`; a missing file yields defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write `config.json` into `dir` (temp file, then rename).
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(dir)?;
        let temp_path = dir.join(format!("{CONFIG_FILE}.tmp"));
        fs::write(&temp_path, serde_json::to_string_pretty(self)?)?;
        fs::rename(&temp_path, dir.join(CONFIG_FILE))?;
        Ok(())
    }

    /// Apply `IRIS_API_URL`, `IRIS_VOICE`, `IRIS_TIMEOUT_SECS` and
    /// `IRIS_WIRE_LOG_DIR` through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("IRIS_API_URL").filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(voice) = lookup("IRIS_VOICE") {
            self.voice_output = parse_bool(&voice).ok_or(ConfigError::InvalidValue {
                key: "IRIS_VOICE",
                value: voice.clone(),
            })?;
        }
        if let Some(timeout) = lookup("IRIS_TIMEOUT_SECS") {
            self.timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "IRIS_TIMEOUT_SECS",
                value: timeout.clone(),
            })?;
        }
        if let Some(dir) = lookup("IRIS_WIRE_LOG_DIR").filter(|v| !v.is_empty()) {
            self.wire_log_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// File config plus process environment.
    pub fn resolve(dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(dir)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn speech_command(&self) -> &str {
        self.speech_command
            .as_deref()
            .unwrap_or(default_speech_command())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = IrisConfig::load(dir.path()).unwrap();
        assert_eq!(config, IrisConfig::default());
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let config = IrisConfig {
            api_base_url: "https://iris.example".into(),
            voice_output: true,
            speech_command: Some("say -v Samantha".into()),
            timeout_secs: 30,
            wire_log_dir: Some(PathBuf::from("/tmp/wire")),
        };
        config.save(dir.path()).unwrap();
        assert_eq!(IrisConfig::load(dir.path()).unwrap(), config);
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"voiceOutput": true}"#).unwrap();
        let config = IrisConfig::load(dir.path()).unwrap();
        assert!(config.voice_output);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{").unwrap();
        assert!(matches!(
            IrisConfig::load(dir.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = IrisConfig::default();
        config
            .apply_env(env(&[
                ("IRIS_API_URL", "http://10.0.0.2:9000"),
                ("IRIS_VOICE", "yes"),
                ("IRIS_TIMEOUT_SECS", "15"),
                ("IRIS_WIRE_LOG_DIR", "/tmp/iris-wire"),
            ]))
            .unwrap();
        assert_eq!(config.api_base_url, "http://10.0.0.2:9000");
        assert!(config.voice_output);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.wire_log_dir, Some(PathBuf::from("/tmp/iris-wire")));
    }

    #[test]
    fn empty_url_override_is_ignored() {
        let mut config = IrisConfig::default();
        config.apply_env(env(&[("IRIS_API_URL", "")])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let mut config = IrisConfig::default();
        assert!(matches!(
            config.apply_env(env(&[("IRIS_VOICE", "maybe")])),
            Err(ConfigError::InvalidValue { key: "IRIS_VOICE", .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[("IRIS_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidValue { key: "IRIS_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn speech_command_defaults_per_platform() {
        let mut config = IrisConfig::default();
        assert_eq!(config.speech_command(), default_speech_command());
        config.speech_command = Some("espeak -s 140".into());
        assert_eq!(config.speech_command(), "espeak -s 140");
    }
}
