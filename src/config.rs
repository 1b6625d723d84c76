use livesync_core::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RELAY: &str = "http://localhost:8787";

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    Flag,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
            ConfigSource::Flag => write!(f, "flag"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Client configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Relay server URL
    pub relay_url: ConfigValue<String>,
    /// Quiet period before a burst of file changes is processed
    pub debounce_ms: ConfigValue<u64>,
    /// How long `join` waits for the session state
    pub join_timeout_secs: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    relay_url: Option<String>,
    debounce_ms: Option<u64>,
    join_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading environment variables through `env`.
    pub fn load_with(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = SessionOptions::default();

        let mut relay_url = ConfigValue::new(DEFAULT_RELAY.to_string(), ConfigSource::Default);
        let mut debounce_ms =
            ConfigValue::new(defaults.debounce.as_millis() as u64, ConfigSource::Default);
        let mut join_timeout_secs =
            ConfigValue::new(defaults.join_timeout.as_secs(), ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path);

            if let Some(url) = file_config.relay_url {
                relay_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(ms) = file_config.debounce_ms {
                debounce_ms = ConfigValue::new(ms, ConfigSource::File);
            }
            if let Some(secs) = file_config.join_timeout_secs {
                join_timeout_secs = ConfigValue::new(secs, ConfigSource::File);
            }
        }

        if let Some(url) = env("LIVESYNC_RELAY") {
            relay_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Some(ms) = env("LIVESYNC_DEBOUNCE_MS") {
            let ms = ms
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("LIVESYNC_DEBOUNCE_MS", ms))?;
            debounce_ms = ConfigValue::new(ms, ConfigSource::Environment);
        }
        if let Some(secs) = env("LIVESYNC_JOIN_TIMEOUT_SECS") {
            let secs = secs
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("LIVESYNC_JOIN_TIMEOUT_SECS", secs))?;
            join_timeout_secs = ConfigValue::new(secs, ConfigSource::Environment);
        }

        Ok(Self {
            relay_url,
            debounce_ms,
            join_timeout_secs,
            config_file,
        })
    }

    /// Applies a `--relay` flag, which beats every other source.
    pub fn with_relay_flag(mut self, relay: Option<&str>) -> Self {
        if let Some(url) = relay {
            self.relay_url = ConfigValue::new(url.to_string(), ConfigSource::Flag);
        }
        self
    }

    /// Session timing derived from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            debounce: Duration::from_millis(self.debounce_ms.value),
            join_timeout: Duration::from_secs(self.join_timeout_secs.value),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/livesync/
    /// - macOS: ~/Library/Application Support/livesync/
    /// - Windows: %APPDATA%/livesync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livesync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(var, value) => {
                write!(f, "Invalid value for {}: '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_with(Some(config_path), no_env).unwrap();
        assert_eq!(config.relay_url.value, DEFAULT_RELAY);
        assert_eq!(config.relay_url.source, ConfigSource::Default);
        assert_eq!(config.debounce_ms.value, 50);
        assert_eq!(config.join_timeout_secs.value, 10);
        assert_eq!(config.config_file, None);
        assert_eq!(config.session_options(), SessionOptions::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "relay_url: https://relay.example.com").unwrap();
        writeln!(file, "debounce_ms: 200").unwrap();

        let config = Config::load_with(Some(config_path.clone()), no_env).unwrap();
        assert_eq!(config.relay_url.value, "https://relay.example.com");
        assert_eq!(config.relay_url.source, ConfigSource::File);
        assert_eq!(config.debounce_ms.value, 200);
        assert_eq!(config.debounce_ms.source, ConfigSource::File);
        assert_eq!(config.join_timeout_secs.source, ConfigSource::Default);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(
            config.session_options().debounce,
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "relay_url: http://fromfile:1").unwrap();
        writeln!(file, "join_timeout_secs: 3").unwrap();

        let env = env_from(&[
            ("LIVESYNC_RELAY", "http://fromenv:2"),
            ("LIVESYNC_JOIN_TIMEOUT_SECS", "30"),
        ]);
        let config = Config::load_with(Some(config_path), env).unwrap();
        assert_eq!(config.relay_url.value, "http://fromenv:2");
        assert_eq!(config.relay_url.source, ConfigSource::Environment);
        assert_eq!(config.join_timeout_secs.value, 30);
        assert_eq!(config.join_timeout_secs.source, ConfigSource::Environment);
    }

    #[test]
    fn test_relay_flag_wins() {
        let env = env_from(&[("LIVESYNC_RELAY", "http://fromenv:2")]);
        let temp_dir = tempdir().unwrap();
        let config = Config::load_with(Some(temp_dir.path().join("none.yaml")), env)
            .unwrap()
            .with_relay_flag(Some("ws://flag:3"));
        assert_eq!(config.relay_url.value, "ws://flag:3");
        assert_eq!(config.relay_url.source, ConfigSource::Flag);

        let unchanged = config.clone().with_relay_flag(None);
        assert_eq!(unchanged.relay_url.value, "ws://flag:3");
    }

    #[test]
    fn test_invalid_env_number() {
        let temp_dir = tempdir().unwrap();
        let env = env_from(&[("LIVESYNC_DEBOUNCE_MS", "soon")]);
        let result = Config::load_with(Some(temp_dir.path().join("none.yaml")), env);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv("LIVESYNC_DEBOUNCE_MS", _))
        ));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "debounce_ms: [not, a, number]").unwrap();

        let result = Config::load_with(Some(config_path), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_, _))));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.ends_with("livesync/config.yaml"));
    }
}
