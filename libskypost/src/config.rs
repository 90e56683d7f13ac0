//! Configuration management for Skypost
//!
//! The config file has two kinds of content: the bridge's own settings
//! (`[bluesky]`, `[database]`, `[log]`) and a free-form `[settings]` table
//! that plays the role of the host application's option store. The
//! publisher only ever reads the latter through [`SettingsProvider`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::{CategoryAllowList, Credentials};

/// Settings key holding the Bluesky handle or email
pub const IDENTIFIER_KEY: &str = "bluesky_identifier";
/// Settings key holding the Bluesky app password
pub const PASSWORD_KEY: &str = "bluesky_password";
/// Settings key holding the category allow-list
pub const ALLOWED_CATEGORIES_KEY: &str = "bluesky_allowed_categories";

/// Default Bluesky service (PDS entryway)
pub const DEFAULT_SERVICE: &str = "https://bsky.social";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub settings: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_true")]
    pub skip_already_shared: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            skip_already_shared: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/skypost/shares.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: "~/.local/share/skypost".to_string(),
        }
    }
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            bluesky: BlueskyConfig::default(),
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
            settings: HashMap::new(),
        }
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database.path).to_string()
    }

    /// Log directory with `~` expanded
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.log.dir).to_string())
    }
}

/// Resolve the configuration file path following XDG Base Directory conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SKYPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("skypost").join("config.toml"))
}

// ============================================================================
// Settings provider
// ============================================================================

/// A value read from the option store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Text(String),
    List(Vec<String>),
}

/// Read-only key/value option store supplied by the host application
pub trait SettingsProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// String value for `key`, empty when absent or not a string
    fn get_string(&self, key: &str) -> String {
        match self.get(key) {
            Some(SettingValue::Text(s)) => s,
            _ => String::new(),
        }
    }

    /// Sanitized category allow-list stored under `key`
    fn get_category_ids(&self, key: &str) -> CategoryAllowList {
        match self.get(key) {
            Some(SettingValue::List(values)) => CategoryAllowList::from_raw(values.as_slice()),
            Some(SettingValue::Text(s)) => {
                let values: Vec<&str> = s.split(',').collect();
                CategoryAllowList::from_raw(values.as_slice())
            }
            None => CategoryAllowList::default(),
        }
    }

    fn credentials(&self) -> Credentials {
        Credentials::new(self.get_string(IDENTIFIER_KEY), self.get_string(PASSWORD_KEY))
    }

    fn allowed_categories(&self) -> CategoryAllowList {
        self.get_category_ids(ALLOWED_CATEGORIES_KEY)
    }
}

/// Settings backed by the `[settings]` table of the config file
///
/// `SKYPOST_BLUESKY_IDENTIFIER` and `SKYPOST_BLUESKY_PASSWORD` take
/// precedence over file values so the app password can be kept out of the
/// config file.
pub struct ConfigSettings {
    values: HashMap<String, toml::Value>,
}

impl ConfigSettings {
    pub fn new(config: &Config) -> Self {
        Self {
            values: config.settings.clone(),
        }
    }

    fn env_override(key: &str) -> Option<String> {
        let var = match key {
            IDENTIFIER_KEY => "SKYPOST_BLUESKY_IDENTIFIER",
            PASSWORD_KEY => "SKYPOST_BLUESKY_PASSWORD",
            _ => return None,
        };
        std::env::var(var).ok().filter(|v| !v.is_empty())
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

impl SettingsProvider for ConfigSettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        if let Some(value) = Self::env_override(key) {
            return Some(SettingValue::Text(value));
        }

        match self.values.get(key)? {
            toml::Value::Array(items) => Some(SettingValue::List(
                items.iter().filter_map(scalar_to_string).collect(),
            )),
            other => scalar_to_string(other).map(SettingValue::Text),
        }
    }
}

/// In-memory settings, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, SettingValue>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: &str, value: &str) -> Self {
        self.values
            .insert(key.to_string(), SettingValue::Text(value.to_string()));
        self
    }

    pub fn with_list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.values.insert(
            key.to_string(),
            SettingValue::List(values.into_iter().map(|v| v.to_string()).collect()),
        );
        self
    }
}

impl SettingsProvider for MapSettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[bluesky]
service = "http://localhost:2583"
skip_already_shared = false
timeout_secs = 10

[database]
path = "/tmp/skypost/shares.db"

[log]
dir = "/tmp/skypost"

[settings]
bluesky_identifier = "me.bsky.social"
bluesky_password = "abcd-efgh-ijkl-mnop"
bluesky_allowed_categories = [3, 7, -9]
"#;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_load_from_path() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from_path(&path).unwrap();

        assert_eq!(config.bluesky.service, "http://localhost:2583");
        assert!(!config.bluesky.skip_already_shared);
        assert_eq!(config.bluesky.timeout_secs, Some(10));
        assert_eq!(config.database.path, "/tmp/skypost/shares.db");
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/skypost"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let (_dir, path) = write_config("");
        let config = Config::load_from_path(&path).unwrap();

        assert_eq!(config.bluesky.service, DEFAULT_SERVICE);
        assert!(config.bluesky.skip_already_shared);
        assert!(config.bluesky.timeout_secs.is_none());
        assert!(config.settings.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let (_dir, path) = write_config("[bluesky\nservice = ");
        let result = Config::load_from_path(&path);

        assert!(matches!(
            result,
            Err(crate::SkypostError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::load_from_path(Path::new("/nonexistent/skypost/config.toml"));
        assert!(matches!(
            result,
            Err(crate::SkypostError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_config_settings_reads_table() {
        std::env::remove_var("SKYPOST_BLUESKY_IDENTIFIER");
        std::env::remove_var("SKYPOST_BLUESKY_PASSWORD");

        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from_path(&path).unwrap();
        let settings = ConfigSettings::new(&config);

        let creds = settings.credentials();
        assert_eq!(creds.identifier, "me.bsky.social");
        assert_eq!(creds.password.expose_secret(), "abcd-efgh-ijkl-mnop");

        let allowed: BTreeSet<u64> = settings.allowed_categories().ids().copied().collect();
        assert_eq!(allowed, [3, 7, 9].into_iter().collect());
    }

    #[test]
    #[serial]
    fn test_env_overrides_password() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from_path(&path).unwrap();
        let settings = ConfigSettings::new(&config);

        std::env::set_var("SKYPOST_BLUESKY_PASSWORD", "from-env");
        let creds = settings.credentials();
        std::env::remove_var("SKYPOST_BLUESKY_PASSWORD");

        assert_eq!(creds.password.expose_secret(), "from-env");
    }

    #[test]
    #[serial]
    fn test_config_settings_absent_keys() {
        std::env::remove_var("SKYPOST_BLUESKY_IDENTIFIER");
        std::env::remove_var("SKYPOST_BLUESKY_PASSWORD");

        let settings = ConfigSettings::new(&Config::default_config());

        assert!(settings.get(IDENTIFIER_KEY).is_none());
        assert_eq!(settings.get_string(PASSWORD_KEY), "");
        assert!(settings.allowed_categories().is_empty());
        assert!(!settings.credentials().is_complete());
    }

    #[test]
    fn test_comma_separated_categories() {
        let settings = MapSettings::new().with_text(ALLOWED_CATEGORIES_KEY, "3, 7,x");
        let allowed: Vec<u64> = settings.allowed_categories().ids().copied().collect();
        assert_eq!(allowed, vec![3, 7]);
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var("SKYPOST_CONFIG", "/etc/skypost/custom.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("SKYPOST_CONFIG");

        assert_eq!(path, PathBuf::from("/etc/skypost/custom.toml"));
    }
}
