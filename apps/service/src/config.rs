use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("could not determine a config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub store: StoreSection,
    pub notifier: NotifierSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Seconds between the start of one cycle and the next
    pub interval_seconds: u64,
    /// Run a cycle immediately instead of waiting for the first interval
    pub run_on_start: bool,
    /// How long shutdown waits for in-flight cycles before abandoning them
    pub shutdown_grace_seconds: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self { interval_seconds: 60, run_on_start: true, shutdown_grace_seconds: 10 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Libsql,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::File => write!(f, "file"),
            StoreBackend::Libsql => write!(f, "libsql"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// Directory for the file backend, database file for libsql
    pub path: path::PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self { backend: StoreBackend::File, path: path::PathBuf::from(".data") }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierBackend {
    #[default]
    Log,
    Twilio,
}

impl fmt::Display for NotifierBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierBackend::Log => write!(f, "log"),
            NotifierBackend::Twilio => write!(f, "twilio"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSection {
    pub backend: NotifierBackend,
    pub twilio: TwilioSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioSection {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    pub api_base: String,
}

impl Default for TwilioSection {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_phone: String::new(),
            api_base: "https://api.twilio.com".into(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptime-engine/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uptime-engine/config.toml"))
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "********" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Engine Configuration:")?;
        write_title_1(f, "Engine")?;
        write_1(f, "Interval (seconds)", &self.engine.interval_seconds)?;
        write_1(f, "Run On Start", &self.engine.run_on_start)?;
        write_1(f, "Shutdown Grace (seconds)", &self.engine.shutdown_grace_seconds)?;
        write_title_1(f, "Store")?;
        write_1(f, "Backend", &self.store.backend)?;
        write_1(f, "Path", &self.store.path.display())?;
        write_title_1(f, "Notifier")?;
        write_1(f, "Backend", &self.notifier.backend)?;
        if self.notifier.backend == NotifierBackend::Twilio {
            let twilio = &self.notifier.twilio;
            write_1(f, "Twilio Account", &twilio.account_sid)?;
            write_1(f, "Twilio Token", &mask(&twilio.auth_token))?;
            write_1(f, "Twilio From", &twilio.from_phone)?;
            write_1(f, "Twilio API", &twilio.api_base)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uptime-engine/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed =
            |source: io::Error| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Apply the `TWILIO_*` environment variables over the file settings
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let twilio = &mut self.notifier.twilio;
        let targets = [
            ("TWILIO_ACCT_ID", &mut twilio.account_sid),
            ("TWILIO_AUTH_TOKEN", &mut twilio.auth_token),
            ("TWILIO_FROM_PHONE", &mut twilio.from_phone),
        ];

        for (name, field) in targets {
            if let Some(value) = lookup(name).filter(|value| !value.trim().is_empty()) {
                *field = value;
            }
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.interval_seconds == 0 {
            return Err(ConfigError::Invalid("engine.interval_seconds must be at least 1".into()));
        }

        if self.store.backend != StoreBackend::Memory && self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path cannot be empty".into()));
        }

        if self.notifier.backend == NotifierBackend::Twilio {
            let twilio = &self.notifier.twilio;
            for (name, value) in [
                ("account_sid", &twilio.account_sid),
                ("auth_token", &twilio.auth_token),
                ("from_phone", &twilio.from_phone),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("notifier.twilio.{name} is required")));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.interval_seconds, 60);
        assert!(config.engine.run_on_start);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.notifier.backend, NotifierBackend::Log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [store]
            backend = "libsql"
            path = "/var/lib/uptime/records.db"

            [notifier]
            backend = "twilio"

            [notifier.twilio]
            account_sid = "AC123"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.interval_seconds, 60);
        assert_eq!(config.store.backend, StoreBackend::Libsql);
        assert_eq!(config.notifier.backend, NotifierBackend::Twilio);
        assert_eq!(config.notifier.twilio.account_sid, "AC123");
        assert_eq!(config.notifier.twilio.api_base, "https://api.twilio.com");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_creates_default_file_when_missing() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested/engine");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.engine.interval_seconds, 60);

        let written = temp_dir.path().join("nested/engine.toml");
        assert!(written.exists());

        let mut changed = config.clone();
        changed.engine.interval_seconds = 30;
        changed.write_config(&written).unwrap();
        let reloaded = Config::from_config(Some(&written)).unwrap();
        assert_eq!(reloaded.engine.interval_seconds, 30);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            [("TWILIO_ACCT_ID", "AC999"), ("TWILIO_AUTH_TOKEN", "token"), ("TWILIO_FROM_PHONE", " ")]
                .into_iter()
                .collect();
        let mut config = Config::default();
        config.notifier.twilio.from_phone = "5550001111".into();

        config.apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.notifier.twilio.account_sid, "AC999");
        assert_eq!(config.notifier.twilio.auth_token, "token");
        assert_eq!(config.notifier.twilio.from_phone, "5550001111");
    }

    #[test]
    fn test_display_masks_token() {
        let mut config = Config::default();
        config.notifier.backend = NotifierBackend::Twilio;
        config.notifier.twilio.auth_token = "super-secret".into();

        let shown = config.to_string();
        assert!(shown.contains("Twilio Token: ********"));
        assert!(!shown.contains("super-secret"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut config = Config::default();
        config.engine.interval_seconds = 0;
        assert!(config.validate().is_err());
    }
}
