use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config file {}", .0.display())]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("Failed to write config file {}", .0.display())]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("No config path available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: Storage,
    pub monitoring: Monitoring,
    pub lookup: Lookup,
    pub notifications: Notifications,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Directory holding one sub-directory per monitored domain
    pub monitors_dir: path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    pub interval_seconds: u64,
    /// Bound on a single reachability probe
    pub timeout_seconds: u64,
    /// Probes answering at or above this latency count as offline
    pub latency_ceiling_ms: u64,
    /// Granularity of the latency component of the dedup key
    pub latency_bucket_ms: u64,
    /// Number of log entries attached to a notification as history
    pub history_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Lookup {
    pub whois_server: String,
    pub timeout_seconds: u64,
    pub excluded_fields: Vec<String>,
    pub network_details: bool,
    pub network_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub username: String,
    pub footer: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self { monitors_dir: path::PathBuf::from("monitors") }
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            timeout_seconds: 10,
            latency_ceiling_ms: 1000,
            latency_bucket_ms: 250,
            history_entries: 10,
        }
    }
}

impl Default for Lookup {
    fn default() -> Self {
        Self {
            whois_server: "whois.iana.org".into(),
            timeout_seconds: 10,
            excluded_fields: ["dnssec", "name", "org", "address", "city", "state", "zipcode", "country"]
                .into_iter()
                .map(String::from)
                .collect(),
            network_details: true,
            network_endpoint: "http://ip-api.com/json".into(),
        }
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self { username: "Domain Monitor".into(), footer: "Domain Monitor".into() }
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

/// Get default config path ($XDG_CONFIG_HOME/domainwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("domainwatch/config.toml"))
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

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Storage")?;
        write_1(f, "Monitors Directory", &self.storage.monitors_dir.display())?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Interval (s)", &self.monitoring.interval_seconds)?;
        write_1(f, "Probe Timeout (s)", &self.monitoring.timeout_seconds)?;
        write_1(f, "Latency Ceiling (ms)", &self.monitoring.latency_ceiling_ms)?;
        write_1(f, "Latency Bucket (ms)", &self.monitoring.latency_bucket_ms)?;
        write_1(f, "History Entries", &self.monitoring.history_entries)?;
        write_title_1(f, "Lookup")?;
        write_1(f, "WHOIS Server", &self.lookup.whois_server)?;
        write_1(f, "Timeout (s)", &self.lookup.timeout_seconds)?;
        write_1(f, "Excluded Fields", &self.lookup.excluded_fields.join(", "))?;
        write_1(f, "Network Details", &self.lookup.network_details)?;
        write_1(f, "Network Endpoint", &self.lookup.network_endpoint)?;
        write_title_1(f, "Notifications")?;
        write_1(f, "Username", &self.notifications.username)?;
        write_1(f, "Footer", &self.notifications.footer)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/domainwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str::<Self>(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    pub fn validate(&self) -> Result<(), Error> {
        validation::validate_check_interval(self.monitoring.interval_seconds)
            .and_then(|()| validation::validate_timeout("monitoring.timeout_seconds", self.monitoring.timeout_seconds))
            .and_then(|()| validation::validate_timeout("lookup.timeout_seconds", self.lookup.timeout_seconds))
            .and_then(|()| validation::validate_latency_ceiling(self.monitoring.latency_ceiling_ms))
            .map_err(|err| Error::Invalid(err.to_string()))
    }

    /// Absolute monitors directory, resolved against the working directory
    pub fn monitors_root(&self) -> path::PathBuf {
        let dir = &self.storage.monitors_dir;
        if dir.is_absolute() {
            return dir.clone();
        }
        match env::current_dir() {
            Ok(cwd) => cwd.join(dir),
            Err(_) => dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings");

        let config = Config::from_config(Some(&path)).unwrap();

        assert!(dir.path().join("settings.toml").exists());
        assert_eq!(config.monitoring.interval_seconds, 60);
        assert_eq!(config.monitoring.latency_ceiling_ms, 1000);
        assert_eq!(config.lookup.whois_server, "whois.iana.org");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitoring]\ninterval_seconds = 120\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.monitoring.interval_seconds, 120);
        assert_eq!(config.monitoring.timeout_seconds, 10);
        assert_eq!(config.storage.monitors_dir, path::PathBuf::from("monitors"));
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitoring]\ninterval_seconds = 1\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("Monitoring"));
        assert!(rendered.contains("Latency Ceiling (ms): 1000"));
    }
}
