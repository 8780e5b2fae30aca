//! Configuration for pingwatch.
//!
//! Two layers: process settings from environment variables (file locations),
//! and the hot-reloadable monitor config read from a JSON file.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Process settings loaded from environment variables.
///
/// - `PINGWATCH_CONFIG`: monitor config file path (default: "config.json")
/// - `PINGWATCH_DB_PATH`: database file path (default: "ping_data.db")
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            db_path: "ping_data.db".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        let mut settings = Self::default();
        if let Ok(path) = env::var("PINGWATCH_CONFIG") {
            settings.config_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("PINGWATCH_DB_PATH") {
            settings.db_path = path;
        }
        settings
    }
}

/// One target entry in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub addr: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hide_addr: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_server: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The monitor configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Display title for the dashboard and config API.
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub targets: Vec<TargetSpec>,
    /// Seconds between probe cycles.
    pub ping_interval: i64,
    /// Attempts averaged into one measurement, 1..=10.
    pub ping_count: i64,
    /// Wide on purpose so out-of-range file values clamp instead of failing
    /// to deserialize.
    pub web_port: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_dns: String,
}

impl MonitorConfig {
    /// Clamp out-of-range values to their defaults.
    fn validate(&mut self) {
        if self.ping_interval <= 0 {
            self.ping_interval = 10;
        }
        if self.ping_count <= 0 || self.ping_count > 10 {
            self.ping_count = 4;
        }
        if self.web_port <= 0 || self.web_port > 65535 {
            self.web_port = 8081;
        }
    }

    fn with_defaults(targets: Vec<TargetSpec>) -> Self {
        Self {
            title: "pingwatch - network latency monitor".to_string(),
            description: String::new(),
            targets,
            ping_interval: 10,
            ping_count: 4,
            web_port: 8081,
            default_dns: String::new(),
        }
    }

    fn seed() -> Self {
        Self::with_defaults(vec![
            TargetSpec {
                addr: "8.8.8.8".to_string(),
                description: "Google DNS".to_string(),
                hide_addr: false,
                dns_server: String::new(),
            },
            TargetSpec {
                addr: "1.1.1.1".to_string(),
                description: "Cloudflare DNS".to_string(),
                hide_addr: false,
                dns_server: String::new(),
            },
            TargetSpec {
                addr: "2001:4860:4860::8888".to_string(),
                description: "Google DNS IPv6".to_string(),
                hide_addr: false,
                dns_server: String::new(),
            },
            TargetSpec {
                addr: "github.com".to_string(),
                description: "GitHub".to_string(),
                hide_addr: false,
                dns_server: "8.8.8.8".to_string(),
            },
        ])
    }
}

/// Owns the current monitor config and tracks the file's modification time
/// so the scheduler's watch loop can detect edits.
pub struct ConfigManager {
    path: PathBuf,
    config: RwLock<MonitorConfig>,
    last_modified: RwLock<Option<SystemTime>>,
}

impl ConfigManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config: RwLock::new(MonitorConfig::default()),
            last_modified: RwLock::new(None),
        }
    }

    /// Load (or reload) the config file.
    ///
    /// A missing file is replaced with a seeded default. A file holding a
    /// bare JSON array of targets (the legacy shape) is upgraded to the
    /// structured shape and the normalized copy is written back. Values out
    /// of range are clamped to defaults.
    pub fn load(&self) -> Result<(), ConfigError> {
        if let Ok(meta) = std::fs::metadata(&self.path) {
            if let Ok(modified) = meta.modified() {
                *self.last_modified.write().unwrap() = Some(modified);
            }
        }

        if !self.path.exists() {
            let config = MonitorConfig::seed();
            self.write_back(&config)?;
            *self.config.write().unwrap() = config;
            return Ok(());
        }

        let data = std::fs::read_to_string(&self.path)?;

        let mut config = match serde_json::from_str::<MonitorConfig>(&data) {
            Ok(config) => config,
            Err(_) => {
                // Legacy shape: a bare array of target entries.
                let targets: Vec<TargetSpec> = serde_json::from_str(&data)?;
                let config = MonitorConfig::with_defaults(targets);
                self.write_back(&config)?;
                config
            }
        };

        config.validate();
        *self.config.write().unwrap() = config;
        Ok(())
    }

    fn write_back(&self, config: &MonitorConfig) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    /// Snapshot of the current config.
    pub fn get(&self) -> MonitorConfig {
        self.config.read().unwrap().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the file as of the last successful load.
    pub fn last_modified(&self) -> Option<SystemTime> {
        *self.last_modified.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_with(dir: &TempDir, contents: &str) -> ConfigManager {
        let path = dir.path().join("config.json");
        std::fs::write(&path, contents).unwrap();
        ConfigManager::new(path)
    }

    #[test]
    fn load_structured_config() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(
            &dir,
            r#"{
                "targets": [{"addr": "8.8.8.8", "description": "Google DNS"}],
                "ping_interval": 30,
                "ping_count": 2,
                "web_port": 9000
            }"#,
        );
        mgr.load().unwrap();

        let cfg = mgr.get();
        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.ping_interval, 30);
        assert_eq!(cfg.ping_count, 2);
        assert_eq!(cfg.web_port, 9000);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(
            &dir,
            r#"{"targets": [], "ping_interval": 0, "ping_count": 15, "web_port": 70000}"#,
        );
        mgr.load().unwrap();

        let cfg = mgr.get();
        assert_eq!(cfg.ping_interval, 10);
        assert_eq!(cfg.ping_count, 4);
        assert_eq!(cfg.web_port, 8081);
    }

    #[test]
    fn legacy_array_shape_is_upgraded_and_rewritten() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(
            &dir,
            r#"[{"addr": "1.1.1.1", "description": "Cloudflare DNS"}]"#,
        );
        mgr.load().unwrap();

        let cfg = mgr.get();
        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.ping_interval, 10);
        assert_eq!(cfg.ping_count, 4);
        assert_eq!(cfg.web_port, 8081);

        // The normalized copy must now parse as the structured shape.
        let rewritten = std::fs::read_to_string(mgr.path()).unwrap();
        let reparsed: MonitorConfig = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(reparsed.targets.len(), 1);
    }

    #[test]
    fn missing_file_creates_seeded_default() {
        let dir = TempDir::new().unwrap();
        let mgr = ConfigManager::new(dir.path().join("config.json"));
        mgr.load().unwrap();

        let cfg = mgr.get();
        assert!(!cfg.targets.is_empty());
        assert_eq!(cfg.ping_interval, 10);
        assert!(mgr.path().exists());
    }

    #[test]
    fn title_and_description_survive_load() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(
            &dir,
            r#"{"title": "Home uplink", "description": "rack in the closet", "targets": []}"#,
        );
        mgr.load().unwrap();

        let cfg = mgr.get();
        assert_eq!(cfg.title, "Home uplink");
        assert_eq!(cfg.description, "rack in the closet");

        // The seeded default carries a non-empty title too.
        let seeded = ConfigManager::new(dir.path().join("fresh.json"));
        seeded.load().unwrap();
        assert!(!seeded.get().title.is_empty());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(&dir, "not json at all");
        assert!(mgr.load().is_err());
    }

    #[test]
    fn load_records_modification_time() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(&dir, r#"{"targets": []}"#);
        assert!(mgr.last_modified().is_none());
        mgr.load().unwrap();
        assert!(mgr.last_modified().is_some());
    }
}
