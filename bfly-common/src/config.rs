//! Configuration loading and data folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Values are resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! A missing config file is not an error: a warning is logged and defaults
//! are used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the data folder
pub const ENV_DATA_FOLDER: &str = "BFLY_DATA_FOLDER";

/// Environment variable overriding the config file location
pub const ENV_CONFIG_FILE: &str = "BFLY_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup; changes require a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Data folder holding the observation journal database
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Explicit journal database path (overrides `data_folder/bfly.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Species catalog TOML file (built-in catalog when absent)
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub classifier: ClassifierSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_folder: None,
            database_path: None,
            catalog_path: None,
            logging: LoggingConfig::default(),
            engine: EngineSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Engine policy and resource settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Points awarded per accepted observation
    #[serde(default = "default_base_points")]
    pub base_points: u64,

    /// Deadline for a single classification call
    #[serde(default = "default_classify_timeout_ms")]
    pub classify_timeout_ms: u64,

    /// Size of the recent-observations window
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// Maximum in-flight submissions during batch ingestion
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// EventBus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_points: default_base_points(),
            classify_timeout_ms: default_classify_timeout_ms(),
            recent_capacity: default_recent_capacity(),
            batch_concurrency: default_batch_concurrency(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineSettings {
    pub fn classify_timeout(&self) -> std::time::Duration {
        crate::time::millis_to_duration(self.classify_timeout_ms)
    }
}

/// Classifier backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierSettings {
    /// Random catalog species with uniformly drawn confidence
    Sampler {
        #[serde(default = "default_min_confidence")]
        min_confidence: f64,
        #[serde(default = "default_max_confidence")]
        max_confidence: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Fixed image_ref → species table
    Lookup {
        #[serde(default)]
        entries: Vec<LookupEntry>,
    },
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        ClassifierSettings::Sampler {
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            seed: None,
        }
    }
}

/// One row of the lookup classifier table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub image_ref: String,
    pub species_id: String,
    pub confidence: f64,
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_points() -> u64 {
    10
}

fn default_classify_timeout_ms() -> u64 {
    5000
}

fn default_recent_capacity() -> usize {
    100
}

fn default_batch_concurrency() -> usize {
    8
}

fn default_event_capacity() -> usize {
    1000
}

fn default_min_confidence() -> f64 {
    0.75
}

fn default_max_confidence() -> f64 {
    0.95
}

/// Parse TOML text into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load config from `path`, falling back to defaults when the file is missing
///
/// A file that exists but fails to parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Config file location: CLI argument > `BFLY_CONFIG` > platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
        return PathBuf::from(path);
    }
    default_config_path()
}

/// Platform config path (`~/.config/bfly/bfly-engine.toml` on Linux)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("bfly").join("bfly-engine.toml"))
        .unwrap_or_else(|| PathBuf::from("bfly-engine.toml"))
}

/// Data folder resolution:
/// 1. Command-line argument
/// 2. `BFLY_DATA_FOLDER` environment variable
/// 3. TOML `data_folder`
/// 4. OS-dependent default
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_value: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(ENV_DATA_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(path) = toml_value {
        return path.to_path_buf();
    }
    get_default_data_folder()
}

/// OS-dependent default data folder
pub fn get_default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bfly"))
        .unwrap_or_else(|| PathBuf::from("./bfly_data"))
}

/// Journal database path inside a data folder
pub fn database_path_in(data_folder: &Path) -> PathBuf {
    data_folder.join("bfly.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5730);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.base_points, 10);
        assert_eq!(config.engine.classify_timeout_ms, 5000);
        assert_eq!(
            config.classifier,
            ClassifierSettings::Sampler {
                min_confidence: 0.75,
                max_confidence: 0.95,
                seed: None
            }
        );
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config.port, 5730);
        assert!(config.catalog_path.is_none());
        assert_eq!(config.engine.recent_capacity, 100);
    }

    #[test]
    fn test_partial_engine_section() {
        let config = parse_toml_config(
            r#"
port = 6000

[engine]
base_points = 25
"#,
        )
        .unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.engine.base_points, 25);
        assert_eq!(config.engine.batch_concurrency, 8);
    }

    #[test]
    fn test_lookup_classifier_section() {
        let config = parse_toml_config(
            r#"
[classifier]
kind = "lookup"

[[classifier.entries]]
image_ref = "trap-01/img-0001.jpg"
species_id = "monarch"
confidence = 0.91
"#,
        )
        .unwrap();
        match config.classifier {
            ClassifierSettings::Lookup { entries } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].species_id, "monarch");
            }
            other => panic!("unexpected classifier settings {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(parse_toml_config("port = \"abc\""), Err(Error::Config(_))));
    }

    #[test]
    fn test_database_path_in() {
        let path = database_path_in(Path::new("/srv/bfly"));
        assert_eq!(path, PathBuf::from("/srv/bfly/bfly.db"));
    }
}
