use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::translator::TranslatorConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// External typesetting toolchain
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Publish cache behaviour
    #[serde(default)]
    pub cache: CacheConfig,

    /// Markup translator behaviour
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Where songs, work files and finished documents live
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// SQLite database file; the user data directory is used when empty
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory the toolchain runs in
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory finished documents are moved to
    #[serde(default = "default_ready_dir")]
    pub ready_dir: PathBuf,

    /// Songbook template file; the built-in template is used when empty
    #[serde(default)]
    pub template_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            work_dir: default_work_dir(),
            ready_dir: default_ready_dir(),
            template_path: None,
        }
    }
}

/// External typesetting commands
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolchainConfig {
    /// Typesetting program, run twice
    #[serde(default = "default_typesetter")]
    pub typesetter: String,

    /// Arguments placed before the source file name
    #[serde(default = "default_typesetter_args")]
    pub typesetter_args: Vec<String>,

    /// Index sorting program
    #[serde(default = "default_indexer")]
    pub indexer: String,

    /// Optional timeout for a single step in seconds; steps may run forever when unset
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            typesetter: default_typesetter(),
            typesetter_args: default_typesetter_args(),
            indexer: default_indexer(),
            step_timeout_secs: None,
        }
    }
}

/// Publish cache settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Days a published document stays cached after its last use
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,

    /// Seconds between two background sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Unreferenced documents younger than this are kept by the sweep
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            orphan_grace_secs: default_orphan_grace_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("songs/temp")
}

fn default_ready_dir() -> PathBuf {
    PathBuf::from("songs/done")
}

fn default_typesetter() -> String {
    "pdflatex".to_string()
}

fn default_typesetter_args() -> Vec<String> {
    vec!["-halt-on-error".to_string()]
}

fn default_indexer() -> String {
    "songidx".to_string()
}

/// Upper bound of `ttl_days`, far below the range where date arithmetic overflows
const MAX_TTL_DAYS: i64 = 36_500;

fn default_ttl_days() -> i64 {
    14
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_orphan_grace_secs() -> u64 {
    1800 // 30 minutes, enough to download a single-song export
}

impl Config {
    /// Load the configuration from a JSON file, writing a default one when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.toolchain.typesetter.trim().is_empty() {
            return Err(anyhow!("Typesetter command must not be empty"));
        }

        if self.toolchain.indexer.trim().is_empty() {
            return Err(anyhow!("Indexer command must not be empty"));
        }

        if !(1..=MAX_TTL_DAYS).contains(&self.cache.ttl_days) {
            return Err(anyhow!(
                "Cache TTL must be between 1 and {} days, got {}",
                MAX_TTL_DAYS,
                self.cache.ttl_days
            ));
        }

        if self.cache.sweep_interval_secs == 0 {
            return Err(anyhow!("Sweep interval must be positive"));
        }

        if self.storage.work_dir == self.storage.ready_dir {
            return Err(anyhow!(
                "Work and ready directories must differ: {:?}",
                self.storage.work_dir
            ));
        }

        if let Some(template) = &self.storage.template_path {
            if !template.is_file() {
                return Err(anyhow!("Template file does not exist: {:?}", template));
            }
        }

        Ok(())
    }

    /// The publish cache time to live, clamped into the valid range for unvalidated configs
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache.ttl_days.clamp(1, MAX_TTL_DAYS))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            toolchain: ToolchainConfig::default(),
            cache: CacheConfig::default(),
            translator: TranslatorConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
