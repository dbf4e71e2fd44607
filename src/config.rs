//! Configuration file handling.
//!
//! This module handles loading configuration from `.traitgraph.toml`
//! files. Command-line flags are merged on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::service::BuildSettings;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".traitgraph.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input table settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Query thresholds.
    #[serde(default)]
    pub query: QueryConfig,

    /// Index build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Alternative query strings, keyed by query.
    #[serde(default)]
    pub synonyms: HashMap<String, Vec<String>>,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output path; stdout when unset.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// Locations of the input tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Heritability table (CSV or TSV).
    #[serde(default)]
    pub heritability: Option<PathBuf>,

    /// Genetic correlation table (CSV or TSV).
    #[serde(default)]
    pub correlations: Option<PathBuf>,

    /// Field delimiter; inferred from the file extension when unset.
    #[serde(default)]
    pub delimiter: Option<char>,
}

/// Neighbor ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Minimum |Z| of the pooled genetic correlation.
    #[serde(default = "default_z_threshold")]
    pub rg_z_threshold: f64,

    /// Minimum Z of the neighbor's pooled heritability.
    #[serde(default = "default_z_threshold")]
    pub h2_z_threshold: f64,

    /// Maximum neighbors to report.
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    /// Number of top neighbors whose edge provenance is included.
    #[serde(default = "default_provenance_top")]
    pub provenance_top: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            rg_z_threshold: default_z_threshold(),
            h2_z_threshold: default_z_threshold(),
            max_neighbors: default_max_neighbors(),
            provenance_top: default_provenance_top(),
        }
    }
}

fn default_z_threshold() -> f64 {
    2.0
}

fn default_max_neighbors() -> usize {
    20
}

fn default_provenance_top() -> usize {
    3
}

/// Index build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Builds slower than this are logged as a warning.
    #[serde(default = "default_warn_after")]
    pub warn_after_seconds: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            warn_after_seconds: default_warn_after(),
        }
    }
}

fn default_warn_after() -> u64 {
    30
}

impl BuildConfig {
    pub fn settings(&self) -> BuildSettings {
        BuildSettings {
            warn_after: Duration::from_secs(self.warn_after_seconds),
        }
    }
}

impl DataConfig {
    /// Delimiter as a byte, if one is configured and it is ASCII.
    pub fn delimiter_byte(&self) -> Option<u8> {
        self.delimiter.filter(char::is_ascii).map(|c| c as u8)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.traitgraph.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.data.heritability = Some(PathBuf::from("heritability.tsv"));
        config.data.correlations = Some(PathBuf::from("correlations.tsv"));
        config.synonyms.insert(
            "schizophrenia".to_string(),
            vec!["SCZ".to_string(), "psychosis".to_string()],
        );
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
