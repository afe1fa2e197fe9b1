//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_telemetry_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Dictionary sources, merged in order (JSON first, then DBC)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DictionaryConfig {
    #[serde(default)]
    pub json_files: Vec<PathBuf>,
    #[serde(default)]
    pub dbc_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportConfig {
    pub csv: Option<PathBuf>,
    pub trc: Option<PathBuf>,
    /// Signals to export and summarize, all when empty
    #[serde(default)]
    pub signals: Vec<String>,
}

impl AppConfig {
    /// Check that every referenced dictionary file exists
    pub fn validate(&self) -> Result<()> {
        for path in self
            .dictionary
            .json_files
            .iter()
            .chain(&self.dictionary.dbc_files)
        {
            if !path.exists() {
                bail!("Dictionary file not found: {:?}", path);
            }
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config.validate()?;

    Ok(config)
}
