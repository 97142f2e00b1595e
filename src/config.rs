//! Application configuration
//!
//! Loaded once at start-up from the JSON file named by `DR_EXPLORER_CONFIG`,
//! else `explorer.json` in the working directory, else built-in defaults.
//! `DR_DB` overrides the catalog path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::geometry::TileLayout;

pub const CONFIG_ENV: &str = "DR_EXPLORER_CONFIG";
pub const DB_ENV: &str = "DR_DB";
pub const DEFAULT_CONFIG_FILE: &str = "explorer.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite catalog
    pub database_path: PathBuf,
    /// Root holding `thumbnails/`, `resized/` and `visualizations/`
    pub assets_dir: PathBuf,
    pub python: String,
    pub runner_script: String,
    /// Edge length of the square overview bitmap
    pub max_bitmap_size: u32,
    pub padding: f64,
    /// Tile edge at `max_bitmap_size`
    pub thumbnail_size: f64,
    /// Above this many points tiles shrink by `sqrt(threshold / n)`
    pub shrink_threshold: usize,
    pub image_workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("art.sqlite"),
            assets_dir: PathBuf::from("assets"),
            python: "./.venv/bin/python".to_string(),
            runner_script: "run.py".to_string(),
            max_bitmap_size: 4096,
            padding: 40.0,
            thumbnail_size: 64.0,
            shrink_threshold: 4000,
            image_workers: 8,
        }
    }
}

impl AppConfig {
    /// Resolve the configuration from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if fallback.is_file() => Self::from_file(&fallback)?,
            None => Self::default(),
        };

        if let Some(db) = std::env::var_os(DB_ENV) {
            config.database_path = PathBuf::from(db);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn tile_layout(&self) -> TileLayout {
        TileLayout {
            max_bitmap_size: self.max_bitmap_size.max(1),
            padding: self.padding.max(0.0),
            thumbnail_size: self.thumbnail_size.max(1.0),
            shrink_threshold: self.shrink_threshold.max(1),
        }
    }
}
