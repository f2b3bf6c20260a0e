use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::PaddockError;
use crate::query::filters::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, PageDefaults};

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "paddock";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub default_page_limit: usize,
    pub max_page_limit: usize,
    /// Directory holding `<table>.jsonl` files for the in-memory store
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
            data_dir: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, PaddockError> {
        Ok(dirs::config_dir()
            .ok_or(PaddockError::NoConfigDir)?
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load the config from the user's config directory, falling back to defaults when
    /// no file has been saved yet
    pub fn from_local_file() -> Result<Self, PaddockError> {
        Self::from_path(&Self::default_path()?)
    }

    pub fn from_path(config_path: &Path) -> Result<Self, PaddockError> {
        if !config_path.exists() {
            debug!("No config file at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }
        let file = File::open(config_path).map_err(|e| PaddockError::ConfigIO { source: e })?;
        serde_json::from_reader(file).map_err(|e| PaddockError::ConfigSerialize { source: e })
    }

    pub fn save(&self) -> Result<(), PaddockError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), PaddockError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PaddockError::ConfigIO { source: e })?;
        }
        let file = File::create(config_path).map_err(|e| PaddockError::ConfigIO { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PaddockError::ConfigSerialize { source: e })
    }

    pub fn page_defaults(&self) -> PageDefaults {
        PageDefaults {
            limit: self.default_page_limit.max(1),
            max_limit: self.max_page_limit.max(1),
        }
    }
}
