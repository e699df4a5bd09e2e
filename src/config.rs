use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::PitwallError;
use crate::analysis::AnalysisConfig;

const CONFIG_DIR_NAME: &str = "pitwall";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Indent JSON results
    pub pretty_output: bool,
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, PitwallError> {
        Ok(dirs::config_dir()
            .ok_or(PitwallError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the user's config directory, defaults when the
    /// file does not exist yet.
    pub fn from_local_file() -> Result<Self, PitwallError> {
        Self::from_path(&Self::default_path()?)
    }

    pub fn from_path(config_path: &Path) -> Result<Self, PitwallError> {
        if !config_path.exists() {
            debug!("No config file at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }
        let file = std::fs::File::open(config_path)
            .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<(), PitwallError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), PitwallError> {
        if let Some(config_dir) = config_path.parent()
            && !config_dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(config_dir)
                .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }
}
