use std::fs::{create_dir_all, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{Error, Result};

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserConfig {
    /// OSM XML extract, optionally xz-compressed.
    pub data_path: PathBuf,
    /// Each input gets its own cache directory below this one.
    pub cache_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub rebuild_cache: bool,
}

impl UserConfig {
    pub fn load(path: &Path) -> Result<UserConfig> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Cache directory of the configured input, e.g. `cache/london.osm.xz/`.
    pub fn output_dir(&self) -> Result<PathBuf> {
        let input_fname = self
            .data_path
            .file_name()
            .ok_or_else(|| Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", self.data_path.display()),
            )))?;
        Ok(self.cache_dir.join(input_fname))
    }

    pub fn create_output_dir(&self) -> Result<PathBuf> {
        let output_dir = self.output_dir()?;
        create_dir_all(&output_dir)?;
        Ok(output_dir)
    }
}
