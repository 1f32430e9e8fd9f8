/// Configuration module.
///
/// Gets custom config values from environment variables and an optional
/// JSON config file.  Values set as environment variables override like
/// values in the config file.
use crate::codec::CodecKind;
use crate::error::{BackendError, Result};
use crate::geometry::CubeDimOverride;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

const CONFIG_ENV_NAME: &str = "VOXELSTORE_CONFIG";
const CONFIG_DEFAULT: &str = "voxelstore.json";

const DB_URL_ENV_NAME: &str = "VOXELSTORE_DB_URL";
const DB_URL_DEFAULT: &str = "voxelstore.db";

const DATA_ROOT_ENV_NAME: &str = "VOXELSTORE_DATA_ROOT";

/// Store per-project cube files off of this folder.
pub const DATA_ROOT_DEFAULT: &str = "data";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection string for the project/dataset metadata database.
    pub metadata_db_url: String,
    /// Root folder for per-project cube and index data.
    pub data_root: String,
    /// Codec applied to cube payloads on write.
    pub codec: CodecKind,
    /// Per-dataset cube dimension overrides, keyed by dataset name and
    /// resolution level.
    pub cube_dim_overrides: Vec<CubeDimOverride>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            metadata_db_url: DB_URL_DEFAULT.to_string(),
            data_root: DATA_ROOT_DEFAULT.to_string(),
            codec: CodecKind::Zlib,
            cube_dim_overrides: Vec::new(),
        }
    }
}

impl Config {
    /// Load the configuration.  First checks the `VOXELSTORE_CONFIG`
    /// environment variable for a config file path, then the default
    /// path.  A missing file yields the defaults; a present but malformed
    /// file is an error.
    pub fn load() -> Result<Config> {
        let path = env::var(CONFIG_ENV_NAME).unwrap_or_else(|_| CONFIG_DEFAULT.to_string());
        let mut config = if Path::new(&path).exists() {
            Config::from_file(&path)?
        } else {
            Config::default()
        };

        if let Ok(url) = env::var(DB_URL_ENV_NAME) {
            config.metadata_db_url = url;
        }
        if let Ok(root) = env::var(DATA_ROOT_ENV_NAME) {
            config.data_root = root;
        }
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(BackendError::Io)?;
        let config = serde_json::from_str(&text)
            .map_err(|e| BackendError::Configuration(format!("could not parse {}: {}", path, e)))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(DB_URL_DEFAULT, config.metadata_db_url);
        assert_eq!(DATA_ROOT_DEFAULT, config.data_root);
        assert!(config.cube_dim_overrides.is_empty());
    }

    #[test]
    fn parse_overrides() {
        let text = r#"{
            "data_root": "/srv/cubes",
            "codec": "zlib",
            "cube_dim_overrides": [
                {"dataset": "bock11", "level": 5, "cube_dim": [128, 128, 16]}
            ]
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert_eq!("/srv/cubes", config.data_root);
        assert_eq!(1, config.cube_dim_overrides.len());
        assert_eq!("bock11", config.cube_dim_overrides[0].dataset);
        assert_eq!([128, 128, 16], config.cube_dim_overrides[0].cube_dim);
    }
}
