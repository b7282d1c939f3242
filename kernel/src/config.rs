// Service Configuration
//
// Where data lives and which defaults apply when a request leaves
// the map name or comment out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Service configuration loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory of the filesystem blob store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Map used when a request names none.
    #[serde(default = "default_map")]
    pub default_map: String,

    /// Comment used when a commit carries none.
    #[serde(default = "default_comment")]
    pub default_comment: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("maps")
}

fn default_map() -> String {
    "default".into()
}

fn default_comment() -> String {
    "No comment".into()
}

impl ServiceConfig {
    /// Built-in configuration (used if no config file is provided).
    pub fn default_config() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_map: default_map(),
            default_comment: default_comment(),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
