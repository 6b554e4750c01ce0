// Host configuration, deserialized from weft.toml.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{WeftError, WeftResult};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Root directory for new execution contexts when the caller gives none.
    /// Defaults to "." (current directory).
    #[serde(default = "default_application_base")]
    pub application_base: PathBuf,

    /// Load the engine wrapper assembly as soon as a context binds its tables.
    #[serde(default = "default_true")]
    pub load_engine_assembly: bool,

    /// Assemblies loaded best-effort after binding, in order.
    #[serde(default)]
    pub preload_assemblies: Vec<String>,
}

fn default_application_base() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            application_base: default_application_base(),
            load_engine_assembly: true,
            preload_assemblies: Vec::new(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(text: &str) -> WeftResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> WeftResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| WeftError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        HostConfig::from_toml_str(&text)
    }
}
