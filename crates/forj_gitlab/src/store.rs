//! YAML manifest persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{PluginError, PluginResult};

/// Name of the manifest file in each repository.
pub const GITLAB_FILE: &str = "forjj-gitlab.yaml";

/// `<dir>/forjj-gitlab.yaml`.
pub fn manifest_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(GITLAB_FILE)
}

/// Write `value` as YAML. Missing parent directories are created.
pub fn save_yaml<T: Serialize>(value: &T, path: &Path) -> PluginResult<()> {
    debug!("Writing {:?}", path);
    let content = serde_yaml::to_string(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PluginError::Save {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| PluginError::Save {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> PluginResult<T> {
    debug!("Reading {:?}", path);
    let content = fs::read_to_string(path).map_err(|source| PluginError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}
