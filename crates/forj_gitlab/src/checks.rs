//! Request checks done before touching any repository.

use std::fs;

use crate::error::{PluginError, PluginResult};

/// What a task needs from its request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checks {
    pub token: bool,
    pub source: bool,
    pub deploy: bool,
    pub workspace: bool,
}

impl Checks {
    pub fn create() -> Self {
        Self {
            token: true,
            source: true,
            deploy: true,
            workspace: false,
        }
    }

    pub fn update() -> Self {
        Self::create()
    }

    pub fn maintain() -> Self {
        Self {
            token: true,
            source: false,
            deploy: true,
            workspace: true,
        }
    }
}

/// Values checked by [`verify`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInput<'a> {
    pub token: &'a str,
    pub source_mount: &'a str,
    pub deploy_mount: &'a str,
    pub workspace_mount: &'a str,
}

/// Fails on the first check not satisfied.
pub fn verify(checks: Checks, input: CheckInput<'_>) -> PluginResult<()> {
    if checks.source {
        check_path("source (forjj-source-mount)", input.source_mount)?;
    }
    if checks.deploy {
        check_path("deploy (forjj-deploy-mount)", input.deploy_mount)?;
    }
    if checks.workspace {
        check_path("workspace (forjj-workspace-mount)", input.workspace_mount)?;
    }
    if checks.token && input.token.is_empty() {
        return Err(PluginError::Check("gitlab token is empty - Required".to_string()));
    }
    Ok(())
}

/// `path` must be set, exist and be writable.
pub fn check_path(name: &str, path: &str) -> PluginResult<()> {
    if path.is_empty() {
        return Err(PluginError::Check(format!("{} is empty.", name)));
    }
    let metadata = fs::metadata(path)
        .map_err(|_| PluginError::Check(format!("{} mounted '{}' is inexistent.", name, path)))?;
    if metadata.permissions().readonly() {
        return Err(PluginError::Check(format!("{} mounted '{}' is NOT writable", name, path)));
    }
    Ok(())
}
