//! GitLab client interface used by the plugin tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PluginResult;

/// Owner of the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabUser {
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabGroup {
    pub id: u64,
    pub name: String,
    pub full_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabProject {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: String,
}

/// GitLab REST operations the plugin relies on.
#[async_trait]
pub trait GitlabApi: Send + Sync {
    /// Owner of the token. Fails when the token is rejected.
    async fn current_user(&self) -> PluginResult<GitlabUser>;

    /// Project by its full path, `None` if it does not exist.
    async fn get_project(&self, path: &str) -> PluginResult<Option<GitlabProject>>;

    async fn create_project(&self, group: &str, name: &str, description: &str) -> PluginResult<GitlabProject>;

    /// Group by its full path, `None` if it does not exist.
    async fn search_group(&self, name: &str) -> PluginResult<Option<GitlabGroup>>;

    async fn create_group(&self, name: &str) -> PluginResult<GitlabGroup>;
}
