//! Mock GitLab server for testing.
//!
//! Keeps groups and projects in memory and records every call, so the
//! plugin tasks can be exercised without a GitLab instance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::{GitlabApi, GitlabGroup, GitlabProject, GitlabUser};
use crate::error::{PluginError, PluginResult};

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    pub method: String,
    pub target: String,
}

#[derive(Clone)]
pub struct MockGitlab {
    /// Token owner. `None` rejects the token.
    user: Arc<RwLock<Option<String>>>,
    groups: Arc<RwLock<BTreeMap<String, GitlabGroup>>>,
    /// Full path -> project.
    projects: Arc<RwLock<BTreeMap<String, GitlabProject>>>,
    next_id: Arc<AtomicU64>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl Default for MockGitlab {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGitlab {
    pub fn new() -> Self {
        Self {
            user: Arc::new(RwLock::new(Some("forjj".to_string()))),
            groups: Arc::new(RwLock::new(BTreeMap::new())),
            projects: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Reject the token on `current_user`.
    pub fn reject_token(self) -> Self {
        *self.user.write() = None;
        self
    }

    pub fn add_existing_group(self, name: &str) -> Self {
        let group = self.new_group(name);
        self.groups.write().insert(name.to_string(), group);
        self
    }

    pub fn add_existing_project(self, group: &str, name: &str) -> Self {
        let project = self.new_project(group, name, "");
        self.projects
            .write()
            .insert(project.path_with_namespace.clone(), project);
        self
    }

    /// Every call fails with `message`.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.method == method)
    }

    /// Targets of the calls to `method`.
    pub fn get_method_calls(&self, method: &str) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.read().contains_key(name)
    }

    pub fn has_project(&self, path: &str) -> bool {
        self.projects.read().contains_key(path)
    }

    fn record_call(&self, method: &str, target: &str) -> PluginResult<()> {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            target: target.to_string(),
        });
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(PluginError::Gitlab(msg));
        }
        Ok(())
    }

    fn new_group(&self, name: &str) -> GitlabGroup {
        GitlabGroup {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.rsplit('/').next().unwrap_or(name).to_string(),
            full_path: name.to_string(),
        }
    }

    fn new_project(&self, group: &str, name: &str, description: &str) -> GitlabProject {
        GitlabProject {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            path_with_namespace: format!("{}/{}", group, name),
            description: description.to_string(),
        }
    }
}

#[async_trait]
impl GitlabApi for MockGitlab {
    async fn current_user(&self) -> PluginResult<GitlabUser> {
        self.record_call("current_user", "")?;
        let user = self.user.read().clone();
        match user {
            Some(username) => Ok(GitlabUser { id: 1, username }),
            None => Err(PluginError::Gitlab("401 Unauthorized".to_string())),
        }
    }

    async fn get_project(&self, path: &str) -> PluginResult<Option<GitlabProject>> {
        self.record_call("get_project", path)?;
        Ok(self.projects.read().get(path).cloned())
    }

    async fn create_project(&self, group: &str, name: &str, description: &str) -> PluginResult<GitlabProject> {
        let path = format!("{}/{}", group, name);
        self.record_call("create_project", &path)?;
        if self.projects.read().contains_key(&path) {
            return Err(PluginError::Gitlab(format!("project '{}' has already been taken", path)));
        }
        let project = self.new_project(group, name, description);
        self.projects.write().insert(path, project.clone());
        Ok(project)
    }

    async fn search_group(&self, name: &str) -> PluginResult<Option<GitlabGroup>> {
        self.record_call("search_group", name)?;
        Ok(self.groups.read().get(name).cloned())
    }

    async fn create_group(&self, name: &str) -> PluginResult<GitlabGroup> {
        self.record_call("create_group", name)?;
        let group = self.new_group(name);
        self.groups.write().insert(name.to_string(), group.clone());
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_projects() {
        let mock = MockGitlab::new().add_existing_project("forge", "infra");
        assert!(mock.get_project("forge/infra").await.unwrap().is_some());
        assert!(mock.get_project("forge/demo").await.unwrap().is_none());

        let project = mock.create_project("forge", "demo", "Demo").await.unwrap();
        assert_eq!(project.path_with_namespace, "forge/demo");
        assert!(mock.create_project("forge", "demo", "").await.is_err());
        assert_eq!(mock.get_method_calls("get_project"), vec!["forge/infra", "forge/demo"]);
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let mock = MockGitlab::new().reject_token();
        assert!(mock.current_user().await.is_err());

        let mock = MockGitlab::new().simulate_failure("down");
        let err = mock.search_group("forge").await.unwrap_err();
        assert_eq!(err.to_string(), "GitLab API error: down");
        assert!(mock.was_called("search_group"));
    }
}
