//! Plugin request extracted from a parsed command line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use forj_cli::{CliResult, ForjCli, Param};

use crate::error::{PluginError, PluginResult};

pub const APP_OBJECT: &str = "app";
pub const REPO_OBJECT: &str = "repo";

/// Settings forjj gives to every plugin task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForjSettings {
    pub instance_name: String,
    pub source_mount: String,
    pub deploy_mount: String,
    pub workspace_mount: String,
    pub deployment_env: String,
    pub infra: String,
    pub force: bool,
}

/// Settings of the GitLab application instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub token: String,
    pub server: String,
    pub group: String,
    pub production_group: String,
    pub repos_disabled: bool,
}

/// A repository requested by forjj.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoInstance {
    pub name: String,
    pub title: String,
    pub flow: String,
    pub role: String,
    pub deployable: bool,
    pub issue_tracker: bool,
}

impl RepoInstance {
    /// Checks the repository declared under `key` is named after it.
    pub fn check_name(&self, key: &str) -> Result<(), String> {
        if self.name.is_empty() {
            return Err(format!("Invalid project '{}'. Name is empty.", key));
        }
        if self.name != key {
            return Err(format!(
                "Invalid project '{}'. Name must be equal to '{}'. But the project name is set to '{}'.",
                key, key, self.name
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginRequest {
    pub action: String,
    pub forj: ForjSettings,
    pub app: AppSettings,
    pub repos: BTreeMap<String, RepoInstance>,
}

impl PluginRequest {
    /// Read the request of `action` from a parsed `cli`.
    pub fn from_cli(cli: &ForjCli, action: &str) -> PluginResult<Self> {
        if cli.get_action(action).is_none() {
            return Err(PluginError::InvalidRequest(format!("unknown action '{}'", action)));
        }
        let flag = |name: &str| -> String {
            cli.get_action_param(action, name)
                .and_then(Param::string_value)
                .unwrap_or_default()
                .to_string()
        };
        let forj = ForjSettings {
            instance_name: flag("forjj-instance-name"),
            source_mount: flag("forjj-source-mount"),
            deploy_mount: flag("forjj-deploy-mount"),
            workspace_mount: flag("forjj-workspace-mount"),
            deployment_env: flag("forjj-deployment-env"),
            infra: flag("forjj-infra"),
            force: cli
                .get_action_param(action, "force")
                .map(Param::bool_value)
                .unwrap_or(false),
        };

        let app = AppSettings {
            token: string_value(cli, APP_OBJECT, APP_OBJECT, "token")?,
            server: string_value(cli, APP_OBJECT, APP_OBJECT, "server")?,
            group: string_value(cli, APP_OBJECT, APP_OBJECT, "group")?,
            production_group: string_value(cli, APP_OBJECT, APP_OBJECT, "production-group")?,
            repos_disabled: bool_value(cli, APP_OBJECT, APP_OBJECT, "repos-disabled")?,
        };

        let mut repos = BTreeMap::new();
        let keys: Vec<String> = cli
            .values(REPO_OBJECT)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();
        for key in keys {
            let repo = RepoInstance {
                name: string_value(cli, REPO_OBJECT, &key, "name")?,
                title: string_value(cli, REPO_OBJECT, &key, "title")?,
                flow: string_value(cli, REPO_OBJECT, &key, "flow")?,
                role: string_value(cli, REPO_OBJECT, &key, "role")?,
                deployable: bool_value(cli, REPO_OBJECT, &key, "deployable")?,
                issue_tracker: bool_value(cli, REPO_OBJECT, &key, "issue-tracker")?,
            };
            repos.insert(key, repo);
        }

        Ok(Self {
            action: action.to_string(),
            forj,
            app,
            repos,
        })
    }
}

fn string_value(cli: &ForjCli, object: &str, key: &str, field: &str) -> CliResult<String> {
    Ok(cli
        .get_string_value(object, key, field)?
        .map(|v| v.value)
        .unwrap_or_default())
}

fn bool_value(cli: &ForjCli, object: &str, key: &str, field: &str) -> CliResult<bool> {
    Ok(cli
        .get_bool_value(object, key, field)?
        .map(|v| v.value)
        .unwrap_or(false))
}
