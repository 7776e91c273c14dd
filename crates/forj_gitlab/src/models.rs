//! Manifests written in the source and deploy repositories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Url keys of [`GitlabSource::urls`].
pub const URL_BASE: &str = "gitlab-base-url";
pub const URL_WEB: &str = "gitlab-url";
pub const URL_SSH: &str = "gitlab-ssh";

/// Manifest of the source repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitlabSource {
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

impl GitlabSource {
    /// Urls of a GitLab server, `gitlab.com` when `server` is empty.
    pub fn for_server(server: &str) -> Self {
        let server = server.trim_end_matches('/');
        let server = if server.is_empty() { "gitlab.com" } else { server };
        let host = server
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let web = if server.contains("://") {
            server.to_string()
        } else {
            format!("https://{}", server)
        };

        let urls = BTreeMap::from([
            (URL_BASE.to_string(), format!("{}/api/v4/", web)),
            (URL_WEB.to_string(), web),
            (URL_SSH.to_string(), format!("git@{}:", host)),
        ]);
        Self { urls }
    }

    pub fn url(&self, key: &str) -> &str {
        self.urls.get(key).map(String::as_str).unwrap_or_default()
    }
}

/// Manifest of the deploy repository, read by `maintain`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitlabDeploy {
    #[serde(default)]
    pub group: String,
    #[serde(rename = "production-group", default)]
    pub prod_group: String,
    #[serde(rename = "no-projects", default)]
    pub no_projects: bool,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectStruct>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoRemoteUrl {
    pub ssh: String,
    pub url: String,
}

/// One project managed by the plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectStruct {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flow: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(rename = "issue_tracker", default, skip_serializing_if = "is_false")]
    pub issue_tracker: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remotes: BTreeMap<String, RepoRemoteUrl>,
    #[serde(rename = "branch-connect", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_connect: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub infra: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(rename = "is-deployable", default)]
    pub is_deployable: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_for_server() {
        let source = GitlabSource::for_server("");
        assert_eq!(source.url(URL_WEB), "https://gitlab.com");
        assert_eq!(source.url(URL_SSH), "git@gitlab.com:");
        assert_eq!(source.url(URL_BASE), "https://gitlab.com/api/v4/");

        let source = GitlabSource::for_server("http://git.example.org/");
        assert_eq!(source.url(URL_WEB), "http://git.example.org");
        assert_eq!(source.url(URL_SSH), "git@git.example.org:");
        assert_eq!(source.url("unknown"), "");
    }

    #[test]
    fn test_project_yaml_skips_empty_fields() {
        let project = ProjectStruct {
            name: "demo".to_string(),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&project).unwrap();
        assert!(yaml.contains("name: demo"));
        assert!(yaml.contains("is-deployable: false"));
        assert!(!yaml.contains("flow"));
        assert!(!yaml.contains("infra"));
    }
}
