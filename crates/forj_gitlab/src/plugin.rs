//! Plugin state: where the manifests live and how they are built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::answer::PluginData;
use crate::error::{PluginError, PluginResult};
use crate::models::{GitlabDeploy, GitlabSource, ProjectStruct, RepoRemoteUrl, URL_SSH, URL_WEB};
use crate::request::{AppSettings, PluginRequest, RepoInstance};
use crate::store::{manifest_path, GITLAB_FILE};

/// Role of the infra project.
pub const INFRA_ROLE: &str = "infra";

#[derive(Debug, Clone)]
pub struct GitlabPlugin {
    pub instance: String,
    /// `<source mount>/<instance>`
    pub source_path: PathBuf,
    /// `<deploy mount>/<deployment env>/<instance>`
    pub deploy_path: PathBuf,
    pub token: String,
    /// Name of the infra repository.
    pub infra: String,
    pub app: AppSettings,
    pub source: GitlabSource,
    pub deploy: GitlabDeploy,
}

/// What `maintain` does with each project of the deploy manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintainPlan {
    pub maintained: Vec<String>,
    /// Project name -> reason.
    pub ignored: BTreeMap<String, String>,
}

impl GitlabPlugin {
    pub fn new(req: &PluginRequest) -> Self {
        let forj = &req.forj;
        Self {
            instance: forj.instance_name.clone(),
            source_path: Path::new(&forj.source_mount).join(&forj.instance_name),
            deploy_path: Path::new(&forj.deploy_mount)
                .join(&forj.deployment_env)
                .join(&forj.instance_name),
            token: req.app.token.clone(),
            infra: forj.infra.clone(),
            app: req.app.clone(),
            source: GitlabSource::for_server(&req.app.server),
            deploy: GitlabDeploy::default(),
        }
    }

    pub fn source_file(&self) -> PathBuf {
        manifest_path(&self.source_path)
    }

    pub fn deploy_file(&self) -> PathBuf {
        manifest_path(&self.deploy_path)
    }

    /// Manifest path relative to a repository root.
    pub fn git_file(&self) -> String {
        format!("{}/{}", self.instance, GITLAB_FILE)
    }

    /// Group from the application, the instance name otherwise.
    /// The production group defaults to the group.
    pub fn init_group(&mut self) {
        self.deploy.group = if self.app.group.is_empty() {
            self.instance.clone()
        } else {
            self.app.group.clone()
        };
        self.deploy.prod_group = if self.app.production_group.is_empty() {
            self.deploy.group.clone()
        } else {
            self.app.production_group.clone()
        };
    }

    pub fn define_repo_urls(&self, group: &str, name: &str) -> RepoRemoteUrl {
        RepoRemoteUrl {
            ssh: format!("{}{}/{}.git", self.source.url(URL_SSH), group, name),
            url: format!("{}/{}/{}", self.source.url(URL_WEB), group, name),
        }
    }

    pub fn set_project(&mut self, repo: &RepoInstance, is_infra: bool, is_deployable: bool) {
        let owner = if is_infra {
            self.deploy.prod_group.clone()
        } else {
            self.deploy.group.clone()
        };
        let role = if repo.role.is_empty() && is_infra {
            INFRA_ROLE.to_string()
        } else {
            repo.role.clone()
        };
        let project = ProjectStruct {
            name: repo.name.clone(),
            flow: repo.flow.clone(),
            description: repo.title.clone(),
            disabled: false,
            issue_tracker: repo.issue_tracker,
            users: BTreeMap::new(),
            remotes: BTreeMap::from([("origin".to_string(), self.define_repo_urls(&owner, &repo.name))]),
            branch_connect: BTreeMap::from([("master".to_string(), "origin/master".to_string())]),
            infra: is_infra,
            role,
            is_deployable,
            owner,
        };
        self.deploy.projects.insert(repo.name.clone(), project);
    }

    /// Build the deploy manifest of a new forge.
    pub fn create_yaml_data(&mut self, req: &PluginRequest, ret: &mut PluginData) -> PluginResult<()> {
        if self.source.urls.is_empty() {
            return Err(PluginError::Internal("Urls was not set".to_string()));
        }
        self.deploy.projects.clear();
        self.deploy.no_projects = self.app.repos_disabled;
        if self.deploy.no_projects {
            info!("Repositories_disabled is true. forjj_gitlab won't manage repositories except the infra repository.");
        }

        for (name, repo) in &req.repos {
            let is_infra = *name == self.infra;
            if self.deploy.no_projects && !is_infra {
                continue;
            }
            if let Err(msg) = repo.check_name(name) {
                ret.status_add(format!("Warning!!! {} Ignored.", msg));
                continue;
            }
            self.set_project(repo, is_infra, repo.deployable);
        }
        info!("forjj-gitlab manages {} project(s).", self.deploy.projects.len());
        Ok(())
    }

    /// Rebuild the projects of an existing forge.
    ///
    /// Projects no longer requested are kept, disabled. Returns true when
    /// the deploy manifest changed.
    pub fn update_yaml_data(&mut self, req: &PluginRequest, ret: &mut PluginData) -> PluginResult<bool> {
        if self.source.urls.is_empty() {
            return Err(PluginError::Internal("Urls was not set".to_string()));
        }
        let before = self.deploy.clone();

        if self.app.repos_disabled {
            info!("Repos disabled is true. forjj_gitlab won't manage projects except the infra one.");
            self.deploy.no_projects = true;
        } else {
            self.deploy.no_projects = false;
            for (name, repo) in &req.repos {
                if let Err(msg) = repo.check_name(name) {
                    ret.status_add(format!("Warning!!! {} Ignored.", msg));
                    continue;
                }
                self.set_project(repo, *name == self.infra, repo.deployable);
            }
            for (name, project) in self.deploy.projects.iter_mut() {
                if !req.repos.contains_key(name) && !project.disabled {
                    project.disabled = true;
                    ret.status_add(format!("Project '{}' disabled.", name));
                }
            }
        }
        Ok(self.deploy != before)
    }

    pub fn maintain_plan(&self) -> MaintainPlan {
        let mut plan = MaintainPlan::default();
        for (name, project) in &self.deploy.projects {
            let reason = if !project.infra && self.deploy.no_projects {
                Some("repositories disabled".to_string())
            } else if project.role == INFRA_ROLE && !project.is_deployable {
                Some(format!("Infra project owned by '{}'", self.deploy.prod_group))
            } else if project.disabled {
                Some("disabled".to_string())
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    plan.ignored.insert(name.clone(), reason);
                }
                None => plan.maintained.push(name.clone()),
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ForjSettings;

    fn repo(name: &str) -> RepoInstance {
        RepoInstance {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn request() -> PluginRequest {
        let mut req = PluginRequest {
            action: "create".to_string(),
            forj: ForjSettings {
                instance_name: "gitlab".to_string(),
                source_mount: "/src".to_string(),
                deploy_mount: "/deploy".to_string(),
                deployment_env: "production".to_string(),
                infra: "infra".to_string(),
                ..Default::default()
            },
            app: AppSettings {
                token: "abc".to_string(),
                server: "gitlab.com".to_string(),
                group: "forge".to_string(),
                production_group: "forge-prod".to_string(),
                repos_disabled: false,
            },
            repos: BTreeMap::new(),
        };
        for name in ["infra", "demo"] {
            req.repos.insert(name.to_string(), repo(name));
        }
        req
    }

    #[test]
    fn test_paths() {
        let plugin = GitlabPlugin::new(&request());
        assert_eq!(plugin.source_file(), Path::new("/src/gitlab/forjj-gitlab.yaml"));
        assert_eq!(plugin.deploy_file(), Path::new("/deploy/production/gitlab/forjj-gitlab.yaml"));
        assert_eq!(plugin.git_file(), "gitlab/forjj-gitlab.yaml");
    }

    #[test]
    fn test_init_group_defaults() {
        let mut req = request();
        req.app.group.clear();
        req.app.production_group.clear();
        let mut plugin = GitlabPlugin::new(&req);
        plugin.init_group();
        assert_eq!(plugin.deploy.group, "gitlab");
        assert_eq!(plugin.deploy.prod_group, "gitlab");
    }

    #[test]
    fn test_create_yaml_data() {
        let mut req = request();
        req.repos.insert("bad".to_string(), repo("other"));
        let mut plugin = GitlabPlugin::new(&req);
        plugin.init_group();
        let mut ret = PluginData::default();
        plugin.create_yaml_data(&req, &mut ret).unwrap();

        assert_eq!(plugin.deploy.projects.len(), 2);
        assert!(ret.status.contains("Warning!!! Invalid project 'bad'"));

        let infra = &plugin.deploy.projects["infra"];
        assert!(infra.infra);
        assert_eq!(infra.role, INFRA_ROLE);
        assert_eq!(infra.owner, "forge-prod");
        assert_eq!(infra.remotes["origin"].ssh, "git@gitlab.com:forge-prod/infra.git");

        let demo = &plugin.deploy.projects["demo"];
        assert!(!demo.infra);
        assert_eq!(demo.owner, "forge");
        assert_eq!(demo.remotes["origin"].url, "https://gitlab.com/forge/demo");
        assert_eq!(demo.branch_connect["master"], "origin/master");
    }

    #[test]
    fn test_repos_disabled_keeps_infra_only() {
        let mut req = request();
        req.app.repos_disabled = true;
        let mut plugin = GitlabPlugin::new(&req);
        plugin.init_group();
        plugin.create_yaml_data(&req, &mut PluginData::default()).unwrap();

        assert!(plugin.deploy.no_projects);
        assert_eq!(plugin.deploy.projects.keys().collect::<Vec<_>>(), vec!["infra"]);
    }

    #[test]
    fn test_update_disables_missing_projects() {
        let req = request();
        let mut plugin = GitlabPlugin::new(&req);
        plugin.init_group();
        plugin.create_yaml_data(&req, &mut PluginData::default()).unwrap();

        let mut ret = PluginData::default();
        assert!(!plugin.update_yaml_data(&req, &mut ret).unwrap());

        let mut req = req;
        req.repos.remove("demo");
        assert!(plugin.update_yaml_data(&req, &mut ret).unwrap());
        assert!(plugin.deploy.projects["demo"].disabled);
        assert!(ret.status.contains("Project 'demo' disabled."));
    }

    #[test]
    fn test_maintain_plan() {
        let mut req = request();
        req.repos.insert("tools".to_string(), repo("tools"));
        let mut plugin = GitlabPlugin::new(&req);
        plugin.init_group();
        plugin.create_yaml_data(&req, &mut PluginData::default()).unwrap();

        let plan = plugin.maintain_plan();
        assert_eq!(plan.maintained, vec!["demo", "tools"]);
        assert_eq!(plan.ignored["infra"], "Infra project owned by 'forge-prod'");

        plugin.deploy.no_projects = true;
        if let Some(infra) = plugin.deploy.projects.get_mut("infra") {
            infra.is_deployable = true;
        }
        let plan = plugin.maintain_plan();
        assert_eq!(plan.maintained, vec!["infra"]);
        assert_eq!(plan.ignored.len(), 2);
    }
}
