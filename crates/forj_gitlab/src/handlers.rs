//! `create`, `update` and `maintain` tasks.
//!
//! Each task fills a [`PluginData`] answer. Failures end up in its
//! `error_message`, the status keeps what was done before.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::answer::{PluginData, FILES_DEPLOY, FILES_SOURCE};
use crate::api::GitlabApi;
use crate::checks::{verify, CheckInput, Checks};
use crate::error::{PluginError, PluginResult};
use crate::models::{GitlabDeploy, GitlabSource, URL_BASE};
use crate::plugin::GitlabPlugin;
use crate::request::PluginRequest;
use crate::store::{load_yaml, save_yaml};

/// Run the task named by `req.action`.
pub async fn run(req: &PluginRequest, api: Option<&dyn GitlabApi>) -> PluginData {
    match req.action.as_str() {
        "create" => do_create(req, api).await,
        "update" => do_update(req, api).await,
        "maintain" => do_maintain(req, api).await,
        other => {
            let mut ret = PluginData::default();
            ret.error(format!("Action '{}' is not a plugin task.", other));
            ret
        }
    }
}

pub async fn do_create(req: &PluginRequest, api: Option<&dyn GitlabApi>) -> PluginData {
    let mut ret = PluginData::default();
    if let Err(e) = create(req, api, &mut ret).await {
        warn!("create failed: {}", e);
        ret.error(e.to_string());
    }
    ret
}

pub async fn do_update(req: &PluginRequest, api: Option<&dyn GitlabApi>) -> PluginData {
    let mut ret = PluginData::default();
    if let Err(e) = update(req, api, &mut ret).await {
        warn!("update failed: {}", e);
        ret.error(e.to_string());
    }
    ret
}

pub async fn do_maintain(req: &PluginRequest, api: Option<&dyn GitlabApi>) -> PluginData {
    let mut ret = PluginData::default();
    if let Err(e) = maintain(req, api, &mut ret).await {
        warn!("maintain failed: {}", e);
        ret.error(e.to_string());
    }
    ret
}

fn check_request(req: &PluginRequest, checks: Checks) -> PluginResult<()> {
    if req.forj.instance_name.is_empty() {
        return Err(PluginError::InvalidRequest(
            "Forjj has not given the instance name. Aborted.".to_string(),
        ));
    }
    verify(
        checks,
        CheckInput {
            token: &req.app.token,
            source_mount: &req.forj.source_mount,
            deploy_mount: &req.forj.deploy_mount,
            workspace_mount: &req.forj.workspace_mount,
        },
    )
}

/// Check the token against the server.
async fn connect(api: Option<&dyn GitlabApi>, ret: &mut PluginData) -> PluginResult<()> {
    let Some(api) = api else {
        let msg = ret.status_add("No GitLab connection. Server checks skipped.");
        info!("{}", msg);
        return Ok(());
    };
    ret.status_add("Connect to gitlab...");
    let user = api
        .current_user()
        .await
        .map_err(|e| PluginError::Gitlab(format!("Unable to get the owner of the token given. {}", e)))?;
    let msg = ret.status_add(format!("Connection successful ({}).", user.username));
    info!("{}", msg);
    Ok(())
}

async fn create(req: &PluginRequest, api: Option<&dyn GitlabApi>, ret: &mut PluginData) -> PluginResult<()> {
    check_request(req, Checks::create())?;
    let mut plugin = GitlabPlugin::new(req);
    info!("Checking parameters of instance '{}'", plugin.instance);

    connect(api, ret).await?;
    plugin.init_group();
    plugin.create_yaml_data(req, ret)?;

    if let (Some(api), false) = (api, plugin.infra.is_empty()) {
        let path = format!("{}/{}", plugin.deploy.prod_group, plugin.infra);
        if api.get_project(&path).await?.is_some() {
            return Err(PluginError::InfraExists(path));
        }
    }
    if plugin.source_file().exists() {
        return Err(PluginError::SourceExists(plugin.source_path.clone()));
    }
    ret.status_add("Environment checked. Ready to be created.");

    let git_file = plugin.git_file();
    save_yaml(&plugin.source, &plugin.source_file())?;
    let msg = ret.status_add(format!(
        "Configuration saved in source project '{}' ({}).",
        git_file, req.forj.source_mount
    ));
    info!("{}", msg);
    save_yaml(&plugin.deploy, &plugin.deploy_file())?;
    let msg = ret.status_add(format!(
        "Configuration saved in deploy project '{}' ({}/{}).",
        git_file, req.forj.deploy_mount, req.forj.deployment_env
    ));
    info!("{}", msg);

    answer_services(&plugin.source, ret);
    ret.commit_message = "Gitlab configuration created.".to_string();
    ret.add_file(FILES_SOURCE, git_file.clone());
    ret.add_file(FILES_DEPLOY, git_file);
    Ok(())
}

async fn update(req: &PluginRequest, api: Option<&dyn GitlabApi>, ret: &mut PluginData) -> PluginResult<()> {
    check_request(req, Checks::update())?;
    let mut plugin = GitlabPlugin::new(req);

    let source_file = plugin.source_file();
    if !source_file.exists() {
        return Err(PluginError::MissingConfiguration(source_file));
    }
    let requested = plugin.source.clone();
    plugin.source = load_yaml(&source_file)?;
    let mut source_changed = false;
    if plugin.source != requested {
        ret.status_add("GitLab server urls updated.");
        plugin.source = requested;
        source_changed = true;
    }

    let deploy_file = plugin.deploy_file();
    if deploy_file.exists() {
        plugin.deploy = load_yaml::<GitlabDeploy>(&deploy_file)?;
    }
    connect(api, ret).await?;
    let before = plugin.deploy.clone();
    plugin.init_group();
    plugin.update_yaml_data(req, ret)?;
    let deploy_changed = plugin.deploy != before;

    if !source_changed && !deploy_changed {
        let msg = ret.status_add("No update detected.");
        info!("{}", msg);
        return Ok(());
    }

    let git_file = plugin.git_file();
    if source_changed {
        save_yaml(&plugin.source, &source_file)?;
        ret.add_file(FILES_SOURCE, git_file.clone());
    }
    save_yaml(&plugin.deploy, &deploy_file)?;
    ret.add_file(FILES_DEPLOY, git_file.clone());
    let msg = ret.status_add(format!("Configuration updated in '{}'.", git_file));
    info!("{}", msg);

    answer_services(&plugin.source, ret);
    ret.commit_message = "Gitlab configuration updated.".to_string();
    Ok(())
}

async fn maintain(req: &PluginRequest, api: Option<&dyn GitlabApi>, ret: &mut PluginData) -> PluginResult<()> {
    check_request(req, Checks::maintain())?;
    let mut plugin = GitlabPlugin::new(req);

    let deploy_file = plugin.deploy_file();
    if !deploy_file.exists() {
        return Err(PluginError::MissingConfiguration(deploy_file));
    }
    plugin.deploy = load_yaml(&deploy_file)?;
    connect(api, ret).await?;

    if plugin.deploy.no_projects {
        let msg = ret.status_add("Projects maintained limited to your infra project");
        info!("{}", msg);
    }
    let plan = plugin.maintain_plan();
    for (name, reason) in &plan.ignored {
        let msg = ret.status_add(format!("Project ignored: {} - {}", name, reason));
        info!("{}", msg);
    }

    if let Some(api) = api {
        let owners: BTreeSet<&str> = plan
            .maintained
            .iter()
            .filter_map(|name| plugin.deploy.projects.get(name))
            .map(|p| owner_of(p.owner.as_str(), &plugin.deploy.group))
            .chain(std::iter::once(plugin.deploy.group.as_str()))
            .collect();
        for group in owners {
            ensure_group_exists(api, group, ret).await?;
        }
        for name in &plan.maintained {
            let Some(project) = plugin.deploy.projects.get(name) else {
                continue;
            };
            let owner = owner_of(&project.owner, &plugin.deploy.group);
            let path = format!("{}/{}", owner, name);
            if api.get_project(&path).await?.is_none() {
                api.create_project(owner, name, &project.description).await?;
                let msg = ret.status_add(format!("Project created: {}", path));
                info!("{}", msg);
            }
        }
    }

    for name in &plan.maintained {
        let msg = ret.status_add(format!("Project maintained: {}", name));
        info!("{}", msg);
    }
    Ok(())
}

fn owner_of<'a>(owner: &'a str, group: &'a str) -> &'a str {
    if owner.is_empty() {
        group
    } else {
        owner
    }
}

async fn ensure_group_exists(api: &dyn GitlabApi, group: &str, ret: &mut PluginData) -> PluginResult<()> {
    if api.search_group(group).await?.is_none() {
        api.create_group(group).await?;
        let msg = ret.status_add(format!("Group '{}' created.", group));
        info!("{}", msg);
    }
    Ok(())
}

fn answer_services(source: &GitlabSource, ret: &mut PluginData) {
    for (k, v) in &source.urls {
        ret.services.urls.insert(k.clone(), v.clone());
    }
    ret.services
        .urls
        .insert("api_url".to_string(), source.url(URL_BASE).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{AppSettings, ForjSettings, RepoInstance};
    use tempfile::{tempdir, TempDir};

    fn request(action: &str, mounts: &[TempDir; 3]) -> PluginRequest {
        let mount = |i: usize| mounts[i].path().to_string_lossy().to_string();
        let infra = RepoInstance {
            name: "infra".to_string(),
            title: "infra project".to_string(),
            ..Default::default()
        };
        PluginRequest {
            action: action.to_string(),
            forj: ForjSettings {
                instance_name: "gitlab".to_string(),
                source_mount: mount(0),
                deploy_mount: mount(1),
                workspace_mount: mount(2),
                deployment_env: "production".to_string(),
                infra: "infra".to_string(),
                force: false,
            },
            app: AppSettings {
                token: "abc".to_string(),
                server: "gitlab.com".to_string(),
                group: "forge".to_string(),
                ..Default::default()
            },
            repos: [("infra".to_string(), infra)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_status_kept_when_info_is_disabled() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        let mounts = [tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap()];

        let ret = do_create(&request("create", &mounts), None).await;
        assert!(!ret.is_error(), "{}", ret.error_message);
        assert!(ret.status.contains("Server checks skipped"));
        assert!(ret.status.contains("Configuration saved in deploy project"));

        assert!(!do_update(&request("update", &mounts), None).await.is_error());
        let ret = do_update(&request("update", &mounts), None).await;
        assert!(!ret.is_error(), "{}", ret.error_message);
        assert!(ret.status.contains("No update detected."));
    }
}
