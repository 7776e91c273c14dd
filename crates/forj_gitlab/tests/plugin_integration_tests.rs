//! Integration tests for the gitlab plugin: command line to manifests.

use std::collections::BTreeMap;
use std::path::Path;

use forj_cli::{ClapEngine, MockEngine};
use forj_gitlab::{
    load_yaml, new_cli, run, AppSettings, ForjSettings, GitlabApi, GitlabDeploy, GitlabSource, MockGitlab,
    PluginData, PluginDescriptor, PluginRequest, RepoInstance, FILES_DEPLOY, FILES_SOURCE,
};
use tempfile::{tempdir, TempDir};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

struct Mounts {
    source: TempDir,
    deploy: TempDir,
    workspace: TempDir,
}

impl Mounts {
    fn new() -> Self {
        Self {
            source: tempdir().unwrap(),
            deploy: tempdir().unwrap(),
            workspace: tempdir().unwrap(),
        }
    }

    fn request(&self, action: &str, repos: &[&str]) -> PluginRequest {
        let repos = repos
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    RepoInstance {
                        name: name.to_string(),
                        title: format!("{} project", name),
                        ..Default::default()
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        PluginRequest {
            action: action.to_string(),
            forj: ForjSettings {
                instance_name: "gitlab".to_string(),
                source_mount: path_str(self.source.path()),
                deploy_mount: path_str(self.deploy.path()),
                workspace_mount: path_str(self.workspace.path()),
                deployment_env: "production".to_string(),
                infra: "infra".to_string(),
                force: false,
            },
            app: AppSettings {
                token: "abc".to_string(),
                server: "gitlab.com".to_string(),
                group: "forge".to_string(),
                production_group: String::new(),
                repos_disabled: false,
            },
            repos,
        }
    }

    fn deploy_manifest(&self) -> GitlabDeploy {
        load_yaml(&self.deploy.path().join("production/gitlab/forjj-gitlab.yaml")).unwrap()
    }
}

async fn run_with(req: &PluginRequest, mock: &MockGitlab) -> PluginData {
    run(req, Some(mock as &dyn GitlabApi)).await
}

#[test]
fn test_request_from_command_line() {
    let engine = MockEngine::new("forjj-gitlab");
    let desc = PluginDescriptor::embedded().unwrap();
    let mut cli = new_cli(engine, &desc).unwrap();

    let cmd = cli
        .parse(
            &args(&[
                "cmd:create",
                "forjj-instance-name",
                "gitlab",
                "forjj-source-mount",
                "/src",
                "forjj-infra",
                "infra",
                "token",
                "abc",
                "group",
                "forge",
                "repos",
                "infra,demo:gitflow",
                "demo-title",
                "Demo project",
                "demo-deployable",
                "true",
            ]),
            &mut (),
        )
        .unwrap();
    assert_eq!(cmd.names(), ["create"]);

    let req = PluginRequest::from_cli(&cli, "create").unwrap();
    assert_eq!(req.forj.instance_name, "gitlab");
    assert_eq!(req.forj.source_mount, "/src");
    assert_eq!(req.forj.deployment_env, "production");
    assert_eq!(req.forj.infra, "infra");
    assert_eq!(req.app.token, "abc");
    assert_eq!(req.app.group, "forge");
    assert_eq!(req.app.server, "gitlab.com");

    assert_eq!(req.repos.keys().collect::<Vec<_>>(), vec!["demo", "infra"]);
    let demo = &req.repos["demo"];
    assert_eq!(demo.name, "demo");
    assert_eq!(demo.flow, "gitflow");
    assert_eq!(demo.title, "Demo project");
    assert!(demo.deployable);
    assert_eq!(req.repos["infra"].flow, "");
}

#[test]
fn test_request_with_clap_engine() {
    let desc = PluginDescriptor::embedded().unwrap();
    let engine = ClapEngine::new("forjj-gitlab").with_version(desc.version.clone());
    let mut cli = new_cli(engine, &desc).unwrap();

    cli.parse(
        &args(&[
            "create",
            "--forjj-instance-name",
            "gitlab",
            "--token",
            "abc",
            "--repos",
            "infra,demo",
        ]),
        &mut (),
    )
    .unwrap();

    let req = PluginRequest::from_cli(&cli, "create").unwrap();
    assert_eq!(req.forj.instance_name, "gitlab");
    assert_eq!(req.app.token, "abc");
    assert_eq!(req.repos.len(), 2);
    assert!(cli.get_action_param("create", "demo-title").is_some());
}

#[test]
fn test_missing_instance_name_fails_parse() {
    let desc = PluginDescriptor::embedded().unwrap();
    let mut cli = new_cli(MockEngine::new("forjj-gitlab"), &desc).unwrap();
    let err = cli.parse(&args(&["cmd:maintain", "token", "abc"]), &mut ()).unwrap_err();
    assert!(err.to_string().contains("forjj-instance-name"));
}

#[tokio::test]
async fn test_create_writes_manifests() {
    let mounts = Mounts::new();
    let mock = MockGitlab::new();
    let ret = run_with(&mounts.request("create", &["infra", "demo"]), &mock).await;

    assert_eq!(ret.error_message, "");
    assert_eq!(ret.files[FILES_SOURCE], vec!["gitlab/forjj-gitlab.yaml"]);
    assert_eq!(ret.files[FILES_DEPLOY], vec!["gitlab/forjj-gitlab.yaml"]);
    assert_eq!(ret.commit_message, "Gitlab configuration created.");
    assert_eq!(ret.services.urls["api_url"], "https://gitlab.com/api/v4/");
    assert!(ret.status.contains("Environment checked. Ready to be created."));

    let source: GitlabSource = load_yaml(&mounts.source.path().join("gitlab/forjj-gitlab.yaml")).unwrap();
    assert_eq!(source, GitlabSource::for_server("gitlab.com"));

    let deploy = mounts.deploy_manifest();
    assert_eq!(deploy.group, "forge");
    assert_eq!(deploy.prod_group, "forge");
    assert!(deploy.projects["infra"].infra);
    assert_eq!(deploy.projects["demo"].description, "demo project");

    assert!(mock.was_called("current_user"));
    assert_eq!(mock.get_method_calls("get_project"), vec!["forge/infra"]);
}

#[tokio::test]
async fn test_create_refuses_existing_source() {
    let mounts = Mounts::new();
    let mock = MockGitlab::new();
    let req = mounts.request("create", &["infra"]);
    assert!(!run_with(&req, &mock).await.is_error());

    let ret = run_with(&req, &mock).await;
    assert!(ret.error_message.contains("which already exist"));
}

#[tokio::test]
async fn test_create_refuses_existing_infra_project() {
    let mounts = Mounts::new();
    let mock = MockGitlab::new().add_existing_project("forge", "infra");
    let ret = run_with(&mounts.request("create", &["infra", "demo"]), &mock).await;

    assert!(ret
        .error_message
        .starts_with("Infra project 'forge/infra' already exists."));
    assert!(!mounts.source.path().join("gitlab").exists());
    assert!(ret.files.is_empty());
}

#[tokio::test]
async fn test_create_with_rejected_token() {
    let mounts = Mounts::new();
    let mock = MockGitlab::new().reject_token();
    let ret = run_with(&mounts.request("create", &["infra"]), &mock).await;
    assert!(ret
        .error_message
        .starts_with("GitLab API error: Unable to get the owner of the token given."));
}

#[tokio::test]
async fn test_create_offline() {
    let mounts = Mounts::new();
    let ret = run(&mounts.request("create", &["infra"]), None).await;
    assert!(!ret.is_error(), "{}", ret.error_message);
    assert!(ret.status.contains("Server checks skipped"));
    assert!(mounts.source.path().join("gitlab/forjj-gitlab.yaml").exists());
}

#[tokio::test]
async fn test_empty_token_is_refused() {
    let mounts = Mounts::new();
    let mut req = mounts.request("create", &["infra"]);
    req.app.token.clear();
    let ret = run(&req, None).await;
    assert_eq!(ret.error_message, "gitlab token is empty - Required");
}

#[tokio::test]
async fn test_update_disables_removed_projects() {
    let mounts = Mounts::new();
    let mock = MockGitlab::new();
    assert!(!run_with(&mounts.request("create", &["infra", "demo"]), &mock).await.is_error());

    let ret = run_with(&mounts.request("update", &["infra"]), &mock).await;
    assert_eq!(ret.error_message, "");
    assert_eq!(ret.commit_message, "Gitlab configuration updated.");
    assert!(!ret.files.contains_key(FILES_SOURCE));
    assert_eq!(ret.files[FILES_DEPLOY], vec!["gitlab/forjj-gitlab.yaml"]);
    assert!(mounts.deploy_manifest().projects["demo"].disabled);

    let ret = run_with(&mounts.request("update", &["infra"]), &mock).await;
    assert!(ret.status.contains("No update detected."));
    assert!(ret.files.is_empty());
}

#[tokio::test]
async fn test_update_without_configuration() {
    let mounts = Mounts::new();
    let ret = run(&mounts.request("update", &["infra"]), None).await;
    assert!(ret.error_message.starts_with("Unable to find the gitlab configuration"));
}

#[tokio::test]
async fn test_maintain_creates_group_and_projects() {
    let mounts = Mounts::new();
    assert!(!run(&mounts.request("create", &["infra", "demo"]), None).await.is_error());

    let mock = MockGitlab::new();
    let ret = run_with(&mounts.request("maintain", &[]), &mock).await;
    assert_eq!(ret.error_message, "");
    assert!(ret.status.contains("Project ignored: infra - Infra project owned by 'forge'"));
    assert!(ret.status.contains("Project created: forge/demo"));
    assert!(ret.status.contains("Project maintained: demo"));

    assert!(mock.has_group("forge"));
    assert!(mock.has_project("forge/demo"));
    assert!(!mock.has_project("forge/infra"));

    let ret = run_with(&mounts.request("maintain", &[]), &mock).await;
    assert!(!ret.status.contains("Project created"));
    assert_eq!(mock.get_method_calls("create_group"), vec!["forge"]);
}

#[tokio::test]
async fn test_maintain_without_configuration() {
    let mounts = Mounts::new();
    let ret = run(&mounts.request("maintain", &[]), None).await;
    assert!(ret.error_message.starts_with("Unable to find the gitlab configuration"));
}

#[tokio::test]
async fn test_internal_action_is_not_a_task() {
    let mounts = Mounts::new();
    let ret = run(&mounts.request("add", &[]), None).await;
    assert_eq!(ret.error_message, "Action 'add' is not a plugin task.");
}
