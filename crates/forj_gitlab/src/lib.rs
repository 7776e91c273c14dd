//! # forj_gitlab
//!
//! GitLab provisioning plugin for forjj.
//!
//! The plugin command line is declared from the embedded `gitlab.yaml`
//! descriptor over [`forj_cli`]. A parsed command line becomes a
//! [`PluginRequest`], which the `create`, `update` and `maintain` tasks
//! turn into YAML manifests in the source and deploy repositories.

pub mod answer;
pub mod api;
pub mod checks;
pub mod descriptor;
pub mod error;
pub mod handlers;
pub mod mock;
pub mod models;
pub mod plugin;
pub mod request;
pub mod schema;
pub mod store;

pub use answer::{PluginData, PluginServices, FILES_DEPLOY, FILES_SOURCE};
pub use api::{GitlabApi, GitlabGroup, GitlabProject, GitlabUser};
pub use checks::{CheckInput, Checks};
pub use descriptor::{PluginDescriptor, DEFAULT_SOCKET, GITLAB_DESCRIPTOR};
pub use error::{PluginError, PluginResult};
pub use handlers::{do_create, do_maintain, do_update, run};
pub use mock::MockGitlab;
pub use models::{GitlabDeploy, GitlabSource, ProjectStruct, RepoRemoteUrl};
pub use plugin::{GitlabPlugin, MaintainPlan};
pub use request::{AppSettings, ForjSettings, PluginRequest, RepoInstance};
pub use schema::{declare, new_cli};
pub use store::{load_yaml, save_yaml, GITLAB_FILE};
