//! Error types for the gitlab plugin.

use std::path::PathBuf;
use thiserror::Error;

use forj_cli::CliError;

/// Result type alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur while declaring, parsing or running a plugin task.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("Invalid plugin descriptor: {0}")]
    Descriptor(String),

    #[error("Invalid request. {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Check(String),

    #[error("Unable to create the gitlab source code for instance name '{0}' which already exist.\nUse update to update it, and maintain to update gitlab according to his configuration.")]
    SourceExists(PathBuf),

    #[error("Infra project '{0}' already exists.\nUnable to 'create' your forge when gitlab already has an infra project created. Clone it and use 'update' instead.")]
    InfraExists(String),

    #[error("Unable to find the gitlab configuration '{0}'.")]
    MissingConfiguration(PathBuf),

    #[error("GitLab API error: {0}")]
    Gitlab(String),

    #[error("Unable to save '{path}'. {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to load '{path}'. {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to encode/decode forjj gitlab data in yaml. {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal Error. {0}")]
    Internal(String),
}
