//! Answer returned to forjj by every plugin task.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Repository a file was written in.
pub const FILES_SOURCE: &str = "source";
pub const FILES_DEPLOY: &str = "deploy";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginServices {
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginData {
    /// Progress lines, newline separated.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    /// `source` or `deploy` -> files relative to the repository.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub services: PluginServices,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit_message: String,
}

impl PluginData {
    /// Append a progress line. Returns it for logging.
    pub fn status_add(&mut self, message: impl Into<String>) -> String {
        let message = message.into();
        if !self.status.is_empty() {
            self.status.push('\n');
        }
        self.status.push_str(&message);
        message
    }

    /// Set the error message. Returns it for logging.
    pub fn error(&mut self, message: impl Into<String>) -> String {
        self.error_message = message.into();
        self.error_message.clone()
    }

    pub fn add_file(&mut self, repo: &str, file: impl Into<String>) {
        self.files.entry(repo.to_string()).or_default().push(file.into());
    }

    pub fn is_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}
