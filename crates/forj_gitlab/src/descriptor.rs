//! Plugin descriptor: the YAML document describing the plugin CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use forj_cli::field::DEFAULT_FIELD_REGEX;
use forj_cli::{ForjOpts, ValueType};

use crate::error::{PluginError, PluginResult};

/// Descriptor shipped with the plugin.
pub const GITLAB_DESCRIPTOR: &str = include_str!("../gitlab.yaml");

/// Socket file used when the descriptor does not name one.
pub const DEFAULT_SOCKET: &str = "gitlab.sock";

/// `task_flags` entry applied to every public action.
pub const COMMON_FLAGS: &str = "common";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub plugin: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    /// Action name (or `common`) -> flag name -> definition.
    #[serde(default)]
    pub task_flags: BTreeMap<String, BTreeMap<String, FlagDef>>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Runtime {
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub docker_image: String,
    #[serde(default)]
    pub service: ServiceDef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDef {
    #[serde(default)]
    pub socket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    #[serde(default)]
    pub help: String,
    /// Help of `<action> <object>`, `{}` being the object description.
    pub object_help: Option<String>,
    /// Internal actions only carry objects. Common task flags skip them.
    #[serde(default)]
    pub internal: bool,
}

impl ActionDef {
    pub fn object_help(&self) -> String {
        self.object_help
            .clone()
            .unwrap_or_else(|| format!("{} {{}}", self.name))
    }
}

/// A flag or an object field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagDef {
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub help: String,
    pub regex: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
    pub envar: Option<String>,
    pub short: Option<char>,
    #[serde(default)]
    pub hidden: bool,
}

impl FlagDef {
    pub fn regex(&self) -> &str {
        self.regex.as_deref().unwrap_or(DEFAULT_FIELD_REGEX)
    }

    /// Parameter options, `None` when nothing is set.
    pub fn options(&self) -> Option<ForjOpts> {
        let opts = ForjOpts {
            required: self.required.then_some(true),
            default: self.default.clone(),
            envar: self.envar.clone(),
            short: self.short,
            hidden: self.hidden.then_some(true),
        };
        (opts != ForjOpts::default()).then_some(opts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDef {
    pub name: String,
    #[serde(flatten)]
    pub flag: FlagDef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub single: bool,
    pub key: Option<KeyDef>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FlagDef>,
    #[serde(default)]
    pub lists: Vec<ListDef>,
    /// Actions getting one `--<field>` flag per field.
    #[serde(default)]
    pub action_flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDef {
    pub name: String,
    #[serde(default = "default_sep")]
    pub sep: String,
    pub template: String,
    #[serde(default)]
    pub help: String,
    /// Object actions getting the `<action> <object>s` list command.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Action -> object action. Adds `--<object>s` to the action.
    #[serde(default)]
    pub action_flags: BTreeMap<String, String>,
}

fn default_sep() -> String {
    ",".to_string()
}

impl PluginDescriptor {
    /// The descriptor embedded in the plugin.
    pub fn embedded() -> PluginResult<Self> {
        Self::from_yaml(GITLAB_DESCRIPTOR)
    }

    pub fn from_yaml(content: &str) -> PluginResult<Self> {
        let mut desc: PluginDescriptor = serde_yaml::from_str(content)?;
        if desc.runtime.service.socket.is_empty() {
            desc.runtime.service.socket = DEFAULT_SOCKET.to_string();
            debug!("Set default socket file: {}", DEFAULT_SOCKET);
        }
        desc.validate()?;
        Ok(desc)
    }

    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Names of the actions which are not internal.
    pub fn public_actions(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter(|a| !a.internal)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Every action referenced by the descriptor must be declared.
    fn validate(&self) -> PluginResult<()> {
        if self.plugin.is_empty() {
            return Err(PluginError::Descriptor("plugin name is empty".to_string()));
        }
        let known = |name: &str| self.action(name).is_some();

        for action in self.task_flags.keys() {
            if action != COMMON_FLAGS && !known(action.as_str()) {
                return Err(unknown_action("task_flags", action));
            }
        }
        for object in &self.objects {
            if !object.single && object.key.is_none() {
                return Err(PluginError::Descriptor(format!(
                    "object '{}' needs a key or must be single",
                    object.name
                )));
            }
            let lists = object.lists.iter().flat_map(|l| {
                l.actions
                    .iter()
                    .chain(l.action_flags.keys())
                    .chain(l.action_flags.values())
            });
            for action in object.actions.iter().chain(&object.action_flags).chain(lists) {
                if !known(action.as_str()) {
                    return Err(unknown_action(&object.name, action));
                }
            }
        }
        Ok(())
    }
}

fn unknown_action(owner: &str, action: &str) -> PluginError {
    PluginError::Descriptor(format!("'{}' refers to the unknown action '{}'", owner, action))
}
