//! Actions and object actions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::engine::CommandPath;
use crate::param::Param;

/// Flags an action still needs once object instances are known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextRefresh {
    /// Key of the object list exposed as a flag on the action.
    pub list: Option<String>,
    /// Action of the object list referenced by that flag.
    pub object_action: Option<String>,
    /// Object fields to expose per instance.
    pub fields: BTreeSet<String>,
}

impl ContextRefresh {
    pub(crate) fn add_list(&mut self, list_key: &str, object_action: &str) {
        self.list = Some(list_key.to_string());
        self.object_action = Some(object_action.to_string());
    }

    pub(crate) fn add_field(&mut self, field: &str) {
        self.fields.insert(field.to_string());
    }
}

/// A top level verb such as `create` or `update`.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    /// Help of the object sub-commands. `{}` is replaced by the object description.
    pub help: String,
    pub internal_only: bool,
    pub command: CommandPath,
    pub params: BTreeMap<String, Param>,
    /// Object name -> what to synthesize at context time.
    pub to_refresh: BTreeMap<String, ContextRefresh>,
}

impl Action {
    pub(crate) fn new(name: &str, help: &str, internal_only: bool, command: CommandPath) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            internal_only,
            command,
            params: BTreeMap::new(),
            to_refresh: BTreeMap::new(),
        }
    }

    /// Help for the sub-command of an object described by `desc`.
    pub fn object_help(&self, desc: &str) -> String {
        self.help.replace("{}", desc)
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "action '{}'", self.name)?;
        writeln!(f, "  help: '{}'", self.help)?;
        writeln!(f, "  internal_only: {}", self.internal_only)?;
        writeln!(f, "  params: {}", self.params.len())?;
        for param in self.params.values() {
            write!(f, "{}", indent(&param.to_string(), "    "))?;
        }
        for (object, refresh) in &self.to_refresh {
            writeln!(
                f,
                "  refresh '{}': list {:?}, fields {:?}",
                object, refresh.list, refresh.fields
            )?;
        }
        Ok(())
    }
}

/// The sub-command of one object under one action, e.g. `create repo`.
///
/// List commands (`create repos`) use the same shape.
#[derive(Debug, Clone)]
pub struct ObjectAction {
    /// `<action>_<object>`.
    pub name: String,
    pub action: String,
    pub object: String,
    pub command: CommandPath,
    pub params: BTreeMap<String, Param>,
}

impl ObjectAction {
    pub(crate) fn new(action: &str, object: &str, command_name: &str, command: CommandPath) -> Self {
        Self {
            name: format!("{}_{}", action, command_name),
            action: action.to_string(),
            object: object.to_string(),
            command,
            params: BTreeMap::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }
}

impl fmt::Display for ObjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "object action '{}' ({})", self.name, self.command)?;
        for param in self.params.values() {
            write!(f, "{}", indent(&param.to_string(), "  "))?;
        }
        Ok(())
    }
}

pub(crate) fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|l| format!("{}{}\n", prefix, l)).collect()
}
