//! Object lists: several instances of one object packed in one value.
//!
//! ```text
//! <app> create repos "infra:Infra repo,docs"
//! <app> update --repos "infra,docs" --infra-title "Infra repo"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::action::{indent, ObjectAction};
use crate::cli::ForjCli;
use crate::engine::ParamKind;
use crate::error::{CliError, CliResult};
use crate::options::opts;
use crate::param::{Param, ParamData, ParamHost};
use crate::template::CompiledTemplate;
use crate::types::ValueType;

/// Called on every decoded element before its key is read.
pub type ValidateHandler = Box<dyn Fn(&mut ListItem) -> anyhow::Result<()>>;

/// Key of a list in the orchestrator: `<object>_<list>`.
pub fn list_key(object: &str, list: &str) -> String {
    format!("{}_{}", object, list)
}

/// One decoded list element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListItem {
    /// Value of the object key field.
    pub key: String,
    /// Field name -> captured text.
    pub data: BTreeMap<String, String>,
}

/// A flag created elsewhere in the schema that carries this list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFlagsRef {
    pub flag: String,
    /// True for `--<action>-<object>s` flags.
    pub multi_actions: bool,
    pub host: ParamHost,
    /// Instance flags created next to the list flag.
    pub params: BTreeSet<String>,
}

pub struct ObjectList {
    pub name: String,
    pub object: String,
    pub help: String,
    pub sep: String,
    pub key_name: String,
    pub template: CompiledTemplate,
    /// List commands: action -> `<action> <object>s`.
    pub actions: BTreeMap<String, ObjectAction>,
    /// Object actions known when the list was created.
    pub actions_related: BTreeSet<String>,
    /// Reference name -> list flag.
    pub flags_list: BTreeMap<String, ListFlagsRef>,
    validate: Option<ValidateHandler>,
    pub(crate) items: Vec<ListItem>,
}

impl ObjectList {
    pub(crate) fn new(
        name: &str,
        object: &str,
        sep: &str,
        help: &str,
        key_name: &str,
        template: CompiledTemplate,
    ) -> Self {
        Self {
            name: name.to_string(),
            object: object.to_string(),
            help: help.to_string(),
            sep: if sep.is_empty() { ",".to_string() } else { sep.to_string() },
            key_name: key_name.to_string(),
            template,
            actions: BTreeMap::new(),
            actions_related: BTreeSet::new(),
            flags_list: BTreeMap::new(),
            validate: None,
            items: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        list_key(&self.object, &self.name)
    }

    /// Split `value` and decode every element.
    pub fn decode(&self, value: &str) -> CliResult<Vec<ListItem>> {
        let mut items = Vec::new();
        for element in value
            .split(self.sep.as_str())
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            let data = self
                .template
                .decode(element)
                .ok_or_else(|| CliError::InvalidListValue {
                    list: self.key(),
                    value: element.to_string(),
                })?;
            let mut item = ListItem {
                key: String::new(),
                data,
            };
            if let Some(validate) = &self.validate {
                validate(&mut item)?;
            }
            item.key = item
                .data
                .get(&self.key_name)
                .filter(|k| !k.is_empty())
                .cloned()
                .ok_or_else(|| CliError::MissingListKey {
                    list: self.key(),
                    value: element.to_string(),
                    key: self.key_name.clone(),
                })?;
            items.push(item);
        }
        Ok(items)
    }

    /// Elements decoded from the current command line.
    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn instances(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.key.as_str()).collect()
    }

    pub fn has_validate_handler(&self) -> bool {
        self.validate.is_some()
    }
}

impl fmt::Debug for ObjectList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectList")
            .field("name", &self.name)
            .field("object", &self.object)
            .field("sep", &self.sep)
            .field("sample", &self.template.sample)
            .field("fields", &self.template.fields)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("flags_list", &self.flags_list.keys().collect::<Vec<_>>())
            .field("items", &self.items)
            .finish()
    }
}

impl fmt::Display for ObjectList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "list '{}' of '{}'", self.name, self.object)?;
        writeln!(f, "  sep: '{}'", self.sep)?;
        writeln!(f, "  sample: '{}'", self.template.sample)?;
        writeln!(f, "  regexp: '{}'", self.template.pattern)?;
        for (group, field) in &self.template.fields {
            writeln!(f, "  group {}: {}", group, field)?;
        }
        for action in self.actions.values() {
            write!(f, "{}", indent(&action.to_string(), "  "))?;
        }
        for name in self.flags_list.keys() {
            writeln!(f, "  flag ref: {}", name)?;
        }
        Ok(())
    }
}

/// Builder returned by [`crate::ObjectBuilder::create_list`].
///
/// Errors are recorded on the owning object; once a call fails the
/// following ones do nothing.
pub struct ListBuilder<'a> {
    cli: &'a mut ForjCli,
    object: String,
    key: String,
    failed: bool,
}

impl<'a> ListBuilder<'a> {
    pub(crate) fn new(cli: &'a mut ForjCli, object: &str, list: &str, failed: bool) -> Self {
        Self {
            cli,
            object: object.to_string(),
            key: list_key(object, list),
            failed,
        }
    }

    fn step(mut self, f: impl FnOnce(&mut Self) -> CliResult<()>) -> Self {
        if self.failed {
            return self;
        }
        if let Err(e) = f(&mut self) {
            if let Some(o) = self.cli.objects.get_mut(&self.object) {
                o.err = Some(e);
            }
            self.failed = true;
        }
        self
    }

    /// Create `<action> <object>s <list>` for each action.
    pub fn add_actions(self, actions: &[&str]) -> Self {
        self.step(|b| {
            for action in actions {
                b.add_action(action)?;
            }
            Ok(())
        })
    }

    fn add_action(&mut self, action: &str) -> CliResult<()> {
        let cli = &mut *self.cli;
        let object = cli
            .objects
            .get(&self.object)
            .ok_or_else(|| CliError::ObjectNotFound(self.object.clone()))?;
        if !object.actions.contains_key(action) {
            return Err(CliError::object_action_not_found(&self.object, action));
        }
        let action_cmd = cli
            .actions
            .get(action)
            .map(|a| a.command.clone())
            .ok_or_else(|| CliError::ActionNotFound(action.to_string()))?;
        let list = cli
            .lists
            .get_mut(&self.key)
            .ok_or_else(|| CliError::ListNotFound(self.key.clone()))?;

        let name = format!("{}s", self.object);
        let command = cli.engine.add_command(&action_cmd, &name, &list.help)?;

        let data = ParamData::new(command.clone(), &name, &list.help, ValueType::List, opts().required());
        let mut param = Param::object_list(ParamKind::Arg, data, &self.key, &self.object);
        param.set_action(action);
        cli.engine.add_param(&command, param.spec())?;

        let mut object_action = ObjectAction::new(action, &self.object, &name, command);
        object_action.params.insert(name, param);
        list.actions.insert(action.to_string(), object_action);
        debug!("List '{}' exposed on action '{}'", self.key, action);
        Ok(())
    }

    /// Install a handler that can complete or reject each decoded element.
    pub fn add_validate_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&mut ListItem) -> anyhow::Result<()> + 'static,
    {
        self.step(|b| {
            let list = b
                .cli
                .lists
                .get_mut(&b.key)
                .ok_or_else(|| CliError::ListNotFound(b.key.clone()))?;
            list.validate = Some(Box::new(handler));
            Ok(())
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_ok(&self) -> bool {
        !self.failed
    }

    /// Last error of the owning object. Consumed.
    pub fn error(self) -> Option<CliError> {
        match self.cli.objects.get_mut(&self.object) {
            Some(o) => o.err.take(),
            None => Some(CliError::ObjectNotFound(self.object)),
        }
    }

    pub fn done(self) -> CliResult<()> {
        match self.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::compile;

    fn list(sample: &str) -> ObjectList {
        let template = compile(
            sample,
            |name| match name {
                "instance" | "driver" | "type" => Some("[a-z]+[a-z0-9_-]*"),
                _ => None,
            },
            &BTreeMap::new(),
        )
        .unwrap();
        ObjectList::new("to_update", "app", ",", "apps", "instance", template)
    }

    #[test]
    fn test_decode_elements() {
        let l = list("instance[:driver[:type]]");
        let items = l.decode("type:driver:name, other").unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "type");
        assert_eq!(items[0].data["driver"], "driver");
        assert_eq!(items[0].data["type"], "name");
        assert_eq!(items[1].key, "other");
        assert_eq!(items[1].data.len(), 1);
    }

    #[test]
    fn test_decode_invalid_element() {
        let l = list("instance[:driver]");
        let err = l.decode("ok,Not-Valid").unwrap_err();
        assert!(matches!(err, CliError::InvalidListValue { ref value, .. } if value == "Not-Valid"));
    }

    #[test]
    fn test_validate_handler_fills_key() {
        let mut l = list("driver[:type]");
        assert!(matches!(
            l.decode("docker").unwrap_err(),
            CliError::MissingListKey { .. }
        ));

        l.validate = Some(Box::new(|item: &mut ListItem| {
            if !item.data.contains_key("instance") {
                let driver = item.data.get("driver").cloned().unwrap_or_default();
                item.data.insert("instance".to_string(), driver);
            }
            Ok(())
        }));
        let items = l.decode("docker:local").unwrap();
        assert_eq!(items[0].key, "docker");
    }

    #[test]
    fn test_list_key() {
        assert_eq!(list_key("test", "to_update"), "test_to_update");
    }
}
