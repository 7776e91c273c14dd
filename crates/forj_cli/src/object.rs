//! Objects: typed entities exposed as `<action> <object>` sub-commands.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, warn};

use crate::action::{indent, ObjectAction};
use crate::cli::ForjCli;
use crate::error::{CliError, CliResult};
use crate::field::{Field, DEFAULT_FIELD_REGEX};
use crate::list::{list_key, ListBuilder, ObjectList};
use crate::options::ForjOpts;
use crate::param::{Param, ParamData, ParamHost};
use crate::records::SETUP_ACTION;
use crate::template;
use crate::types::ValueType;

/// Key field of objects declared with [`ObjectBuilder::no_fields`].
pub const NO_FIELDS: &str = "none";

/// Hook run on an object at every context pass.
///
/// Receives the object name. Returns true if it changed the schema.
pub type ObjectHook = Box<dyn FnMut(&str, &mut ForjCli, &mut dyn Any) -> anyhow::Result<bool>>;

/// Fields defined for one instance only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectInstance {
    pub name: String,
    pub fields: BTreeMap<String, Field>,
}

pub struct Object {
    pub name: String,
    pub desc: String,
    /// Free text. forjj uses it to group objects (`infra`, `app`...).
    pub role: String,
    pub(crate) single: bool,
    pub fields: BTreeMap<String, Field>,
    pub instances: BTreeMap<String, ObjectInstance>,
    /// List names. The list itself is stored in the orchestrator.
    pub lists: BTreeSet<String>,
    pub actions: BTreeMap<String, ObjectAction>,
    pub(crate) sel_actions: Vec<String>,
    pub(crate) sel_instance: Option<String>,
    pub(crate) hook: Option<ObjectHook>,
    pub(crate) err: Option<CliError>,
}

impl Object {
    pub(crate) fn new(name: &str, desc: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
            role: role.to_string(),
            single: false,
            fields: BTreeMap::new(),
            instances: BTreeMap::new(),
            lists: BTreeSet::new(),
            actions: BTreeMap::new(),
            sel_actions: Vec::new(),
            sel_instance: None,
            hook: None,
            err: None,
        }
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Name of the key field, once declared.
    pub fn key_name(&self) -> Option<&str> {
        self.fields
            .values()
            .find(|f| f.key)
            .map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// True if any instance defines `name`.
    pub fn has_instance_field(&self, name: &str) -> bool {
        self.instances.values().any(|i| i.fields.contains_key(name))
    }

    /// Field definition for `instance`: instance fields first, then object fields.
    pub fn instance_field(&self, instance: Option<&str>, name: &str) -> Option<&Field> {
        instance
            .and_then(|i| self.instances.get(i))
            .and_then(|i| i.fields.get(name))
            .or_else(|| self.fields.get(name))
    }

    pub fn get_action(&self, action: &str) -> Option<&ObjectAction> {
        self.actions.get(action)
    }

    /// Selected actions, in selection order.
    pub fn selected_actions(&self) -> &[String] {
        &self.sel_actions
    }

    pub fn selected_instance(&self) -> Option<&str> {
        self.sel_instance.as_deref()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("single", &self.single)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .field("lists", &self.lists)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("hook", &self.hook.is_some())
            .field("err", &self.err)
            .finish()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "object '{}'", self.name)?;
        writeln!(f, "  desc: '{}'", self.desc)?;
        writeln!(f, "  single: {}", self.single)?;
        writeln!(f, "  fields: {}", self.fields.len())?;
        for field in self.fields.values() {
            write!(f, "{}", indent(&field.to_string(), "    "))?;
        }
        for instance in self.instances.values() {
            writeln!(f, "  instance '{}': {} fields", instance.name, instance.fields.len())?;
            for field in instance.fields.values() {
                write!(f, "{}", indent(&field.to_string(), "    "))?;
            }
        }
        for list in &self.lists {
            writeln!(f, "  list: {}", list)?;
        }
        for action in self.actions.values() {
            write!(f, "{}", indent(&action.to_string(), "  "))?;
        }
        Ok(())
    }
}

/// Builder over one object of a [`ForjCli`].
///
/// Errors are recorded on the object. Once a call fails, the following
/// ones do nothing; read the error with [`ObjectBuilder::error`] or
/// [`ObjectBuilder::done`].
///
/// ```ignore
/// cli.new_object("repo", "a repository", "")
///     .add_key(ValueType::String, "name", "repo name", "#w", None)
///     .add_field(ValueType::String, "title", "repo title", "#t", None)
///     .define_actions(&["create", "update"])
///     .on_actions(&[])
///     .add_arg("name", Some(opts().required()))
///     .add_flag("title", None)
///     .done()?;
/// ```
pub struct ObjectBuilder<'a> {
    cli: &'a mut ForjCli,
    name: String,
    failed: bool,
}

impl<'a> ObjectBuilder<'a> {
    pub(crate) fn new(cli: &'a mut ForjCli, name: &str) -> Self {
        let failed = !cli.objects.contains_key(name);
        Self {
            cli,
            name: name.to_string(),
            failed,
        }
    }

    /// A builder that does nothing. Its error is read from the orchestrator.
    pub(crate) fn failed(cli: &'a mut ForjCli, name: &str) -> Self {
        Self {
            cli,
            name: name.to_string(),
            failed: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Back to the orchestrator.
    pub fn cli(self) -> &'a mut ForjCli {
        self.cli
    }

    fn step(mut self, f: impl FnOnce(&mut Self) -> CliResult<()>) -> Self {
        if self.failed {
            return self;
        }
        if let Err(e) = f(&mut self) {
            debug!("Object '{}': {}", self.name, e);
            if let Some(o) = self.cli.objects.get_mut(&self.name) {
                o.err = Some(e);
            }
            self.failed = true;
        }
        self
    }

    fn object(&self) -> CliResult<&Object> {
        self.cli
            .objects
            .get(&self.name)
            .ok_or_else(|| CliError::ObjectNotFound(self.name.clone()))
    }

    fn object_mut(&mut self) -> CliResult<&mut Object> {
        self.cli
            .objects
            .get_mut(&self.name)
            .ok_or_else(|| CliError::ObjectNotFound(self.name.clone()))
    }

    /// Declare the object as single: one instance, named after the object.
    ///
    /// Must be called before any field is added.
    pub fn single(self) -> Self {
        self.step(|b| {
            let name = b.name.clone();
            let o = b.object_mut()?;
            if !o.lists.is_empty() || o.instances.len() > 1 {
                return Err(CliError::SingleObject {
                    object: name,
                    reason: "lists or several instances already exist".to_string(),
                });
            }
            if !o.fields.is_empty() {
                return Err(CliError::SingleObject {
                    object: name,
                    reason: format!("single must be set before fields. Found {} fields.", o.fields.len()),
                });
            }
            o.single = true;
            b.cli.set_object_attributes(SETUP_ACTION, &name, &name);
            b.add_key_field(ValueType::String, &format!("{}.key", name), "", DEFAULT_FIELD_REGEX, None)
        })
    }

    /// Declare an object carrying no data. A `none` key field is created.
    pub fn no_fields(self) -> Self {
        self.step(|b| {
            let name = b.name.clone();
            let o = b.object_mut()?;
            if !o.fields.is_empty() {
                return Err(CliError::FieldsAlreadyDefined(name));
            }
            let mut field = Field::new(NO_FIELDS, "", ValueType::String, DEFAULT_FIELD_REGEX, None);
            field.key = true;
            o.fields.insert(NO_FIELDS.to_string(), field);
            Ok(())
        })
    }

    pub fn add_key(
        self,
        value_type: ValueType,
        name: &str,
        help: &str,
        regex: &str,
        options: Option<ForjOpts>,
    ) -> Self {
        self.step(|b| b.add_key_field(value_type, name, help, regex, options))
    }

    fn add_key_field(
        &mut self,
        value_type: ValueType,
        name: &str,
        help: &str,
        regex: &str,
        options: Option<ForjOpts>,
    ) -> CliResult<()> {
        let object = self.name.clone();
        if let Some(key) = self.object()?.key_name() {
            return Err(CliError::KeyAlreadyExists {
                object,
                field: key.to_string(),
            });
        }
        self.add_object_field(value_type, name, help, regex, options)?;
        if let Some(field) = self.object_mut()?.fields.get_mut(name) {
            field.key = true;
        }
        Ok(())
    }

    pub fn add_field(
        self,
        value_type: ValueType,
        name: &str,
        help: &str,
        regex: &str,
        options: Option<ForjOpts>,
    ) -> Self {
        self.step(|b| b.add_object_field(value_type, name, help, regex, options))
    }

    fn add_object_field(
        &mut self,
        value_type: ValueType,
        name: &str,
        help: &str,
        regex: &str,
        options: Option<ForjOpts>,
    ) -> CliResult<()> {
        let object = self.name.clone();
        let o = self.object_mut()?;
        if o.fields.contains_key(NO_FIELDS) {
            return Err(CliError::NoFieldsObject(object));
        }
        if o.fields.contains_key(name) {
            warn!("Field '{}' already exists in object '{}'. Ignored.", name, object);
            return Ok(());
        }
        if o.has_instance_field(name) {
            return Err(CliError::FieldConflict {
                object,
                field: name.to_string(),
                level: "object".to_string(),
                existing: "instance".to_string(),
            });
        }
        let field = Field::new(name, help, value_type, regex, options);
        let default = field.options.default_for(value_type);
        o.fields.insert(name.to_string(), field);

        if o.single {
            self.cli
                .set_record_value(&object, &object, name, default, true);
        }
        Ok(())
    }

    /// Add a field known by one instance only. The instance is created if needed.
    pub fn add_instance_field(
        self,
        instance: &str,
        value_type: ValueType,
        name: &str,
        help: &str,
        regex: &str,
        options: Option<ForjOpts>,
    ) -> Self {
        self.step(|b| {
            let object = b.name.clone();
            let o = b.object_mut()?;
            if o.fields.contains_key(NO_FIELDS) {
                return Err(CliError::NoFieldsObject(object));
            }
            if o.fields.contains_key(name) {
                return Err(CliError::FieldConflict {
                    object,
                    field: name.to_string(),
                    level: "instance".to_string(),
                    existing: "object".to_string(),
                });
            }
            let entry = o
                .instances
                .entry(instance.to_string())
                .or_insert_with(|| ObjectInstance {
                    name: instance.to_string(),
                    fields: BTreeMap::new(),
                });
            if entry.fields.contains_key(name) {
                warn!(
                    "Field '{}' already exists in instance '{}' of '{}'. Ignored.",
                    name, instance, object
                );
                return Ok(());
            }
            entry
                .fields
                .insert(name.to_string(), Field::new(name, help, value_type, regex, options));

            let key_name = o.key_name().map(str::to_string);
            let record = b
                .cli
                .values
                .entry(object)
                .or_default()
                .record_mut(instance);
            if let Some(key) = key_name {
                if record.get(&key).is_none() {
                    record.set(&key, Some(instance.into()), false);
                }
            }
            Ok(())
        })
    }

    pub fn add_instances(self, instances: &[&str]) -> Self {
        self.step(|b| {
            let o = b.object_mut()?;
            for name in instances {
                o.instances
                    .entry(name.to_string())
                    .or_insert_with(|| ObjectInstance {
                        name: name.to_string(),
                        fields: BTreeMap::new(),
                    });
            }
            Ok(())
        })
    }

    /// Select the instance used by the orchestrator's field flag helpers.
    pub fn on_instance(self, instance: &str) -> Self {
        self.step(|b| {
            let object = b.name.clone();
            let o = b.object_mut()?;
            if !o.instances.contains_key(instance) {
                return Err(CliError::InstanceNotFound {
                    object,
                    instance: instance.to_string(),
                });
            }
            o.sel_instance = Some(instance.to_string());
            Ok(())
        })
    }

    /// Create the `<action> <object>` commands. Unknown actions are ignored.
    pub fn define_actions(self, actions: &[&str]) -> Self {
        self.step(|b| {
            let object = b.name.clone();
            let o = b.object()?;
            if o.key_name().is_none() {
                return Err(CliError::MissingKey(object));
            }
            let desc = o.desc.clone();

            let cli = &mut *b.cli;
            for name in actions {
                let Some(action) = cli.actions.get(*name) else {
                    warn!("Unknown action '{}' for object '{}'. Ignored.", name, object);
                    continue;
                };
                let help = action.object_help(&desc);
                let command = cli.engine.add_command(&action.command.clone(), &object, &help)?;
                if let Some(o) = cli.objects.get_mut(&object) {
                    o.actions
                        .entry(name.to_string())
                        .or_insert_with(|| ObjectAction::new(name, &object, &object, command));
                }
                debug!("Object '{}': action '{}' defined", object, name);
            }
            Ok(())
        })
    }

    /// Select object actions for the next calls. An empty slice selects all of them.
    pub fn on_actions(self, actions: &[&str]) -> Self {
        self.step(|b| {
            let o = b.object_mut()?;
            o.sel_actions = if actions.is_empty() {
                o.actions.keys().cloned().collect()
            } else {
                actions
                    .iter()
                    .filter(|a| o.actions.contains_key(**a))
                    .map(|a| a.to_string())
                    .collect()
            };
            Ok(())
        })
    }

    /// Expose field `field` as a flag of the selected actions.
    pub fn add_flag(self, field: &str, options: Option<ForjOpts>) -> Self {
        self.step(|b| b.add_field_param(field, options, false))
    }

    /// Expose field `field` as a positional argument of the selected actions.
    pub fn add_arg(self, field: &str, options: Option<ForjOpts>) -> Self {
        self.step(|b| b.add_field_param(field, options, true))
    }

    fn add_field_param(&mut self, name: &str, options: Option<ForjOpts>, arg: bool) -> CliResult<()> {
        let object = self.name.clone();
        let ForjCli { objects, engine, .. } = &mut *self.cli;
        let o = objects
            .get_mut(&object)
            .ok_or_else(|| CliError::ObjectNotFound(object.clone()))?;
        let field = o
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| CliError::field_not_found(&object, name))?;
        let options = options.unwrap_or_else(|| field.options.clone());

        for action in o.sel_actions.clone() {
            let Some(oa) = o.actions.get_mut(&action) else {
                continue;
            };
            let data = ParamData::new(oa.command.clone(), name, &field.help, field.value_type, options.clone());
            let mut param = if arg { Param::arg(data) } else { Param::flag(data) };
            param.set_object_field(&object, name);
            param.set_action(&action);
            engine.add_param(&oa.command, param.spec())?;
            oa.params.insert(name.to_string(), param);
        }
        Ok(())
    }

    /// Update options of every parameter bound to field `param`.
    ///
    /// Covers the object action parameters, the instance flags created next
    /// to the object lists, and the action flags built from the field.
    pub fn set_param_options(self, param: &str, options: ForjOpts) -> Self {
        self.step(|b| {
            let object = b.name.clone();
            let o = b.object_mut()?;
            if let Some(field) = o.fields.get_mut(param) {
                field.options.merge(&options);
            }

            let o = b.object()?;
            let mut targets: Vec<(ParamHost, String)> = Vec::new();
            for (action, oa) in &o.actions {
                if oa.params.contains_key(param) {
                    targets.push((
                        ParamHost::ObjectAction {
                            action: action.clone(),
                            object: object.clone(),
                        },
                        param.to_string(),
                    ));
                }
            }
            if let Some(field) = o.fields.get(param) {
                for (action, flag) in &field.in_actions {
                    targets.push((ParamHost::Action(action.clone()), flag.clone()));
                }
            }

            let mut hosts: Vec<ParamHost> = Vec::new();
            for name in &o.lists {
                let Some(list) = b.cli.lists.get(&list_key(&object, name)) else {
                    continue;
                };
                hosts.extend(list.actions.keys().map(|action| ParamHost::ListAction {
                    list: list.key(),
                    action: action.clone(),
                }));
                hosts.extend(list.flags_list.values().map(|r| r.host.clone()));
            }
            for host in hosts {
                let Some(params) = b.cli.host_params(&host) else {
                    continue;
                };
                for p in params.values() {
                    let bound = p.binding().object.as_deref() == Some(object.as_str())
                        && p.binding().field.as_deref() == Some(param);
                    if bound {
                        targets.push((host.clone(), p.name().to_string()));
                    }
                }
            }

            for (host, name) in targets {
                b.cli.update_host_param(&host, &name, &options)?;
            }
            Ok(())
        })
    }

    /// Hook called at every context pass, after the orchestrator before-hook.
    pub fn parse_hook<F>(self, hook: F) -> Self
    where
        F: FnMut(&str, &mut ForjCli, &mut dyn Any) -> anyhow::Result<bool> + 'static,
    {
        self.step(|b| {
            b.object_mut()?.hook = Some(Box::new(hook));
            Ok(())
        })
    }

    pub fn clear_parse_hook(self) -> Self {
        self.step(|b| {
            b.object_mut()?.hook = None;
            Ok(())
        })
    }

    /// Add `--<obj_name>s` to the selected actions, carrying the list
    /// `obj_list` of `obj_name` as done by its action `obj_action`.
    pub fn add_flag_from_object_list_action(self, obj_name: &str, obj_list: &str, obj_action: &str) -> Self {
        self.step(|b| b.add_list_flags(obj_name, obj_list, &[obj_action], false))
    }

    /// Add `--<action>-<obj_name>s` to the selected actions, one per object action.
    pub fn add_flags_from_object_list_actions(
        self,
        obj_name: &str,
        obj_list: &str,
        obj_actions: &[&str],
    ) -> Self {
        self.step(|b| b.add_list_flags(obj_name, obj_list, obj_actions, true))
    }

    fn add_list_flags(&mut self, obj_name: &str, obj_list: &str, obj_actions: &[&str], multi: bool) -> CliResult<()> {
        if obj_name == self.name {
            return Err(CliError::SelfReference(obj_name.to_string()));
        }
        let selected = self.object()?.sel_actions.clone();
        for action in selected {
            for obj_action in obj_actions {
                let host = ParamHost::ObjectAction {
                    action: action.clone(),
                    object: self.name.clone(),
                };
                self.cli
                    .add_list_flag(host, obj_name, obj_list, obj_action, multi)?;
            }
        }
        Ok(())
    }

    /// Copy on the selected actions the flags `obj_name` has on its action `obj_action`.
    pub fn add_flags_from_object_action(self, obj_name: &str, obj_action: &str) -> Self {
        self.step(|b| {
            if obj_name == b.name {
                return Err(CliError::SelfReference(obj_name.to_string()));
            }
            let source = b
                .cli
                .objects
                .get(obj_name)
                .ok_or_else(|| CliError::ObjectNotFound(obj_name.to_string()))?;
            let source_action = source
                .actions
                .get(obj_action)
                .ok_or_else(|| CliError::object_action_not_found(obj_name, obj_action))?;
            let copies: Vec<Param> = source
                .fields
                .keys()
                .filter_map(|f| source_action.params.get(f))
                .cloned()
                .collect();

            for action in b.object()?.sel_actions.clone() {
                let host = ParamHost::ObjectAction {
                    action,
                    object: b.name.clone(),
                };
                let command = b.cli.host_command(&host)?;
                for param in &copies {
                    let mut flag = param.copy_to_flag(&command);
                    flag.set_action(obj_action);
                    b.cli.add_host_param(&host, flag)?;
                }
            }
            Ok(())
        })
    }

    /// Create the list `name` of this object.
    ///
    /// `template` describes one element with field names and `[...]`
    /// optional parts, e.g. `instance[:driver[:type]]`.
    pub fn create_list(mut self, name: &str, sep: &str, template: &str, help: &str) -> ListBuilder<'a> {
        if self.failed {
            return ListBuilder::new(self.cli, &self.name, name, true);
        }
        let result = self.new_list(name, sep, template, help);
        let failed = match result {
            Ok(()) => false,
            Err(e) => {
                debug!("Object '{}': {}", self.name, e);
                if let Ok(o) = self.object_mut() {
                    o.err = Some(e);
                }
                true
            }
        };
        ListBuilder::new(self.cli, &self.name, name, failed)
    }

    fn new_list(&mut self, name: &str, sep: &str, sample: &str, help: &str) -> CliResult<()> {
        let object = self.name.clone();
        let o = self.object()?;
        if o.single {
            return Err(CliError::SingleObject {
                object,
                reason: "a single object cannot have lists".to_string(),
            });
        }
        let key_name = o
            .key_name()
            .map(str::to_string)
            .ok_or_else(|| CliError::MissingKey(object.clone()))?;
        let compiled = template::compile(
            sample,
            |field| o.fields.get(field).map(|f| f.regex.as_str()),
            &self.cli.filters,
        )?;
        debug!(
            "List '{}' of '{}': {} fields found in '{}'",
            name,
            object,
            compiled.fields.len(),
            sample
        );

        let mut list = ObjectList::new(name, &object, sep, help, &key_name, compiled);
        list.actions_related = o.actions.keys().cloned().collect();
        self.cli.lists.insert(list.key(), list);
        self.object_mut()?.lists.insert(name.to_string());
        Ok(())
    }

    pub fn is_ok(&self) -> bool {
        !self.failed
    }

    /// Last error recorded by this builder. Consumed.
    pub fn error(self) -> Option<CliError> {
        match self.cli.objects.get_mut(&self.name) {
            Some(o) => match o.err.take() {
                Some(e) => Some(e),
                None if self.failed => self.cli.err.take(),
                None => None,
            },
            None => Some(CliError::ObjectNotFound(self.name)),
        }
    }

    pub fn done(self) -> CliResult<()> {
        match self.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
