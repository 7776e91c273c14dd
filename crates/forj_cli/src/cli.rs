//! The orchestrator: owns the schema, the engine and the value store.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use tracing::{debug, warn};

use crate::action::{indent, Action};
use crate::context::ForjCliContext;
use crate::engine::{CommandPath, ParamKind, ParseContext, ParseEngine};
use crate::error::{CliError, CliResult};
use crate::list::{list_key, ListFlagsRef, ObjectList};
use crate::object::{Object, ObjectBuilder};
use crate::options::ForjOpts;
use crate::param::{Param, ParamData, ParamHost};
use crate::records::{Attr, Fetched, ForjRecord, ForjRecords};
use crate::types::{Value, ValueType};

/// Hook run by the orchestrator at every context pass.
///
/// Returns true if it changed the schema.
pub type CliHook = Box<dyn FnMut(&mut ForjCli, &mut dyn Any) -> anyhow::Result<bool>>;

/// What to do when an action or an object is declared twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefinitionPolicy {
    /// The new definition replaces the previous one, with a warning.
    #[default]
    Overwrite,
    /// The second definition is an error.
    Strict,
}

/// Default cap on context passes.
pub const DEFAULT_MAX_CONTEXT_PASSES: usize = 8;

/// Declarative object/flag command line.
///
/// Actions (`create`, `update`...) are verbs. Objects declare typed fields
/// and are exposed as `<action> <object>` sub-commands. Objects lists pack
/// several instances in one value, and instance flags are synthesized from
/// what the command line already contains.
///
/// Schema calls are sticky: once one fails, the following ones do nothing
/// until [`ForjCli::error`] consumes the error.
pub struct ForjCli {
    pub(crate) engine: Box<dyn ParseEngine>,
    pub(crate) flags: BTreeMap<String, Param>,
    pub(crate) objects: BTreeMap<String, Object>,
    pub(crate) actions: BTreeMap<String, Action>,
    pub(crate) lists: BTreeMap<String, ObjectList>,
    pub(crate) values: BTreeMap<String, ForjRecords>,
    /// `#key` shortcuts usable in field regexes.
    pub(crate) filters: BTreeMap<String, String>,
    pub(crate) context: ForjCliContext,
    pub(crate) cur_cmds: CommandPath,
    pub(crate) parse_context: ParseContext,
    pub(crate) parse: bool,
    pub(crate) before_hook: Option<CliHook>,
    pub(crate) after_hook: Option<CliHook>,
    pub(crate) err: Option<CliError>,
    sel_actions: Vec<String>,
    sel_object: Option<String>,
    pub(crate) policy: DefinitionPolicy,
    pub(crate) max_context_passes: usize,
}

impl ForjCli {
    pub fn new(engine: impl ParseEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            flags: BTreeMap::new(),
            objects: BTreeMap::new(),
            actions: BTreeMap::new(),
            lists: BTreeMap::new(),
            values: BTreeMap::new(),
            filters: BTreeMap::new(),
            context: ForjCliContext::default(),
            cur_cmds: CommandPath::root(),
            parse_context: ParseContext::default(),
            parse: false,
            before_hook: None,
            after_hook: None,
            err: None,
            sel_actions: Vec::new(),
            sel_object: None,
            policy: DefinitionPolicy::default(),
            max_context_passes: DEFAULT_MAX_CONTEXT_PASSES,
        }
    }

    pub fn with_policy(mut self, policy: DefinitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_context_passes(mut self, passes: usize) -> Self {
        self.max_context_passes = passes.max(1);
        self
    }

    pub fn app_name(&self) -> &str {
        self.engine.app_name()
    }

    fn step(&mut self, f: impl FnOnce(&mut Self) -> CliResult<()>) -> &mut Self {
        if self.err.is_some() {
            return self;
        }
        if let Err(e) = f(self) {
            debug!("{}", e);
            self.err = Some(e);
        }
        self
    }

    /// Declare a verb.
    ///
    /// `help` is the help of `<app> <name>`. `compose_help` is the help of
    /// the object sub-commands, `{}` being replaced by the object description.
    pub fn new_actions(&mut self, name: &str, help: &str, compose_help: &str, internal_only: bool) -> &mut Self {
        self.step(|cli| {
            if cli.actions.contains_key(name) {
                if cli.policy == DefinitionPolicy::Strict {
                    return Err(CliError::DuplicateAction(name.to_string()));
                }
                warn!("Action '{}' redefined.", name);
            }
            let command = cli.engine.add_command(&CommandPath::root(), name, help)?;
            cli.actions
                .insert(name.to_string(), Action::new(name, compose_help, internal_only, command));
            Ok(())
        })
    }

    pub fn get_action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn get_all_actions(&self) -> &BTreeMap<String, Action> {
        &self.actions
    }

    /// Declare an object. Configure it through the returned builder.
    pub fn new_object(&mut self, name: &str, desc: &str, role: &str) -> ObjectBuilder<'_> {
        if self.err.is_some() {
            return ObjectBuilder::failed(self, name);
        }
        if self.objects.contains_key(name) {
            if self.policy == DefinitionPolicy::Strict {
                self.err = Some(CliError::DuplicateObject(name.to_string()));
                return ObjectBuilder::failed(self, name);
            }
            warn!("Object '{}' redefined.", name);
        }
        self.objects
            .insert(name.to_string(), Object::new(name, desc, role));
        debug!("Object '{}' declared", name);
        ObjectBuilder::new(self, name)
    }

    pub fn get_object(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    /// Builder over an existing object.
    pub fn object(&mut self, name: &str) -> ObjectBuilder<'_> {
        ObjectBuilder::new(self, name)
    }

    pub fn get_list(&self, object: &str, list: &str) -> Option<&ObjectList> {
        self.lists.get(&list_key(object, list))
    }

    /// Select actions for the next action-level calls. Empty selects all.
    pub fn on_actions(&mut self, actions: &[&str]) -> &mut Self {
        self.step(|cli| {
            cli.sel_actions = if actions.is_empty() {
                cli.actions.keys().cloned().collect()
            } else {
                actions
                    .iter()
                    .filter(|a| cli.actions.contains_key(**a))
                    .map(|a| a.to_string())
                    .collect()
            };
            Ok(())
        })
    }

    /// Add a flag to the selected actions.
    pub fn add_flag(&mut self, value_type: ValueType, name: &str, help: &str, options: Option<ForjOpts>) -> &mut Self {
        self.step(|cli| cli.add_action_param(ParamKind::Flag, value_type, name, help, options))
    }

    /// Add a positional argument to the selected actions.
    pub fn add_arg(&mut self, value_type: ValueType, name: &str, help: &str, options: Option<ForjOpts>) -> &mut Self {
        self.step(|cli| cli.add_action_param(ParamKind::Arg, value_type, name, help, options))
    }

    fn add_action_param(
        &mut self,
        kind: ParamKind,
        value_type: ValueType,
        name: &str,
        help: &str,
        options: Option<ForjOpts>,
    ) -> CliResult<()> {
        for action in self.sel_actions.clone() {
            let host = ParamHost::Action(action);
            let data = ParamData::new(self.host_command(&host)?, name, help, value_type, options.clone().unwrap_or_default());
            let param = match kind {
                ParamKind::Flag => Param::flag(data),
                ParamKind::Arg => Param::arg(data),
            };
            self.add_host_param(&host, param)?;
        }
        Ok(())
    }

    /// Add a flag at application level.
    pub fn add_app_flag(&mut self, value_type: ValueType, name: &str, help: &str, options: Option<ForjOpts>) -> &mut Self {
        self.step(|cli| {
            let data = ParamData::new(CommandPath::root(), name, help, value_type, options.unwrap_or_default());
            cli.add_host_param(&ParamHost::App, Param::flag(data))?;
            Ok(())
        })
    }

    pub fn get_app_flag(&self, name: &str) -> Option<&Param> {
        self.flags.get(name)
    }

    pub fn get_action_param(&self, action: &str, name: &str) -> Option<&Param> {
        self.actions.get(action)?.params.get(name)
    }

    pub fn get_object_param(&self, object: &str, action: &str, name: &str) -> Option<&Param> {
        self.objects.get(object)?.actions.get(action)?.params.get(name)
    }

    /// Add `--<obj_name>s` to the selected actions. Its value is decoded with
    /// the list `obj_list` and records are tagged with `obj_action`.
    pub fn add_action_flag_from_object_list_action(&mut self, obj_name: &str, obj_list: &str, obj_action: &str) -> &mut Self {
        self.step(|cli| cli.add_action_list_flags(obj_name, obj_list, &[obj_action], false))
    }

    /// Add `--<action>-<obj_name>s` to the selected actions, one per object action.
    pub fn add_action_flags_from_object_list_actions(
        &mut self,
        obj_name: &str,
        obj_list: &str,
        obj_actions: &[&str],
    ) -> &mut Self {
        self.step(|cli| cli.add_action_list_flags(obj_name, obj_list, obj_actions, true))
    }

    fn add_action_list_flags(&mut self, obj_name: &str, obj_list: &str, obj_actions: &[&str], multi: bool) -> CliResult<()> {
        for action in self.sel_actions.clone() {
            for obj_action in obj_actions {
                if action == *obj_action {
                    return Err(CliError::ActionSelfReference(action));
                }
                self.add_list_flag(ParamHost::Action(action.clone()), obj_name, obj_list, obj_action, multi)?;
            }
        }
        Ok(())
    }

    /// Create on `host` the flag carrying the list `obj_list` of `obj_name`.
    pub(crate) fn add_list_flag(
        &mut self,
        host: ParamHost,
        obj_name: &str,
        obj_list: &str,
        obj_action: &str,
        multi: bool,
    ) -> CliResult<()> {
        let key = list_key(obj_name, obj_list);
        if !self.lists.contains_key(&key) {
            return Err(CliError::ListNotFound(key));
        }
        let object = self
            .objects
            .get(obj_name)
            .ok_or_else(|| CliError::ObjectNotFound(obj_name.to_string()))?;
        if !object.actions.contains_key(obj_action) {
            return Err(CliError::object_action_not_found(obj_name, obj_action));
        }

        let flag = if multi {
            format!("{}-{}s", obj_action, obj_name)
        } else {
            format!("{}s", obj_name)
        };
        let help = format!("{} one or more {}", obj_action, object.desc);
        let (action, ref_name) = match &host {
            ParamHost::Action(action) => (action.clone(), format!("{} --{}", action, flag)),
            ParamHost::ObjectAction { action, object } => {
                (action.clone(), format!("{} {} --{}", action, object, flag))
            }
            other => {
                return Err(CliError::Internal(format!(
                    "list flags cannot be added on '{}'",
                    other
                )))
            }
        };

        let data = ParamData::new(self.host_command(&host)?, &flag, help, ValueType::List, ForjOpts::default());
        let mut param = Param::object_list(ParamKind::Flag, data, &key, obj_name);
        param.set_action(obj_action);
        self.add_host_param(&host, param)?;

        if let Some(a) = self.actions.get_mut(&action) {
            a.to_refresh
                .entry(obj_name.to_string())
                .or_default()
                .add_list(&key, obj_action);
        }
        if let Some(list) = self.lists.get_mut(&key) {
            list.flags_list.entry(ref_name).or_insert(ListFlagsRef {
                flag,
                multi_actions: multi,
                host,
                params: Default::default(),
            });
        }
        Ok(())
    }

    /// Copy on the selected actions the field flags of `obj_name` for its action `obj_action`.
    pub fn add_action_flags_from_object_action(&mut self, obj_name: &str, obj_action: &str) -> &mut Self {
        self.step(|cli| {
            let fields: Vec<String> = cli
                .objects
                .get(obj_name)
                .ok_or_else(|| CliError::ObjectNotFound(obj_name.to_string()))?
                .fields
                .keys()
                .cloned()
                .collect();
            for field in fields {
                cli.copy_object_action_flag(obj_name, obj_action, &field, false)?;
            }
            Ok(())
        })
    }

    /// Copy on the selected actions the flag of field `param` of `obj_name` for `obj_action`.
    pub fn add_action_flag_from_object_action(&mut self, obj_name: &str, obj_action: &str, param: &str) -> &mut Self {
        self.step(|cli| cli.copy_object_action_flag(obj_name, obj_action, param, true))
    }

    fn copy_object_action_flag(&mut self, obj_name: &str, obj_action: &str, field: &str, strict: bool) -> CliResult<()> {
        let object = self
            .objects
            .get(obj_name)
            .ok_or_else(|| CliError::ObjectNotFound(obj_name.to_string()))?;
        if !object.fields.contains_key(field) {
            return Err(CliError::field_not_found(obj_name, field));
        }
        let source = object
            .actions
            .get(obj_action)
            .ok_or_else(|| CliError::object_action_not_found(obj_name, obj_action))?;
        let Some(param) = source.params.get(field).cloned() else {
            if strict {
                warn!("Field '{}' of '{}' has no flag on action '{}'. Ignored.", field, obj_name, obj_action);
            }
            return Ok(());
        };
        let single = object.single;

        for action in self.sel_actions.clone() {
            let host = ParamHost::Action(action.clone());
            let mut flag = param.copy_to_flag(&self.host_command(&host)?);
            flag.set_action(obj_action);
            if single {
                flag.set_instance(obj_name);
            }
            let name = flag.name().to_string();
            self.add_host_param(&host, flag)?;
            if let Some(f) = self
                .objects
                .get_mut(obj_name)
                .and_then(|o| o.fields.get_mut(field))
            {
                f.in_actions.insert(action, name);
            }
        }
        Ok(())
    }

    /// Select an object for [`ForjCli::add_action_flag_from_object_field`].
    pub fn with_object(&mut self, object: &str) -> &mut Self {
        self.step(|cli| {
            let o = cli
                .objects
                .get_mut(object)
                .ok_or_else(|| CliError::ObjectNotFound(object.to_string()))?;
            o.sel_instance = None;
            cli.sel_object = Some(object.to_string());
            Ok(())
        })
    }

    /// Select an object instance for [`ForjCli::add_action_flag_from_object_field`].
    pub fn with_object_instance(&mut self, object: &str, instance: &str) -> &mut Self {
        self.step(|cli| {
            let o = cli
                .objects
                .get_mut(object)
                .ok_or_else(|| CliError::ObjectNotFound(object.to_string()))?;
            if !o.instances.contains_key(instance) {
                return Err(CliError::InstanceNotFound {
                    object: object.to_string(),
                    instance: instance.to_string(),
                });
            }
            o.sel_instance = Some(instance.to_string());
            cli.sel_object = Some(object.to_string());
            Ok(())
        })
    }

    /// Expose field `param` of the selected object on the selected actions.
    ///
    /// Single objects and selected instances get a `--<field>` flag now.
    /// Otherwise `--<instance>-<field>` flags are created at parse time for
    /// every instance found.
    pub fn add_action_flag_from_object_field(&mut self, param: &str, options: Option<ForjOpts>) -> &mut Self {
        self.step(|cli| {
            let obj_name = cli.sel_object.clone().ok_or(CliError::NoObjectSelected)?;
            let object = cli
                .objects
                .get(&obj_name)
                .ok_or_else(|| CliError::ObjectNotFound(obj_name.clone()))?;
            let instance = object.sel_instance.clone();
            let field = object
                .instance_field(instance.as_deref(), param)
                .cloned()
                .ok_or_else(|| CliError::field_not_found(&obj_name, param))?;
            let single = object.single;
            let options = options.unwrap_or_else(|| field.options.clone());

            for action in cli.sel_actions.clone() {
                let host = ParamHost::Action(action.clone());
                let (help, bound_instance) = match (&instance, single) {
                    (_, true) => (field.help.clone(), Some(obj_name.clone())),
                    (Some(i), false) => (format!("Flag for instance {}. {}", i, field.help), Some(i.clone())),
                    (None, false) => {
                        if let Some(a) = cli.actions.get_mut(&action) {
                            a.to_refresh
                                .entry(obj_name.clone())
                                .or_default()
                                .add_field(param);
                        }
                        continue;
                    }
                };
                let data = ParamData::new(cli.host_command(&host)?, param, help, field.value_type, options.clone());
                let mut flag = Param::flag(data);
                flag.set_object_field(&obj_name, param);
                if let Some(i) = bound_instance {
                    flag.set_instance(&i);
                }
                cli.add_host_param(&host, flag)?;
                if let Some(f) = cli
                    .objects
                    .get_mut(&obj_name)
                    .and_then(|o| o.fields.get_mut(param))
                {
                    f.in_actions.insert(action, param.to_string());
                }
            }
            Ok(())
        })
    }

    /// Register a `#key` shortcut for field regexes.
    ///
    /// A pattern with no capturing group is wrapped in one.
    pub fn add_field_list_capture(&mut self, key: &str, pattern: &str) -> CliResult<()> {
        if self.filters.contains_key(key) {
            return Err(CliError::CaptureExists(key.to_string()));
        }
        let re = Regex::new(pattern).map_err(|source| CliError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        // Group 0 is the whole match.
        let pattern = if re.captures_len() > 1 {
            pattern.to_string()
        } else {
            format!("({})", pattern)
        };
        self.filters.insert(key.to_string(), pattern);
        Ok(())
    }

    pub fn get_field_list_capture(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str)
    }

    /// Hook called first at every context pass.
    pub fn parse_before_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut ForjCli, &mut dyn Any) -> anyhow::Result<bool> + 'static,
    {
        self.before_hook = Some(Box::new(hook));
        self
    }

    pub fn clear_parse_before_hook(&mut self) -> &mut Self {
        self.before_hook = None;
        self
    }

    /// Hook called last at every context pass.
    pub fn parse_after_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut ForjCli, &mut dyn Any) -> anyhow::Result<bool> + 'static,
    {
        self.after_hook = Some(Box::new(hook));
        self
    }

    pub fn clear_parse_after_hook(&mut self) -> &mut Self {
        self.after_hook = None;
        self
    }

    /// Last schema error. Consumed.
    pub fn error(&mut self) -> Option<CliError> {
        self.err.take()
    }

    pub fn done(&mut self) -> CliResult<()> {
        match self.err.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// True once discovery is over and the final parse started.
    pub fn is_parse_phase(&self) -> bool {
        self.parse
    }

    pub fn get_parse_context(&self) -> &ParseContext {
        &self.parse_context
    }

    pub fn get_current_command(&self) -> &CommandPath {
        &self.cur_cmds
    }

    pub fn context(&self) -> &ForjCliContext {
        &self.context
    }

    pub fn context_action(&self) -> Option<&str> {
        self.context.action.as_deref()
    }

    pub fn context_object(&self) -> Option<&str> {
        self.context.object.as_deref()
    }

    pub fn context_list(&self) -> Option<&ObjectList> {
        self.context.list.as_deref().and_then(|l| self.lists.get(l))
    }

    /// Records of `object`.
    pub fn values(&self, object: &str) -> Option<&ForjRecords> {
        self.values.get(object)
    }

    pub fn all_values(&self) -> &BTreeMap<String, ForjRecords> {
        &self.values
    }

    /// String attribute `field` of record `key` of `object`.
    ///
    /// An empty key selects the only record of the object.
    pub fn get_string_value(&self, object: &str, key: &str, field: &str) -> CliResult<Option<Fetched<String>>> {
        let Some(attr) = self.attr(object, key, field)? else {
            return Ok(None);
        };
        match &attr.value {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(Fetched {
                value: s.clone(),
                is_default: attr.is_default,
            })),
            Some(Value::Bool(_)) => Err(CliError::TypeMismatch {
                object: object.to_string(),
                key: key.to_string(),
                field: field.to_string(),
                expected: "string".to_string(),
            }),
        }
    }

    pub fn get_bool_value(&self, object: &str, key: &str, field: &str) -> CliResult<Option<Fetched<bool>>> {
        let Some(attr) = self.attr(object, key, field)? else {
            return Ok(None);
        };
        let Some(value) = &attr.value else {
            return Ok(None);
        };
        value
            .as_bool()
            .map(|b| {
                Some(Fetched {
                    value: b,
                    is_default: attr.is_default,
                })
            })
            .ok_or_else(|| CliError::TypeMismatch {
                object: object.to_string(),
                key: key.to_string(),
                field: field.to_string(),
                expected: "bool".to_string(),
            })
    }

    fn attr(&self, object: &str, key: &str, field: &str) -> CliResult<Option<&Attr>> {
        if !self.objects.contains_key(object) {
            return Err(CliError::ObjectNotFound(object.to_string()));
        }
        Ok(self.values.get(object).and_then(|r| r.get(key, field)))
    }

    /// Write an attribute. The record is created if needed.
    pub fn set_value(&mut self, object: &str, key: &str, field: &str, value: impl Into<Value>) -> CliResult<()> {
        if !self.objects.contains_key(object) {
            return Err(CliError::ObjectNotFound(object.to_string()));
        }
        self.set_record_value(object, key, field, Some(value.into()), false);
        Ok(())
    }

    pub(crate) fn set_record_value(&mut self, object: &str, key: &str, field: &str, value: Option<Value>, is_default: bool) {
        self.values
            .entry(object.to_string())
            .or_default()
            .record_mut(key)
            .set(field, value, is_default);
    }

    /// Record `key` of `object`, tagged with `action`.
    pub(crate) fn set_object_attributes(&mut self, action: &str, object: &str, key: &str) -> &mut ForjRecord {
        let record = self
            .values
            .entry(object.to_string())
            .or_default()
            .record_mut(key);
        record.set_action(action);
        record
    }

    pub(crate) fn host_command(&self, host: &ParamHost) -> CliResult<CommandPath> {
        match host {
            ParamHost::App => Ok(CommandPath::root()),
            ParamHost::Action(action) => self
                .actions
                .get(action)
                .map(|a| a.command.clone())
                .ok_or_else(|| CliError::ActionNotFound(action.clone())),
            ParamHost::ObjectAction { action, object } => self
                .objects
                .get(object)
                .and_then(|o| o.actions.get(action))
                .map(|oa| oa.command.clone())
                .ok_or_else(|| CliError::object_action_not_found(object, action)),
            ParamHost::ListAction { list, action } => self
                .lists
                .get(list)
                .and_then(|l| l.actions.get(action))
                .map(|oa| oa.command.clone())
                .ok_or_else(|| CliError::ListNotFound(list.clone())),
        }
    }

    pub(crate) fn host_params(&self, host: &ParamHost) -> Option<&BTreeMap<String, Param>> {
        match host {
            ParamHost::App => Some(&self.flags),
            ParamHost::Action(action) => self.actions.get(action).map(|a| &a.params),
            ParamHost::ObjectAction { action, object } => self
                .objects
                .get(object)
                .and_then(|o| o.actions.get(action))
                .map(|oa| &oa.params),
            ParamHost::ListAction { list, action } => self
                .lists
                .get(list)
                .and_then(|l| l.actions.get(action))
                .map(|oa| &oa.params),
        }
    }

    fn host_params_mut(&mut self, host: &ParamHost) -> CliResult<&mut BTreeMap<String, Param>> {
        match host {
            ParamHost::App => Ok(&mut self.flags),
            ParamHost::Action(action) => self
                .actions
                .get_mut(action)
                .map(|a| &mut a.params)
                .ok_or_else(|| CliError::ActionNotFound(action.clone())),
            ParamHost::ObjectAction { action, object } => self
                .objects
                .get_mut(object)
                .and_then(|o| o.actions.get_mut(action))
                .map(|oa| &mut oa.params)
                .ok_or_else(|| CliError::object_action_not_found(object, action)),
            ParamHost::ListAction { list, action } => self
                .lists
                .get_mut(list)
                .and_then(|l| l.actions.get_mut(action))
                .map(|oa| &mut oa.params)
                .ok_or_else(|| CliError::ListNotFound(list.clone())),
        }
    }

    /// Register `param` on `host` and in the engine.
    ///
    /// Returns false, and changes nothing, if `host` already has a
    /// parameter with that name.
    pub(crate) fn add_host_param(&mut self, host: &ParamHost, param: Param) -> CliResult<bool> {
        if self
            .host_params(host)
            .map_or(false, |p| p.contains_key(param.name()))
        {
            return Ok(false);
        }
        self.engine.add_param(param.command(), param.spec())?;
        self.host_params_mut(host)?
            .insert(param.name().to_string(), param);
        Ok(true)
    }

    /// Merge `options` into parameter `name` of `host`, engine included.
    pub(crate) fn update_host_param(&mut self, host: &ParamHost, name: &str, options: &ForjOpts) -> CliResult<()> {
        let params = self.host_params_mut(host)?;
        let Some(param) = params.get_mut(name) else {
            return Ok(());
        };
        param.set_options(options);
        let (command, spec) = (param.command().clone(), param.spec());
        self.engine.add_param(&command, spec)
    }

    /// Every parameter of the schema.
    pub(crate) fn all_params(&self) -> Vec<&Param> {
        let mut params: Vec<&Param> = self.flags.values().collect();
        for action in self.actions.values() {
            params.extend(action.params.values());
        }
        for object in self.objects.values() {
            for oa in object.actions.values() {
                params.extend(oa.params.values());
            }
        }
        for list in self.lists.values() {
            for oa in list.actions.values() {
                params.extend(oa.params.values());
            }
        }
        params
    }

    pub(crate) fn for_each_param_mut(&mut self, mut f: impl FnMut(&mut Param)) {
        self.flags.values_mut().for_each(&mut f);
        for action in self.actions.values_mut() {
            action.params.values_mut().for_each(&mut f);
        }
        for object in self.objects.values_mut() {
            for oa in object.actions.values_mut() {
                oa.params.values_mut().for_each(&mut f);
            }
        }
        for list in self.lists.values_mut() {
            for oa in list.actions.values_mut() {
                oa.params.values_mut().for_each(&mut f);
            }
        }
    }
}

impl fmt::Debug for ForjCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForjCli")
            .field("app", &self.engine.app_name())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("objects", &self.objects.keys().collect::<Vec<_>>())
            .field("lists", &self.lists.keys().collect::<Vec<_>>())
            .field("context", &self.context)
            .field("parse", &self.parse)
            .field("err", &self.err)
            .finish()
    }
}

impl fmt::Display for ForjCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "forj cli '{}'", self.engine.app_name())?;
        writeln!(f, "app flags: {}", self.flags.len())?;
        for flag in self.flags.values() {
            write!(f, "{}", indent(&flag.to_string(), "  "))?;
        }
        writeln!(f, "actions: {}", self.actions.len())?;
        for action in self.actions.values() {
            write!(f, "{}", indent(&action.to_string(), "  "))?;
        }
        writeln!(f, "objects: {}", self.objects.len())?;
        for object in self.objects.values() {
            write!(f, "{}", indent(&object.to_string(), "  "))?;
        }
        writeln!(f, "lists: {}", self.lists.len())?;
        for list in self.lists.values() {
            write!(f, "{}", indent(&list.to_string(), "  "))?;
        }
        writeln!(f, "captures: {}", self.filters.len())?;
        for (key, pattern) in &self.filters {
            writeln!(f, "  #{}: {}", key, pattern)?;
        }
        writeln!(f, "values:")?;
        for (object, records) in &self.values {
            writeln!(f, "  {}:", object)?;
            write!(f, "{}", indent(&records.to_string(), "    "))?;
        }
        Ok(())
    }
}
