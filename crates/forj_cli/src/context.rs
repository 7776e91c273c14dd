//! Two-phase parse: context discovery, then the final parse.
//!
//! Discovery runs the engine leniently, finds the action/object/list the
//! command line is about, decodes the lists it carries and lets hooks
//! extend the schema. Instance flags are synthesized from the decoded
//! lists. Passes repeat until neither a hook nor the synthesis changed the
//! schema. The final parse then runs strictly against the stable schema and
//! fills the value store.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::cli::ForjCli;
use crate::engine::{CommandPath, ParamKind, ParseContext};
use crate::error::{CliError, CliResult};
use crate::field::Field;
use crate::object::NO_FIELDS;
use crate::options::ForjOpts;
use crate::param::{Param, ParamData, ParamHost};
use crate::types::{ParsedValue, Value, ValueType};

/// What the selected command is about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForjCliContext {
    pub action: Option<String>,
    pub object: Option<String>,
    /// Key of the object list, for `<action> <object>s` commands.
    pub list: Option<String>,
}

/// An object field value found on the command line.
struct FieldValue {
    object: String,
    field: String,
    instance: Option<String>,
    action: Option<String>,
    value: ParsedValue,
}

impl ForjCli {
    /// Parse `args`. Returns the selected command path.
    ///
    /// `app_ctx` is handed to every hook.
    pub fn parse(&mut self, args: &[String], app_ctx: &mut dyn Any) -> CliResult<CommandPath> {
        self.parse = false;
        self.load_context(args, app_ctx)?;

        self.parse = true;
        let ctx = self.engine.parse(args)?;
        self.set_parse_context(ctx);
        self.load_object_data()?;
        debug!("Parsed '{}'", self.cur_cmds);
        Ok(self.cur_cmds.clone())
    }

    fn set_parse_context(&mut self, ctx: ParseContext) {
        self.cur_cmds = ctx.selected_commands().clone();
        self.parse_context = ctx;
        let path = self.cur_cmds.clone();
        self.identify_objects(&path);
    }

    /// Discovery passes.
    pub(crate) fn load_context(&mut self, args: &[String], app_ctx: &mut dyn Any) -> CliResult<()> {
        for pass in 1..=self.max_context_passes {
            let ctx = self.engine.parse_context(args);
            self.set_parse_context(ctx);
            self.load_list_data()?;
            let updated = self.context_hook(&mut *app_ctx)?;
            let created = self.add_instance_flags()?;
            debug!(
                "Context pass {}: '{}', hooks updated: {}, flags created: {}",
                pass, self.cur_cmds, updated, created
            );
            if !updated && created == 0 {
                return Ok(());
            }
        }
        Err(CliError::SchemaUnstable(self.max_context_passes))
    }

    /// Set the context action, object and list from a command path.
    pub(crate) fn identify_objects(&mut self, path: &CommandPath) {
        self.context = ForjCliContext::default();
        let names = path.names();
        let Some(action) = names.first().filter(|a| self.actions.contains_key(*a)) else {
            return;
        };
        self.context.action = Some(action.clone());

        let Some(name) = names.get(1) else {
            return;
        };
        if self
            .objects
            .get(name)
            .map_or(false, |o| o.actions.contains_key(action))
        {
            self.context.object = Some(name.clone());
            return;
        }
        if let Some(list) = self
            .lists
            .values()
            .find(|l| l.actions.contains_key(action) && format!("{}s", l.object) == *name)
        {
            self.context.object = Some(list.object.clone());
            self.context.list = Some(list.key());
        }
    }

    /// Run the before-hook, every object hook, then the after-hook.
    ///
    /// Objects created by the before-hook get their hook run in the same call.
    pub(crate) fn context_hook(&mut self, app_ctx: &mut dyn Any) -> CliResult<bool> {
        let mut updated = false;

        if let Some(mut hook) = self.before_hook.take() {
            let result = hook(self, &mut *app_ctx);
            self.before_hook.get_or_insert(hook);
            updated |= result?;
        }

        let names: Vec<String> = self.objects.keys().cloned().collect();
        for name in names {
            let Some(mut hook) = self.objects.get_mut(&name).and_then(|o| o.hook.take()) else {
                continue;
            };
            let result = hook(&name, self, &mut *app_ctx);
            if let Some(o) = self.objects.get_mut(&name) {
                o.hook.get_or_insert(hook);
            }
            updated |= result?;
        }

        if let Some(mut hook) = self.after_hook.take() {
            let result = hook(self, &mut *app_ctx);
            self.after_hook.get_or_insert(hook);
            updated |= result?;
        }
        Ok(updated)
    }

    /// Decode the lists found in the parse context and fill the value store.
    pub(crate) fn load_list_data(&mut self) -> CliResult<()> {
        for list in self.lists.values_mut() {
            list.items.clear();
        }
        let ctx = self.parse_context.clone();

        if let (Some(action), Some(key)) = (self.context.action.clone(), self.context.list.clone()) {
            let value = self
                .lists
                .get(&key)
                .and_then(|l| l.actions.get(&action))
                .and_then(|oa| oa.params.values().find(|p| p.is_list()))
                .and_then(|p| p.context_value(&ctx))
                .and_then(|v| v.value.as_str().map(str::to_string));
            if let Some(value) = value {
                self.load_list_items(&key, &value, &action)?;
            }
        }

        let flags: Vec<(String, String, String)> = self
            .all_params()
            .into_iter()
            .filter(|p| p.is_list() && p.kind() == ParamKind::Flag)
            .filter_map(|p| {
                let value = p.context_value(&ctx)?.value.as_str()?.to_string();
                let b = p.binding();
                Some((b.list.clone()?, value, b.action.clone()?))
            })
            .collect();
        for (key, value, action) in flags {
            self.load_list_items(&key, &value, &action)?;
        }

        self.load_field_values(&ctx)
    }

    fn load_list_items(&mut self, key: &str, value: &str, action: &str) -> CliResult<()> {
        let list = self
            .lists
            .get(key)
            .ok_or_else(|| CliError::ListNotFound(key.to_string()))?;
        let items = list.decode(value)?;
        let object = list.object.clone();
        let types: BTreeMap<String, ValueType> = self
            .objects
            .get(&object)
            .map(|o| {
                o.fields
                    .values()
                    .map(|f| (f.name.clone(), f.value_type))
                    .collect()
            })
            .unwrap_or_default();

        for item in &items {
            let record = self.set_object_attributes(action, &object, &item.key);
            for (field, raw) in &item.data {
                let value_type = types.get(field).copied().unwrap_or_default();
                record.set(field, Some(Value::parse(value_type, raw)), false);
            }
        }
        debug!("List '{}': {} element(s) for action '{}'", key, items.len(), action);
        if let Some(list) = self.lists.get_mut(key) {
            list.items.extend(items);
        }
        Ok(())
    }

    /// Store the object field values given by flags and arguments.
    fn load_field_values(&mut self, ctx: &ParseContext) -> CliResult<()> {
        let found: Vec<FieldValue> = self
            .all_params()
            .into_iter()
            .filter(|p| !p.is_list())
            .filter_map(|p| {
                let b = p.binding();
                Some(FieldValue {
                    object: b.object.clone()?,
                    field: b.field.clone()?,
                    instance: b.instance.clone(),
                    action: b.action.clone(),
                    value: p.context_value(ctx)?.clone(),
                })
            })
            .collect();

        let mut by_object: BTreeMap<String, Vec<FieldValue>> = BTreeMap::new();
        for fv in found {
            match fv.instance.clone() {
                Some(instance) => self.store_instance_value(&instance, fv),
                None => by_object.entry(fv.object.clone()).or_default().push(fv),
            }
        }

        for (object, values) in by_object {
            let Some(o) = self.objects.get(&object) else {
                continue;
            };
            let key = if o.single {
                Some(object.clone())
            } else {
                o.key_name().and_then(|k| {
                    values
                        .iter()
                        .find(|v| v.field == k)
                        .and_then(|v| v.value.value.as_str().map(str::to_string))
                })
            };
            let Some(key) = key else {
                debug!("Object '{}': no key value found. Values ignored.", object);
                continue;
            };
            let action = values
                .iter()
                .find_map(|v| v.action.clone())
                .or_else(|| self.context.action.clone());
            let record = match &action {
                Some(action) => self.set_object_attributes(action, &object, &key),
                None => self.values.entry(object.clone()).or_default().record_mut(&key),
            };
            for v in values {
                let is_default = v.value.is_default();
                record.set(&v.field, Some(v.value.value), is_default);
            }
        }
        Ok(())
    }

    fn store_instance_value(&mut self, instance: &str, fv: FieldValue) {
        let (single, key_name) = match self.objects.get(&fv.object) {
            Some(o) => (o.single, o.key_name().map(str::to_string)),
            None => return,
        };
        let record = self
            .values
            .entry(fv.object.clone())
            .or_default()
            .record_mut(instance);
        if let (false, Some(key)) = (single, key_name) {
            if record.get(&key).is_none() {
                record.set(&key, Some(Value::from(instance)), false);
            }
        }
        let is_default = fv.value.is_default();
        record.set(&fv.field, Some(fv.value.value), is_default);
    }

    /// Create the `<instance>-<field>` flags for the instances known so far.
    ///
    /// Returns the number of flags created.
    pub(crate) fn add_instance_flags(&mut self) -> CliResult<usize> {
        let mut planned: Vec<(ParamHost, Param, Option<(String, String)>)> = Vec::new();

        for list in self.lists.values().filter(|l| !l.items.is_empty()) {
            let Some(object) = self.objects.get(&list.object) else {
                continue;
            };
            let key = list.key();
            let mut hosts: Vec<(ParamHost, Option<String>)> = list
                .actions
                .keys()
                .map(|action| {
                    (
                        ParamHost::ListAction {
                            list: key.clone(),
                            action: action.clone(),
                        },
                        None,
                    )
                })
                .collect();
            hosts.extend(
                list.flags_list
                    .iter()
                    .map(|(name, r)| (r.host.clone(), Some(name.clone()))),
            );

            for item in &list.items {
                let instance_fields = object.instances.get(&item.key).map(|i| i.fields.values());
                let fields = object
                    .fields
                    .values()
                    .filter(|f| !f.key && f.name != NO_FIELDS && !list.template.captures_field(&f.name))
                    .chain(instance_fields.into_iter().flatten());
                for field in fields {
                    for (host, flag_ref) in &hosts {
                        let mut param = instance_flag(self.host_command(host)?, &object.name, &item.key, field);
                        param.set_list(&key);
                        let reference = flag_ref
                            .as_ref()
                            .map(|r| (key.clone(), r.clone()));
                        planned.push((host.clone(), param, reference));
                    }
                }
            }
        }

        for (action_name, action) in &self.actions {
            for (obj_name, refresh) in action.to_refresh.iter().filter(|(_, r)| !r.fields.is_empty()) {
                let Some(object) = self.objects.get(obj_name).filter(|o| !o.single) else {
                    continue;
                };
                let mut instances: BTreeSet<String> = object.instances.keys().cloned().collect();
                if let Some(records) = self.values.get(obj_name) {
                    instances.extend(records.keys().cloned());
                }
                for instance in &instances {
                    for name in &refresh.fields {
                        let Some(field) = object.instance_field(Some(instance), name) else {
                            continue;
                        };
                        let param = instance_flag(action.command.clone(), obj_name, instance, field);
                        planned.push((ParamHost::Action(action_name.clone()), param, None));
                    }
                }
            }
        }

        let mut created = 0;
        for (host, param, reference) in planned {
            let name = param.name().to_string();
            if self.add_host_param(&host, param)? {
                debug!("Instance flag '--{}' created on '{}'", name, host);
                created += 1;
            }
            if let Some((key, ref_name)) = reference {
                if let Some(r) = self
                    .lists
                    .get_mut(&key)
                    .and_then(|l| l.flags_list.get_mut(&ref_name))
                {
                    r.params.insert(name);
                }
            }
        }
        Ok(created)
    }

    /// Load final parameter values, then fill the value store.
    pub(crate) fn load_object_data(&mut self) -> CliResult<()> {
        let ctx = self.parse_context.clone();
        self.for_each_param_mut(|p| p.load_from(&ctx));
        self.load_list_data()
    }
}

/// `--<instance>-<field>` bound to one object instance field.
fn instance_flag(command: CommandPath, object: &str, instance: &str, field: &Field) -> Param {
    let mut options: ForjOpts = field.options.clone();
    options.required = None;
    let data = ParamData::new(
        command,
        format!("{}-{}", instance, field.name),
        format!("{} for {}", field.help, instance),
        field.value_type,
        options,
    );
    let mut param = Param::flag(data);
    param.set_object_field(object, &field.name);
    param.set_instance(instance);
    param
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, ParseEngine};
    use crate::records::ACTION_ATTR;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn new_cli() -> (ForjCli, MockEngine) {
        let engine = MockEngine::new("Application");
        let mut cli = ForjCli::new(engine.clone());
        cli.new_actions("create", "create help", "create an {}", false)
            .new_actions("update", "update help", "update an {}", false);
        cli.done().unwrap();
        (cli, engine)
    }

    fn action_of(cli: &ForjCli, key: &str) -> Option<String> {
        cli.get_string_value("test", key, ACTION_ATTR)
            .unwrap()
            .map(|f| f.value)
    }

    #[test]
    fn test_instance_flags_created_once() {
        let (mut cli, engine) = new_cli();
        cli.new_object("test", "test object help", "")
            .add_key(ValueType::String, "flag", "flag help", "[a-z]+[a-z0-9_-]*", None)
            .add_field(ValueType::String, "flag2", "flag2 help", "", None)
            .define_actions(&["create"])
            .on_actions(&[])
            .add_arg("flag", None)
            .add_flag("flag2", None)
            .create_list("to_create", ",", "flag", "list of tests")
            .add_actions(&["create"])
            .done()
            .unwrap();

        let ctx = engine
            .clone()
            .parse_context(&args(&["cmd:create", "cmd:tests", "tests", "name1,name2"]));
        cli.set_parse_context(ctx);
        cli.load_list_data().unwrap();

        assert_eq!(cli.add_instance_flags().unwrap(), 2);
        let flags = engine.list_of(&["create", "tests"]);
        assert!(flags.contains(&"name1-flag2".to_string()));
        assert!(flags.contains(&"name2-flag2".to_string()));

        assert_eq!(cli.add_instance_flags().unwrap(), 0);
        assert_eq!(engine.list_of(&["create", "tests"]), flags);
    }

    fn create_test_once(cli: &mut ForjCli, _: &mut dyn Any) -> anyhow::Result<bool> {
        if cli.get_object("test").is_some() {
            anyhow::bail!("Found object 'test'.");
        }
        cli.new_object("test", "created by hook", "")
            .add_key(ValueType::String, "name", "name", "", None)
            .done()?;
        Ok(true)
    }

    #[test]
    fn test_before_hook_fails_on_second_call() {
        let (mut cli, _engine) = new_cli();
        cli.parse_before_hook(create_test_once);

        assert!(cli.context_hook(&mut ()).unwrap());
        assert!(cli.get_object("test").is_some());

        let err = cli.context_hook(&mut ()).unwrap_err();
        assert_eq!(err.to_string(), "Found object 'test'.");
    }

    #[test]
    fn test_before_hook_error_stops_parse() {
        let (mut cli, engine) = new_cli();
        cli.parse_before_hook(create_test_once);

        let err = cli.parse(&[], &mut ()).unwrap_err();
        assert_eq!(err.to_string(), "Found object 'test'.");
        assert!(cli.get_object("test").is_some());
        assert_eq!(engine.context_parse_count(), 2);
        assert_eq!(engine.parse_count(), 0);
    }

    #[test]
    fn test_copied_action_flags_keep_their_own_values() {
        let (mut cli, engine) = new_cli();
        cli.new_object("test", "test", "")
            .add_key(ValueType::String, "name", "name", "", None)
            .define_actions(&["create", "update"])
            .on_actions(&[])
            .add_flag("name", None)
            .done()
            .unwrap();
        cli.on_actions(&["update"])
            .add_action_flags_from_object_action("test", "create");
        cli.done().unwrap();
        assert!(engine.get_flag(&["update"], "name").is_some());
        assert!(engine.get_flag(&["update", "test"], "name").is_some());

        cli.parse(&args(&["cmd:update", "cmd:test", "name", "x"]), &mut ())
            .unwrap();
        assert_eq!(action_of(&cli, "x").as_deref(), Some("update"));
        assert!(!cli.get_action_param("update", "name").unwrap().is_found());
        assert!(cli.get_object_param("test", "update", "name").unwrap().is_found());

        cli.parse(&args(&["cmd:update", "name", "y"]), &mut ())
            .unwrap();
        assert_eq!(action_of(&cli, "y").as_deref(), Some("create"));
    }
}
