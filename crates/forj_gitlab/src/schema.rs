//! Declares the plugin command line from its descriptor.

use tracing::debug;

use forj_cli::{ForjCli, ParseEngine};

use crate::descriptor::{ObjectDef, PluginDescriptor, COMMON_FLAGS};
use crate::error::PluginResult;

/// A plugin command line over `engine`, declared from `desc`.
pub fn new_cli(engine: impl ParseEngine + 'static, desc: &PluginDescriptor) -> PluginResult<ForjCli> {
    let mut cli = ForjCli::new(engine);
    declare(&mut cli, desc)?;
    Ok(cli)
}

/// Declare actions, task flags and objects of `desc` on `cli`.
pub fn declare(cli: &mut ForjCli, desc: &PluginDescriptor) -> PluginResult<()> {
    for action in &desc.actions {
        cli.new_actions(&action.name, &action.help, &action.object_help(), action.internal);
    }
    cli.done()?;

    for (action, flags) in &desc.task_flags {
        let actions = if action == COMMON_FLAGS {
            desc.public_actions()
        } else {
            vec![action.as_str()]
        };
        cli.on_actions(&actions);
        for (name, flag) in flags {
            cli.add_flag(flag.value_type, name, &flag.help, flag.options());
        }
        cli.done()?;
    }

    for object in &desc.objects {
        declare_object(cli, object)?;
    }
    debug!("Plugin '{}' schema declared", desc.plugin);
    Ok(())
}

fn declare_object(cli: &mut ForjCli, def: &ObjectDef) -> PluginResult<()> {
    let mut object = cli.new_object(&def.name, &def.help, &def.role);
    if def.single {
        object = object.single();
    }
    if let Some(key) = &def.key {
        object = object.add_key(key.flag.value_type, &key.name, &key.flag.help, key.flag.regex(), key.flag.options());
    }
    for (name, field) in &def.fields {
        object = object.add_field(field.value_type, name, &field.help, field.regex(), field.options());
    }

    let actions: Vec<&str> = def.actions.iter().map(String::as_str).collect();
    object = object.define_actions(&actions).on_actions(&[]);
    if let Some(key) = &def.key {
        object = object.add_flag(&key.name, None);
    }
    for name in def.fields.keys() {
        object = object.add_flag(name, None);
    }
    object.done()?;

    for list in &def.lists {
        let actions: Vec<&str> = list.actions.iter().map(String::as_str).collect();
        cli.object(&def.name)
            .create_list(&list.name, &list.sep, &list.template, &list.help)
            .add_actions(&actions)
            .done()?;

        for (action, obj_action) in &list.action_flags {
            cli.on_actions(&[action.as_str()])
                .add_action_flag_from_object_list_action(&def.name, &list.name, obj_action);
        }
        cli.done()?;
    }

    if !def.action_flags.is_empty() {
        let actions: Vec<&str> = def.action_flags.iter().map(String::as_str).collect();
        cli.on_actions(&actions).with_object(&def.name);
        for name in def.fields.keys() {
            cli.add_action_flag_from_object_field(name, None);
        }
        cli.done()?;
    }
    Ok(())
}
