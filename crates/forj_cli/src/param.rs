//! Flags and positional arguments bound into the schema.

use std::fmt;

use crate::engine::{CommandPath, ParamKind, ParamSpec, ParseContext};
use crate::options::ForjOpts;
use crate::types::{ParsedValue, Value, ValueType};

/// What a parameter represents in the object model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBinding {
    pub object: Option<String>,
    pub field: Option<String>,
    pub instance: Option<String>,
    /// Action recorded on the records this parameter produces.
    pub action: Option<String>,
    /// Key of the object list this parameter decodes or belongs to.
    pub list: Option<String>,
}

/// Where a parameter lives in the schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamHost {
    /// Application level flag.
    App,
    Action(String),
    ObjectAction { action: String, object: String },
    /// `<action> <object>s`, keyed by list.
    ListAction { list: String, action: String },
}

impl fmt::Display for ParamHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => write!(f, "<app>"),
            Self::Action(action) => write!(f, "{}", action),
            Self::ObjectAction { action, object } => write!(f, "{} {}", action, object),
            Self::ListAction { list, action } => write!(f, "{} list {}", action, list),
        }
    }
}

/// Data shared by every kind of parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamData {
    pub name: String,
    pub help: String,
    pub value_type: ValueType,
    pub options: ForjOpts,
    pub command: CommandPath,
    pub binding: ParamBinding,
    value: Option<ParsedValue>,
}

impl ParamData {
    pub fn new(
        command: CommandPath,
        name: impl Into<String>,
        help: impl Into<String>,
        value_type: ValueType,
        options: ForjOpts,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value_type,
            options,
            command,
            binding: ParamBinding::default(),
            value: None,
        }
    }
}

/// A flag, a positional argument, or a parameter carrying a packed object list.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Flag(ParamData),
    Arg(ParamData),
    ObjectList { kind: ParamKind, data: ParamData },
}

impl Param {
    pub fn flag(data: ParamData) -> Self {
        Self::Flag(data)
    }

    pub fn arg(data: ParamData) -> Self {
        Self::Arg(data)
    }

    /// A `--<object>s` flag or `<object>s` argument bound to the list `list_key`.
    pub fn object_list(kind: ParamKind, mut data: ParamData, list_key: &str, object: &str) -> Self {
        data.value_type = ValueType::List;
        data.binding.list = Some(list_key.to_string());
        data.binding.object = Some(object.to_string());
        Self::ObjectList { kind, data }
    }

    pub fn data(&self) -> &ParamData {
        match self {
            Self::Flag(d) | Self::Arg(d) => d,
            Self::ObjectList { data, .. } => data,
        }
    }

    pub fn data_mut(&mut self) -> &mut ParamData {
        match self {
            Self::Flag(d) | Self::Arg(d) => d,
            Self::ObjectList { data, .. } => data,
        }
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Flag(_) => ParamKind::Flag,
            Self::Arg(_) => ParamKind::Arg,
            Self::ObjectList { kind, .. } => *kind,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::ObjectList { .. })
    }

    pub fn binding(&self) -> &ParamBinding {
        &self.data().binding
    }

    pub fn command(&self) -> &CommandPath {
        &self.data().command
    }

    /// Declaration handed to the parsing engine.
    pub fn spec(&self) -> ParamSpec {
        let data = self.data();
        let spec = match self.kind() {
            ParamKind::Flag => ParamSpec::flag(&data.name, &data.help, data.value_type),
            ParamKind::Arg => ParamSpec::arg(&data.name, &data.help, data.value_type),
        };
        spec.with_options(data.options.clone())
    }

    /// True if the parameter sits on `selected` or one of its parents.
    pub fn is_on_chain(&self, selected: &CommandPath) -> bool {
        selected.names().starts_with(self.command().names())
    }

    /// Value found for this parameter in `ctx`, if its command was selected.
    pub fn context_value<'a>(&self, ctx: &'a ParseContext) -> Option<&'a ParsedValue> {
        if !self.is_on_chain(ctx.selected_commands()) {
            return None;
        }
        ctx.value_at(self.command(), self.kind(), self.name())
    }

    /// Load the final value from `ctx`.
    pub fn load_from(&mut self, ctx: &ParseContext) {
        let value = self.context_value(ctx).cloned();
        self.data_mut().value = value;
    }

    pub fn is_found(&self) -> bool {
        self.data().value.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        self.data().value.as_ref().map(|v| &v.value)
    }

    pub fn is_default(&self) -> bool {
        self.data().value.as_ref().map_or(true, |v| v.is_default())
    }

    pub fn string_value(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    pub fn bool_value(&self) -> bool {
        self.value().and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn set_options(&mut self, options: &ForjOpts) {
        self.data_mut().options.merge(options);
    }

    pub fn set_object_field(&mut self, object: &str, field: &str) {
        let b = &mut self.data_mut().binding;
        b.object = Some(object.to_string());
        b.field = Some(field.to_string());
    }

    pub fn set_instance(&mut self, instance: &str) {
        self.data_mut().binding.instance = Some(instance.to_string());
    }

    pub fn set_action(&mut self, action: &str) {
        self.data_mut().binding.action = Some(action.to_string());
    }

    pub fn set_list(&mut self, list_key: &str) {
        self.data_mut().binding.list = Some(list_key.to_string());
    }

    /// Same parameter as a flag on another command. Binding is kept, value is not.
    pub fn copy_to_flag(&self, command: &CommandPath) -> Param {
        Param::Flag(self.copy_data(command))
    }

    /// Same parameter as a positional argument on another command.
    pub fn copy_to_arg(&self, command: &CommandPath) -> Param {
        Param::Arg(self.copy_data(command))
    }

    fn copy_data(&self, command: &CommandPath) -> ParamData {
        let mut data = self.data().clone();
        data.command = command.clone();
        data.value = None;
        data
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Flag(_) => "flag",
            Self::Arg(_) => "arg",
            Self::ObjectList { .. } => "list",
        };
        let data = self.data();
        writeln!(f, "{} '{}' ({}) on '{}'", kind, data.name, data.value_type, data.command)?;
        let b = &data.binding;
        if let Some(object) = &b.object {
            writeln!(f, "  object: {}", object)?;
        }
        if let Some(field) = &b.field {
            writeln!(f, "  field: {}", field)?;
        }
        if let Some(instance) = &b.instance {
            writeln!(f, "  instance: {}", instance)?;
        }
        if let Some(list) = &b.list {
            writeln!(f, "  list: {}", list)?;
        }
        if let Some(value) = &data.value {
            writeln!(f, "  value: {} (default: {})", value.value, value.is_default())?;
        }
        Ok(())
    }
}
