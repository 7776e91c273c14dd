//! Parsing engine adapter.
//!
//! The CLI core never talks to a command-line library directly. It declares
//! commands, flags and positional arguments through [`ParseEngine`] and reads
//! back a [`ParseContext`] describing which commands were selected and what
//! values were given. Two engines are provided:
//!
//! - [`ClapEngine`]: the production engine, built on the clap builder API.
//! - [`MockEngine`]: a scriptable engine for tests, with preset contexts.

use std::collections::HashMap;

use crate::error::CliResult;
use crate::options::ForjOpts;
use crate::types::{ParsedValue, ValueType};

pub mod clap_engine;
pub mod mock;
pub mod tree;

pub use clap_engine::ClapEngine;
pub use mock::MockEngine;
pub use tree::{CommandNode, CommandTree};

/// Path of a command from the application root, e.g. `create repo`.
///
/// The empty path is the application itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandPath(Vec<String>);

impl CommandPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut names = self.0.clone();
        names.push(name.into());
        Self(names)
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }
}

impl std::fmt::Display for CommandPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Flag or positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Flag,
    Arg,
}

/// Declaration of one flag or argument, as handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub name: String,
    pub help: String,
    pub value_type: ValueType,
    pub options: ForjOpts,
}

impl ParamSpec {
    pub fn flag(name: impl Into<String>, help: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            kind: ParamKind::Flag,
            name: name.into(),
            help: help.into(),
            value_type,
            options: ForjOpts::default(),
        }
    }

    pub fn arg(name: impl Into<String>, help: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            kind: ParamKind::Arg,
            ..Self::flag(name, help, value_type)
        }
    }

    pub fn with_options(mut self, options: ForjOpts) -> Self {
        self.options = options;
        self
    }
}

/// Key of a parsed value: the command declaring the parameter and its name.
type ValueKey = (CommandPath, String);

/// What the engine found on the command line.
///
/// Values are stored under the command that declares them, so two commands
/// of the selected chain can carry a parameter with the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseContext {
    commands: CommandPath,
    flags: HashMap<ValueKey, ParsedValue>,
    args: HashMap<ValueKey, ParsedValue>,
}

impl ParseContext {
    pub fn new(commands: CommandPath) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }

    /// The chain of selected commands, outermost first.
    pub fn selected_commands(&self) -> &CommandPath {
        &self.commands
    }

    pub fn push_command(&mut self, name: impl Into<String>) {
        self.commands.push(name);
    }

    /// Set a flag value on the last selected command.
    pub fn insert_flag(&mut self, name: impl Into<String>, value: ParsedValue) {
        let command = self.commands.clone();
        self.insert_flag_at(&command, name, value);
    }

    /// Set an argument value on the last selected command.
    pub fn insert_arg(&mut self, name: impl Into<String>, value: ParsedValue) {
        let command = self.commands.clone();
        self.insert_arg_at(&command, name, value);
    }

    pub fn insert_flag_at(&mut self, command: &CommandPath, name: impl Into<String>, value: ParsedValue) {
        self.flags.insert((command.clone(), name.into()), value);
    }

    pub fn insert_arg_at(&mut self, command: &CommandPath, name: impl Into<String>, value: ParsedValue) {
        self.args.insert((command.clone(), name.into()), value);
    }

    /// Flag `name` on any selected command, the deepest one first.
    pub fn flag(&self, name: &str) -> Option<&ParsedValue> {
        deepest(&self.flags, name)
    }

    /// Argument `name` on any selected command, the deepest one first.
    pub fn arg(&self, name: &str) -> Option<&ParsedValue> {
        deepest(&self.args, name)
    }

    /// Value parsed for the parameter `name` declared on `command`.
    pub fn value_at(&self, command: &CommandPath, kind: ParamKind, name: &str) -> Option<&ParsedValue> {
        let key = (command.clone(), name.to_string());
        match kind {
            ParamKind::Flag => self.flags.get(&key),
            ParamKind::Arg => self.args.get(&key),
        }
    }

    /// Explicitly given flag value, ignoring defaults.
    pub fn explicit_flag(&self, name: &str) -> Option<&ParsedValue> {
        self.flag(name).filter(|v| !v.is_default())
    }
}

fn deepest<'a>(values: &'a HashMap<ValueKey, ParsedValue>, name: &str) -> Option<&'a ParsedValue> {
    values
        .iter()
        .filter(|((_, n), _)| n == name)
        .max_by_key(|((command, _), _)| command.len())
        .map(|(_, value)| value)
}

/// Capabilities the CLI core needs from a command-line parser.
pub trait ParseEngine {
    /// Application name, used as program name when parsing.
    fn app_name(&self) -> &str;

    /// Create a sub-command under `parent`, returning its path.
    ///
    /// Creating an existing command updates its help and keeps its content.
    fn add_command(&mut self, parent: &CommandPath, name: &str, help: &str) -> CliResult<CommandPath>;

    /// Create or replace a flag or positional argument on `command`.
    fn add_param(&mut self, command: &CommandPath, spec: ParamSpec) -> CliResult<()>;

    /// True if `command` exists.
    fn has_command(&self, command: &CommandPath) -> bool;

    /// True if `command` carries the flag `name`.
    fn has_flag(&self, command: &CommandPath, name: &str) -> bool;

    /// True if `command` carries the positional argument `name`.
    fn has_arg(&self, command: &CommandPath, name: &str) -> bool;

    /// Lightweight parse used during context discovery.
    ///
    /// Never fails: unknown flags and missing required values are ignored,
    /// an unusable command line gives an empty context.
    fn parse_context(&mut self, args: &[String]) -> ParseContext;

    /// Full parse against the current schema.
    fn parse(&mut self, args: &[String]) -> CliResult<ParseContext>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_command_path() {
        let path = CommandPath::root().child("create").child("repo");
        assert_eq!(path.len(), 2);
        assert_eq!(path.last(), Some("repo"));
        assert_eq!(path.to_string(), "create repo");
        assert_eq!(path, CommandPath::new(["create", "repo"]));
    }

    #[test]
    fn test_context_explicit_flag() {
        let mut ctx = ParseContext::new(CommandPath::new(["create"]));
        ctx.insert_flag("a", ParsedValue::explicit("x"));
        ctx.insert_flag("b", ParsedValue::default_value("y"));

        assert!(ctx.explicit_flag("a").is_some());
        assert!(ctx.explicit_flag("b").is_none());
        assert!(ctx.flag("b").is_some());
    }

    #[test]
    fn test_context_values_by_command() {
        let update = CommandPath::new(["update"]);
        let test = CommandPath::new(["update", "test"]);
        let mut ctx = ParseContext::new(test.clone());
        ctx.insert_flag_at(&update, "name", ParsedValue::explicit("outer"));
        ctx.insert_flag("name", ParsedValue::explicit("inner"));

        let at = |command: &CommandPath| {
            ctx.value_at(command, ParamKind::Flag, "name")
                .map(|v| v.value.clone())
        };
        assert_eq!(at(&update), Some(Value::from("outer")));
        assert_eq!(at(&test), Some(Value::from("inner")));
        assert_eq!(ctx.flag("name").unwrap().value, Value::from("inner"));
        assert!(ctx.value_at(&test, ParamKind::Arg, "name").is_none());
    }
}
