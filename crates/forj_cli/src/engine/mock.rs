//! Scriptable parsing engine for tests.
//!
//! The mock keeps the same command registry as the clap engine but reads a
//! simplified argument vector: `cmd:<name>` selects the next command, every
//! other token is a parameter name followed by its value:
//!
//! ```text
//! ["cmd:create", "cmd:repo", "name", "infra", "title", "Infra repo"]
//! ```
//!
//! A context can also be preset with [`MockEngine::set_context`] and
//! [`MockEngine::set_context_value`]; it is used whenever a parse is
//! requested with no arguments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::tree::CommandTree;
use super::{CommandPath, ParamKind, ParamSpec, ParseContext, ParseEngine};
use crate::error::{CliError, CliResult};
use crate::types::{ParsedValue, Value};

const CMD_PREFIX: &str = "cmd:";

#[derive(Debug, Clone, Default)]
struct MockContext {
    commands: Vec<String>,
    values: Vec<(String, String)>,
}

/// Mock parsing engine.
///
/// Clones share their state, so a test can keep a handle on the engine
/// after handing it to the CLI.
#[derive(Clone)]
pub struct MockEngine {
    name: String,
    tree: Arc<RwLock<CommandTree>>,
    preset: Arc<RwLock<Option<MockContext>>>,
    context_parses: Arc<AtomicUsize>,
    parses: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new(app_name: impl Into<String>) -> Self {
        let name = app_name.into();
        Self {
            tree: Arc::new(RwLock::new(CommandTree::new(&name))),
            name,
            preset: Arc::new(RwLock::new(None)),
            context_parses: Arc::new(AtomicUsize::new(0)),
            parses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start a new, empty preset context.
    pub fn new_context(&self) -> &Self {
        *self.preset.write() = Some(MockContext::default());
        self
    }

    /// Select the command chain of the preset context.
    pub fn set_context(&self, commands: &[&str]) -> CliResult<&Self> {
        let path = CommandPath::new(commands.iter().copied());
        if !self.tree.read().has_command(&path) {
            return Err(CliError::CommandNotFound(path.to_string()));
        }
        let mut preset = self.preset.write();
        preset.get_or_insert_with(MockContext::default).commands =
            commands.iter().map(|c| c.to_string()).collect();
        Ok(self)
    }

    /// Add a parameter value to the preset context.
    pub fn set_context_value(&self, name: &str, value: &str) -> CliResult<&Self> {
        let mut preset = self.preset.write();
        let ctx = preset
            .as_mut()
            .ok_or_else(|| CliError::Internal("no context to set values on".to_string()))?;
        ctx.values.push((name.to_string(), value.to_string()));
        Ok(self)
    }

    pub fn clear_context(&self) {
        *self.preset.write() = None;
    }

    /// Flag declared on the command `path`, if any.
    pub fn get_flag(&self, path: &[&str], name: &str) -> Option<ParamSpec> {
        let path = CommandPath::new(path.iter().copied());
        self.tree.read().node(&path)?.flag(name).cloned()
    }

    /// Positional argument declared on the command `path`, if any.
    pub fn get_arg(&self, path: &[&str], name: &str) -> Option<ParamSpec> {
        let path = CommandPath::new(path.iter().copied());
        self.tree.read().node(&path)?.arg(name).cloned()
    }

    /// Names of the flags declared on the command `path`.
    pub fn list_of(&self, path: &[&str]) -> Vec<String> {
        let path = CommandPath::new(path.iter().copied());
        self.tree
            .read()
            .node(&path)
            .map(|n| n.flags.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn context_parse_count(&self) -> usize {
        self.context_parses.load(Ordering::SeqCst)
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    fn script(&self, args: &[String], strict: bool) -> CliResult<MockContext> {
        if args.is_empty() {
            return Ok(self.preset.read().clone().unwrap_or_default());
        }

        let mut script = MockContext::default();
        let mut tokens = args.iter();
        while let Some(token) = tokens.next() {
            if let Some(cmd) = token.strip_prefix(CMD_PREFIX) {
                script.commands.push(cmd.to_string());
                continue;
            }
            match tokens.next() {
                Some(value) => script.values.push((token.clone(), value.clone())),
                None if strict => {
                    return Err(CliError::Usage(format!("expected a value for '{}'", token)))
                }
                None => debug!("Mock context: '{}' has no value. Ignored.", token),
            }
        }
        Ok(script)
    }

    fn resolve(&self, args: &[String], strict: bool) -> CliResult<ParseContext> {
        let script = self.script(args, strict)?;
        let tree = self.tree.read();

        let mut path = CommandPath::root();
        for name in &script.commands {
            let next = path.child(name.as_str());
            if !tree.has_command(&next) {
                if strict {
                    return Err(CliError::Usage(format!("unknown command '{}'", next)));
                }
                break;
            }
            path = next;
        }

        let mut ctx = ParseContext::new(path.clone());
        let params = tree.chain_params(&path);
        for (name, raw) in &script.values {
            match params.get(name) {
                Some((command, spec)) => {
                    let value = ParsedValue::explicit(Value::parse(spec.value_type, raw));
                    match spec.kind {
                        ParamKind::Flag => ctx.insert_flag_at(command, name.as_str(), value),
                        ParamKind::Arg => ctx.insert_arg_at(command, name.as_str(), value),
                    }
                }
                None if strict => {
                    return Err(CliError::Usage(format!("unknown flag --{}", name)));
                }
                None => debug!("Mock context: unknown parameter '{}'. Ignored.", name),
            }
        }
        tree.apply_defaults(&mut ctx);

        if strict {
            let missing = tree.missing_required(&ctx);
            if !missing.is_empty() {
                return Err(CliError::Usage(format!(
                    "required flag(s) {} not provided",
                    missing.join(", ")
                )));
            }
        }
        Ok(ctx)
    }
}

impl ParseEngine for MockEngine {
    fn app_name(&self) -> &str {
        &self.name
    }

    fn add_command(&mut self, parent: &CommandPath, name: &str, help: &str) -> CliResult<CommandPath> {
        self.tree.write().add_command(parent, name, help)
    }

    fn add_param(&mut self, command: &CommandPath, spec: ParamSpec) -> CliResult<()> {
        self.tree.write().add_param(command, spec)
    }

    fn has_command(&self, command: &CommandPath) -> bool {
        self.tree.read().has_command(command)
    }

    fn has_flag(&self, command: &CommandPath, name: &str) -> bool {
        self.tree.read().has_flag(command, name)
    }

    fn has_arg(&self, command: &CommandPath, name: &str) -> bool {
        self.tree.read().has_arg(command, name)
    }

    fn parse_context(&mut self, args: &[String]) -> ParseContext {
        self.context_parses.fetch_add(1, Ordering::SeqCst);
        self.resolve(args, false).unwrap_or_default()
    }

    fn parse(&mut self, args: &[String]) -> CliResult<ParseContext> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.resolve(args, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::opts;
    use crate::types::ValueType;

    fn engine() -> MockEngine {
        let mut engine = MockEngine::new("Application");
        let update = engine
            .add_command(&CommandPath::root(), "update", "update")
            .unwrap();
        let test = engine.add_command(&update, "test", "update test").unwrap();
        engine
            .add_param(&test, ParamSpec::flag("flag", "flag help", ValueType::String))
            .unwrap();
        engine
            .add_param(
                &test,
                ParamSpec::flag("flag2", "flag2 help", ValueType::String)
                    .with_options(opts().with_default("def")),
            )
            .unwrap();
        engine
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preset_context() {
        let mut engine = engine();
        engine.new_context();
        engine.set_context(&["update", "test"]).unwrap();
        engine.set_context_value("flag", "flag value").unwrap();

        let ctx = engine.parse_context(&[]);
        assert_eq!(ctx.selected_commands().len(), 2);
        assert_eq!(ctx.flag("flag").unwrap().value, Value::from("flag value"));
        assert!(ctx.flag("flag2").unwrap().is_default());
        assert_eq!(engine.context_parse_count(), 1);
    }

    #[test]
    fn test_set_context_unknown_command() {
        let engine = engine();
        assert!(engine.set_context(&["delete"]).is_err());
    }

    #[test]
    fn test_cmd_protocol() {
        let mut engine = engine();
        let ctx = engine
            .parse(&args(&["cmd:update", "cmd:test", "flag", "x"]))
            .unwrap();
        assert_eq!(ctx.selected_commands(), &CommandPath::new(["update", "test"]));
        assert_eq!(ctx.flag("flag").unwrap().value, Value::from("x"));
    }

    #[test]
    fn test_strict_rejects_unknown_flag() {
        let mut engine = engine();
        let parsed = engine.parse(&args(&["cmd:update", "cmd:test", "other", "x"]));
        assert!(matches!(parsed, Err(CliError::Usage(_))));

        let lenient = engine.parse_context(&args(&["cmd:update", "cmd:test", "other", "x"]));
        assert!(lenient.flag("other").is_none());
        assert_eq!(lenient.selected_commands().len(), 2);
    }

    #[test]
    fn test_clone_shares_state() {
        let mut engine = engine();
        let handle = engine.clone();
        engine
            .add_param(
                &CommandPath::new(["update"]),
                ParamSpec::flag("tests", "", ValueType::String),
            )
            .unwrap();
        assert!(handle.get_flag(&["update"], "tests").is_some());
        assert_eq!(handle.list_of(&["update"]), vec!["tests".to_string()]);
    }
}
