//! Production engine over the clap builder API.

use clap::error::ErrorKind;
use clap::parser::ValueSource as ClapSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use super::tree::{CommandNode, CommandTree};
use super::{CommandPath, ParamSpec, ParseContext, ParseEngine};
use crate::error::{CliError, CliResult};
use crate::types::{ParsedValue, Value, ValueSource};

/// Engine building a fresh `clap::Command` from the registry on every parse.
///
/// The schema keeps changing during context discovery, so nothing is cached.
#[derive(Debug, Clone)]
pub struct ClapEngine {
    tree: CommandTree,
    version: Option<String>,
}

impl ClapEngine {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            tree: CommandTree::new(&app_name.into()),
            version: None,
        }
    }

    pub fn with_about(mut self, about: &str) -> Self {
        self.tree.set_help(about);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// The clap command for the current schema.
    pub fn command(&self, lenient: bool) -> Command {
        let mut cmd = build_command(self.tree.root(), lenient);
        if let Some(version) = &self.version {
            cmd = cmd.version(version.clone());
        }
        cmd
    }

    fn matches(&self, args: &[String], lenient: bool) -> Result<ArgMatches, clap::Error> {
        let argv = std::iter::once(self.tree.app_name().to_string()).chain(args.iter().cloned());
        self.command(lenient).try_get_matches_from(argv)
    }
}

impl ParseEngine for ClapEngine {
    fn app_name(&self) -> &str {
        self.tree.app_name()
    }

    fn add_command(&mut self, parent: &CommandPath, name: &str, help: &str) -> CliResult<CommandPath> {
        self.tree.add_command(parent, name, help)
    }

    fn add_param(&mut self, command: &CommandPath, spec: ParamSpec) -> CliResult<()> {
        self.tree.add_param(command, spec)
    }

    fn has_command(&self, command: &CommandPath) -> bool {
        self.tree.has_command(command)
    }

    fn has_flag(&self, command: &CommandPath, name: &str) -> bool {
        self.tree.has_flag(command, name)
    }

    fn has_arg(&self, command: &CommandPath, name: &str) -> bool {
        self.tree.has_arg(command, name)
    }

    fn parse_context(&mut self, args: &[String]) -> ParseContext {
        match self.matches(args, true) {
            Ok(matches) => collect(&self.tree, &matches),
            Err(e) => {
                debug!("Context parse ignored: {}", e.kind());
                ParseContext::default()
            }
        }
    }

    fn parse(&mut self, args: &[String]) -> CliResult<ParseContext> {
        match self.matches(args, false) {
            Ok(matches) => Ok(collect(&self.tree, &matches)),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    Err(CliError::Help(e.render().to_string()))
                }
                _ => Err(CliError::Usage(e.render().to_string())),
            },
        }
    }
}

fn build_command(node: &CommandNode, lenient: bool) -> Command {
    let mut cmd = Command::new(node.name.clone()).about(node.help.clone());
    if lenient {
        cmd = cmd.ignore_errors(true);
    }
    for spec in &node.flags {
        cmd = cmd.arg(build_flag(spec, lenient));
    }
    for (index, spec) in node.args.iter().enumerate() {
        cmd = cmd.arg(build_positional(spec, index + 1, lenient));
    }
    for child in &node.children {
        cmd = cmd.subcommand(build_command(child, lenient));
    }
    cmd
}

fn build_flag(spec: &ParamSpec, lenient: bool) -> Arg {
    let mut arg = Arg::new(spec.name.clone())
        .long(spec.name.clone())
        .help(spec.help.clone());

    arg = if spec.value_type.is_switch() {
        arg.action(ArgAction::SetTrue)
    } else {
        arg.action(ArgAction::Set).num_args(1)
    };
    if let Some(short) = spec.options.short {
        arg = arg.short(short);
    }
    if spec.options.is_hidden() {
        arg = arg.hide(true);
    }
    apply_value_options(arg, spec, lenient)
}

fn build_positional(spec: &ParamSpec, index: usize, lenient: bool) -> Arg {
    let arg = Arg::new(spec.name.clone())
        .help(spec.help.clone())
        .index(index)
        .action(ArgAction::Set);
    apply_value_options(arg, spec, lenient)
}

fn apply_value_options(mut arg: Arg, spec: &ParamSpec, lenient: bool) -> Arg {
    if let Some(default) = &spec.options.default {
        arg = arg.default_value(default.clone());
    }
    if let Some(envar) = &spec.options.envar {
        arg = arg.env(envar.clone());
    }
    if spec.options.is_required() && !lenient {
        arg = arg.required(true);
    }
    arg
}

fn collect(tree: &CommandTree, matches: &ArgMatches) -> ParseContext {
    let mut ctx = ParseContext::default();
    let mut path = CommandPath::root();
    let mut node = tree.root();
    let mut current = matches;

    loop {
        read_params(&path, node, current, &mut ctx);
        let Some((name, sub)) = current.subcommand() else {
            break;
        };
        let Some(child) = node.child(name) else {
            break;
        };
        ctx.push_command(name);
        path.push(name);
        node = child;
        current = sub;
    }
    ctx
}

fn read_params(path: &CommandPath, node: &CommandNode, matches: &ArgMatches, ctx: &mut ParseContext) {
    for spec in &node.flags {
        if let Some(value) = read_value(spec, matches) {
            ctx.insert_flag_at(path, &spec.name, value);
        }
    }
    for spec in &node.args {
        if let Some(value) = read_value(spec, matches) {
            ctx.insert_arg_at(path, &spec.name, value);
        }
    }
}

fn read_value(spec: &ParamSpec, matches: &ArgMatches) -> Option<ParsedValue> {
    let source = match matches.value_source(&spec.name)? {
        ClapSource::DefaultValue => ValueSource::Default,
        ClapSource::EnvVariable => ValueSource::Env,
        _ => ValueSource::CommandLine,
    };

    let value = if spec.value_type.is_switch() {
        // An unset switch still reports `false` as its default.
        if source == ValueSource::Default && spec.options.default.is_none() {
            return None;
        }
        Value::Bool(matches.get_flag(&spec.name))
    } else {
        Value::String(matches.get_one::<String>(&spec.name)?.clone())
    };
    Some(ParsedValue { value, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParamKind;
    use crate::options::opts;
    use crate::types::ValueType;

    fn engine() -> ClapEngine {
        let mut engine = ClapEngine::new("forjj");
        let create = engine
            .add_command(&CommandPath::root(), "create", "create things")
            .unwrap();
        let repo = engine.add_command(&create, "repo", "create a repo").unwrap();
        engine
            .add_param(&repo, ParamSpec::flag("name", "repo name", ValueType::String).with_options(opts().required()))
            .unwrap();
        engine
            .add_param(
                &repo,
                ParamSpec::flag("title", "repo title", ValueType::String)
                    .with_options(opts().with_default("no title")),
            )
            .unwrap();
        engine
            .add_param(&repo, ParamSpec::flag("force", "force", ValueType::Bool))
            .unwrap();
        engine
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_values_and_sources() {
        let mut engine = engine();
        let ctx = engine
            .parse(&args(&["create", "repo", "--name", "infra", "--force"]))
            .unwrap();

        assert_eq!(ctx.selected_commands(), &CommandPath::new(["create", "repo"]));
        assert_eq!(ctx.flag("name").unwrap().value, Value::from("infra"));
        assert!(!ctx.flag("name").unwrap().is_default());
        assert!(ctx.flag("title").unwrap().is_default());
        assert_eq!(ctx.flag("force").unwrap().value, Value::Bool(true));
    }

    #[test]
    fn test_parse_missing_required_fails() {
        let mut engine = engine();
        let result = engine.parse(&args(&["create", "repo"]));
        assert!(matches!(result, Err(CliError::Usage(_))));
    }

    #[test]
    fn test_parse_context_is_lenient() {
        let mut engine = engine();

        let ctx = engine.parse_context(&args(&["create", "repo", "--title", "x"]));
        assert_eq!(ctx.selected_commands().len(), 2);
        assert_eq!(ctx.flag("title").unwrap().value, Value::from("x"));
        assert!(ctx.flag("force").is_none());
    }

    #[test]
    fn test_positional_arg() {
        let mut engine = engine();
        let repos = engine
            .add_command(&CommandPath::new(["create"]), "repos", "create repos")
            .unwrap();
        engine
            .add_param(&repos, ParamSpec::arg("repos", "list", ValueType::List))
            .unwrap();

        let ctx = engine.parse(&args(&["create", "repos", "a,b"])).unwrap();
        assert_eq!(ctx.arg("repos").unwrap().value, Value::from("a,b"));
    }

    #[test]
    fn test_same_flag_on_parent_and_child() {
        let mut engine = engine();
        let create = CommandPath::new(["create"]);
        let repo = CommandPath::new(["create", "repo"]);
        engine
            .add_param(&create, ParamSpec::flag("name", "outer name", ValueType::String))
            .unwrap();

        let ctx = engine
            .parse(&args(&["create", "--name", "outer", "repo", "--name", "inner"]))
            .unwrap();
        let name_at = |path: &CommandPath| {
            ctx.value_at(path, ParamKind::Flag, "name")
                .map(|v| v.value.clone())
        };
        assert_eq!(name_at(&create), Some(Value::from("outer")));
        assert_eq!(name_at(&repo), Some(Value::from("inner")));

        let ctx = engine
            .parse(&args(&["create", "repo", "--name", "inner"]))
            .unwrap();
        assert!(ctx.value_at(&create, ParamKind::Flag, "name").is_none());
    }
}
