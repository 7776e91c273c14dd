//! Command registry shared by the parsing engines.

use std::collections::HashMap;

use tracing::debug;

use super::{CommandPath, ParamKind, ParamSpec, ParseContext};
use crate::error::{CliError, CliResult};
use crate::types::{ParsedValue, Value, ValueSource};

/// One command and what it declares.
#[derive(Debug, Clone, Default)]
pub struct CommandNode {
    pub name: String,
    pub help: String,
    pub flags: Vec<ParamSpec>,
    pub args: Vec<ParamSpec>,
    pub children: Vec<CommandNode>,
}

impl CommandNode {
    fn new(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            ..Self::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut CommandNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn flag(&self, name: &str) -> Option<&ParamSpec> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn arg(&self, name: &str) -> Option<&ParamSpec> {
        self.args.iter().find(|a| a.name == name)
    }

    fn upsert(&mut self, spec: ParamSpec) {
        let list = match spec.kind {
            ParamKind::Flag => &mut self.flags,
            ParamKind::Arg => &mut self.args,
        };
        match list.iter_mut().find(|p| p.name == spec.name) {
            Some(existing) => *existing = spec,
            None => list.push(spec),
        }
    }
}

/// Tree of commands rooted at the application.
#[derive(Debug, Clone)]
pub struct CommandTree {
    root: CommandNode,
}

impl CommandTree {
    pub fn new(app_name: &str) -> Self {
        Self {
            root: CommandNode::new(app_name, ""),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.root.name
    }

    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    pub fn set_help(&mut self, help: &str) {
        self.root.help = help.to_string();
    }

    pub fn node(&self, path: &CommandPath) -> Option<&CommandNode> {
        let mut node = &self.root;
        for name in path.names() {
            node = node.child(name)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &CommandPath) -> Option<&mut CommandNode> {
        let mut node = &mut self.root;
        for name in path.names() {
            node = node.child_mut(name)?;
        }
        Some(node)
    }

    pub fn add_command(
        &mut self,
        parent: &CommandPath,
        name: &str,
        help: &str,
    ) -> CliResult<CommandPath> {
        let node = self
            .node_mut(parent)
            .ok_or_else(|| CliError::CommandNotFound(parent.to_string()))?;

        match node.child_mut(name) {
            Some(existing) => existing.help = help.to_string(),
            None => {
                debug!("Command '{} {}' added", parent, name);
                node.children.push(CommandNode::new(name, help));
            }
        }
        Ok(parent.child(name))
    }

    pub fn add_param(&mut self, command: &CommandPath, spec: ParamSpec) -> CliResult<()> {
        let node = self
            .node_mut(command)
            .ok_or_else(|| CliError::CommandNotFound(command.to_string()))?;
        node.upsert(spec);
        Ok(())
    }

    pub fn has_command(&self, command: &CommandPath) -> bool {
        self.node(command).is_some()
    }

    pub fn has_flag(&self, command: &CommandPath, name: &str) -> bool {
        self.node(command).and_then(|n| n.flag(name)).is_some()
    }

    pub fn has_arg(&self, command: &CommandPath, name: &str) -> bool {
        self.node(command).and_then(|n| n.arg(name)).is_some()
    }

    /// Nodes from the root down to the last selected command, with their path.
    ///
    /// Stops at the first unknown name.
    pub fn chain(&self, selected: &CommandPath) -> Vec<(CommandPath, &CommandNode)> {
        let mut path = CommandPath::root();
        let mut nodes = vec![(path.clone(), &self.root)];
        let mut node = &self.root;
        for name in selected.names() {
            match node.child(name) {
                Some(child) => {
                    path.push(name.as_str());
                    nodes.push((path.clone(), child));
                    node = child;
                }
                None => break,
            }
        }
        nodes
    }

    /// Fill unset parameters of the selected chain from env vars and defaults.
    pub fn apply_defaults(&self, ctx: &mut ParseContext) {
        let chain = self.chain(ctx.selected_commands());
        for (path, node) in chain {
            for spec in node.flags.iter().chain(node.args.iter()) {
                if ctx.value_at(&path, spec.kind, &spec.name).is_some() {
                    continue;
                }
                if let Some(value) = fallback_value(spec) {
                    match spec.kind {
                        ParamKind::Flag => ctx.insert_flag_at(&path, &spec.name, value),
                        ParamKind::Arg => ctx.insert_arg_at(&path, &spec.name, value),
                    }
                }
            }
        }
    }

    /// Names of required parameters missing from `ctx`, as `--flag` or `<arg>`.
    pub fn missing_required(&self, ctx: &ParseContext) -> Vec<String> {
        let mut missing = Vec::new();
        for (path, node) in self.chain(ctx.selected_commands()) {
            for spec in node.flags.iter().chain(node.args.iter()) {
                if spec.options.is_required() && ctx.value_at(&path, spec.kind, &spec.name).is_none() {
                    missing.push(match spec.kind {
                        ParamKind::Flag => format!("--{}", spec.name),
                        ParamKind::Arg => format!("<{}>", spec.name),
                    });
                }
            }
        }
        missing
    }

    /// Parameter specs declared along the selected chain, by name, with the
    /// command declaring them. The deepest command wins on a name clash.
    pub fn chain_params(&self, selected: &CommandPath) -> HashMap<String, (CommandPath, ParamSpec)> {
        let mut params = HashMap::new();
        for (path, node) in self.chain(selected) {
            for spec in node.flags.iter().chain(node.args.iter()) {
                params.insert(spec.name.clone(), (path.clone(), spec.clone()));
            }
        }
        params
    }
}

fn fallback_value(spec: &ParamSpec) -> Option<ParsedValue> {
    if let Some(var) = &spec.options.envar {
        if let Ok(raw) = std::env::var(var) {
            return Some(ParsedValue {
                value: Value::parse(spec.value_type, &raw),
                source: ValueSource::Env,
            });
        }
    }
    spec.options
        .default_for(spec.value_type)
        .map(ParsedValue::default_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::opts;
    use crate::types::ValueType;

    fn tree() -> CommandTree {
        let mut tree = CommandTree::new("app");
        let create = tree
            .add_command(&CommandPath::root(), "create", "create things")
            .unwrap();
        tree.add_command(&create, "repo", "create a repo").unwrap();
        tree
    }

    #[test]
    fn test_add_command_is_idempotent() {
        let mut tree = tree();
        let create = CommandPath::new(["create"]);
        tree.add_param(&create, ParamSpec::flag("a", "", ValueType::String))
            .unwrap();

        tree.add_command(&CommandPath::root(), "create", "new help")
            .unwrap();

        let node = tree.node(&create).unwrap();
        assert_eq!(node.help, "new help");
        assert!(node.flag("a").is_some());
        assert!(node.child("repo").is_some());
    }

    #[test]
    fn test_add_param_unknown_command() {
        let mut tree = tree();
        let result = tree.add_param(
            &CommandPath::new(["delete"]),
            ParamSpec::flag("a", "", ValueType::String),
        );
        assert!(matches!(result, Err(CliError::CommandNotFound(_))));
    }

    #[test]
    fn test_upsert_replaces_spec() {
        let mut tree = tree();
        let repo = CommandPath::new(["create", "repo"]);
        tree.add_param(&repo, ParamSpec::flag("name", "old", ValueType::String))
            .unwrap();
        tree.add_param(&repo, ParamSpec::flag("name", "new", ValueType::String))
            .unwrap();

        let node = tree.node(&repo).unwrap();
        assert_eq!(node.flags.len(), 1);
        assert_eq!(node.flags[0].help, "new");
    }

    #[test]
    fn test_defaults_and_required() {
        let mut tree = tree();
        let repo = CommandPath::new(["create", "repo"]);
        tree.add_param(
            &repo,
            ParamSpec::flag("title", "", ValueType::String).with_options(opts().with_default("none")),
        )
        .unwrap();
        tree.add_param(
            &repo,
            ParamSpec::flag("name", "", ValueType::String).with_options(opts().required()),
        )
        .unwrap();

        let mut ctx = ParseContext::new(repo.clone());
        tree.apply_defaults(&mut ctx);

        assert!(ctx.flag("title").unwrap().is_default());
        assert_eq!(tree.missing_required(&ctx), vec!["--name".to_string()]);
    }

    #[test]
    fn test_same_name_on_two_commands() {
        let mut tree = tree();
        let create = CommandPath::new(["create"]);
        let repo = CommandPath::new(["create", "repo"]);
        tree.add_param(
            &create,
            ParamSpec::flag("name", "", ValueType::String).with_options(opts().required()),
        )
        .unwrap();
        tree.add_param(&repo, ParamSpec::flag("name", "", ValueType::String))
            .unwrap();

        let mut ctx = ParseContext::new(repo.clone());
        ctx.insert_flag("name", ParsedValue::explicit("x"));
        assert_eq!(tree.missing_required(&ctx), vec!["--name".to_string()]);
        assert_eq!(tree.chain_params(&repo)["name"].0, repo);
    }
}
