//! Command tree: builder, arena storage and node addressing.

use std::fmt;
use std::sync::Arc;

use crate::{CliResult, IntoResponse, Invocation, Response};

/// Pre-run / post-run hook.
pub type Hook = Arc<dyn Fn(&Invocation) -> CliResult<()> + Send + Sync>;

/// Run handler for a node.
pub type Handler = Arc<dyn Fn(&Invocation) -> CliResult<Response> + Send + Sync>;

/// Help renderer for a node.
pub type HelpHook = Arc<dyn Fn(&Invocation) -> Response + Send + Sync>;

/// Identity of a node inside one [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A flag a command declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub short: Option<char>,
    pub takes_value: bool,
    pub about: String,
}

impl FlagSpec {
    /// Boolean flag (`--name`).
    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            takes_value: false,
            about: String::new(),
        }
    }

    /// Flag carrying a value (`--name value` or `--name=value`).
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            takes_value: true,
            ..Self::switch(name)
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }
}

/// Hooks attached to a node.
#[derive(Clone, Default)]
pub struct NodeHooks {
    pub pre_run: Option<Hook>,
    pub run: Option<Handler>,
    pub post_run: Option<Hook>,
    pub help: Option<HelpHook>,
}

impl fmt::Debug for NodeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHooks")
            .field("pre_run", &self.pre_run.is_some())
            .field("run", &self.run.is_some())
            .field("post_run", &self.post_run.is_some())
            .field("help", &self.help.is_some())
            .finish()
    }
}

/// Builder for one command and its subcommands.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    about: String,
    flags: Vec<FlagSpec>,
    children: Vec<Command>,
    hooks: NodeHooks,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: String::new(),
            flags: Vec::new(),
            children: Vec::new(),
            hooks: NodeHooks::default(),
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }

    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn subcommand(mut self, child: Command) -> Self {
        self.children.push(child);
        self
    }

    /// Hook run before the handler; an error stops execution.
    pub fn pre_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation) -> CliResult<()> + Send + Sync + 'static,
    {
        self.hooks.pre_run = Some(Arc::new(hook));
        self
    }

    pub fn run<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&Invocation) -> CliResult<R> + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.hooks.run = Some(Arc::new(move |inv: &Invocation| {
            handler(inv).map(IntoResponse::into_response)
        }));
        self
    }

    /// Hook run after a successful handler.
    pub fn post_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation) -> CliResult<()> + Send + Sync + 'static,
    {
        self.hooks.post_run = Some(Arc::new(hook));
        self
    }

    /// Replace the default help renderer.
    pub fn help<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation) -> Response + Send + Sync + 'static,
    {
        self.hooks.help = Some(Arc::new(hook));
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }
}

/// A node stored in the tree.
#[derive(Debug)]
pub struct Node {
    name: String,
    about: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    flags: Vec<FlagSpec>,
    hooks: NodeHooks,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about(&self) -> &str {
        &self.about
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn flags(&self) -> &[FlagSpec] {
        &self.flags
    }

    pub fn hooks(&self) -> &NodeHooks {
        &self.hooks
    }
}

/// Immutable command tree.
///
/// Nodes live in an arena in pre-order; the root is always the first node.
/// Parents are stored as ids, so a node never owns its ancestors.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<Node>,
}

impl CommandTree {
    pub fn new(root: Command) -> Self {
        let mut nodes = Vec::new();
        Self::insert(&mut nodes, root, None);
        Self { nodes }
    }

    fn insert(nodes: &mut Vec<Node>, command: Command, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(nodes.len());
        nodes.push(Node {
            name: command.name,
            about: command.about,
            parent,
            children: Vec::with_capacity(command.children.len()),
            flags: command.flags,
            hooks: command.hooks,
        });
        for child in command.children {
            let child_id = Self::insert(nodes, child, Some(id));
            nodes[id.0].children.push(child_id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_name(&self) -> &str {
        &self.nodes[0].name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Every node, root first, parents before children.
    pub fn walk(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.name(*child) == name)
    }

    /// Names from the root down to `id`, root included.
    pub fn command_path(&self, id: NodeId) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            path.push(self.name(node));
            current = self.parent(node);
        }
        path.reverse();
        path
    }

    /// Flag declared on `id` or any of its ancestors.
    pub fn find_flag(&self, id: NodeId, name: &str) -> Option<&FlagSpec> {
        self.find_flag_by(id, |flag| flag.name == name)
    }

    pub fn find_short_flag(&self, id: NodeId, short: char) -> Option<&FlagSpec> {
        self.find_flag_by(id, |flag| flag.short == Some(short))
    }

    fn find_flag_by(&self, id: NodeId, pred: impl Fn(&FlagSpec) -> bool) -> Option<&FlagSpec> {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(flag) = self.node(node).flags.iter().find(|f| pred(f)) {
                return Some(flag);
            }
            current = self.parent(node);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandTree {
        CommandTree::new(
            Command::new("myapp")
                .flag(FlagSpec::switch("verbose").short('v'))
                .subcommand(
                    Command::new("sub1")
                        .subcommand(Command::new("sub2").flag(FlagSpec::value("output"))),
                )
                .subcommand(Command::new("other")),
        )
    }

    #[test]
    fn test_root_is_first_node() {
        let tree = sample();
        assert_eq!(tree.root_name(), "myapp");
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_walk_is_pre_order() {
        let tree = sample();
        let names: Vec<_> = tree.walk().map(|id| tree.name(id)).collect();
        assert_eq!(names, vec!["myapp", "sub1", "sub2", "other"]);
    }

    #[test]
    fn test_command_path() {
        let tree = sample();
        let sub1 = tree.find_child(tree.root(), "sub1").unwrap();
        let sub2 = tree.find_child(sub1, "sub2").unwrap();
        assert_eq!(tree.command_path(sub2), vec!["myapp", "sub1", "sub2"]);
        assert_eq!(tree.command_path(tree.root()), vec!["myapp"]);
    }

    #[test]
    fn test_flags_are_inherited() {
        let tree = sample();
        let sub1 = tree.find_child(tree.root(), "sub1").unwrap();
        let sub2 = tree.find_child(sub1, "sub2").unwrap();
        assert!(tree.find_flag(sub2, "verbose").is_some());
        assert!(tree.find_short_flag(sub2, 'v').is_some());
        assert!(tree.find_flag(tree.root(), "output").is_none());
    }
}
