//! Running an invocation through a table of hooks.

use crate::{CliResult, CommandTree, HelpHook, Hook, Invocation, NodeId, Response};

/// Source of the hooks run for each node.
///
/// [`CommandTree`] answers with the hooks the nodes were built with. Other
/// implementations can substitute wrapped hooks per node without touching
/// the tree itself.
pub trait HookTable {
    fn pre_run(&self, node: NodeId) -> Option<Hook>;

    fn post_run(&self, node: NodeId) -> Option<Hook>;

    fn help(&self, node: NodeId) -> Option<HelpHook>;
}

impl HookTable for CommandTree {
    fn pre_run(&self, node: NodeId) -> Option<Hook> {
        self.get(node)?.hooks().pre_run.clone()
    }

    fn post_run(&self, node: NodeId) -> Option<Hook> {
        self.get(node)?.hooks().post_run.clone()
    }

    fn help(&self, node: NodeId) -> Option<HelpHook> {
        self.get(node)?.hooks().help.clone()
    }
}

impl CommandTree {
    /// Parse and run `args` with the tree's own hooks.
    pub fn execute<I, S>(&self, args: I) -> CliResult<Response>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_with(self, args)
    }

    /// Parse and run `args` with hooks taken from `hooks`.
    pub fn execute_with<I, S>(&self, hooks: &dyn HookTable, args: I) -> CliResult<Response>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.parse(args)?;
        self.dispatch(hooks, &invocation)
    }

    /// Run an already resolved invocation.
    ///
    /// Help short-circuits everything else. Otherwise the order is pre-run,
    /// handler, post-run; the first error stops the chain and is returned.
    /// A node without a handler prints its help.
    pub fn dispatch(&self, hooks: &dyn HookTable, invocation: &Invocation) -> CliResult<Response> {
        let node = invocation.node();

        if invocation.is_help() {
            return Ok(match hooks.help(node) {
                Some(help) => help(invocation),
                None => Response::text(self.render_help(node)),
            });
        }

        if let Some(pre_run) = hooks.pre_run(node) {
            pre_run(invocation)?;
        }

        let response = match &self.node(node).hooks().run {
            Some(run) => run(invocation)?,
            None => Response::text(self.render_help(node)),
        };

        if let Some(post_run) = hooks.post_run(node) {
            post_run(invocation)?;
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CliError, Command, Output};
    use std::sync::{Arc, Mutex};

    fn traced_tree(log: Arc<Mutex<Vec<&'static str>>>, fail_pre: bool) -> CommandTree {
        let pre = Arc::clone(&log);
        let run = Arc::clone(&log);
        let post = Arc::clone(&log);
        CommandTree::new(
            Command::new("app").subcommand(
                Command::new("task")
                    .pre_run(move |_| {
                        pre.lock().unwrap().push("pre");
                        if fail_pre {
                            return Err(CliError::user("not allowed"));
                        }
                        Ok(())
                    })
                    .run(move |_| {
                        run.lock().unwrap().push("run");
                        Ok("done")
                    })
                    .post_run(move |_| {
                        post.lock().unwrap().push("post");
                        Ok(())
                    }),
            ),
        )
    }

    #[test]
    fn test_hook_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tree = traced_tree(Arc::clone(&log), false);

        let response = tree.execute(["task"]).unwrap();
        assert_eq!(response.output, Output::Text("done".into()));
        assert_eq!(*log.lock().unwrap(), vec!["pre", "run", "post"]);
    }

    #[test]
    fn test_pre_run_error_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tree = traced_tree(Arc::clone(&log), true);

        let err = tree.execute(["task"]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["pre"]);
    }

    #[test]
    fn test_help_skips_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tree = traced_tree(Arc::clone(&log), false);

        let response = tree.execute(["task", "--help"]).unwrap();
        assert!(response.output.to_string().contains("Usage:"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_custom_help_hook() {
        let tree = CommandTree::new(
            Command::new("app").help(|inv| Response::text(format!("help for {}", inv.name()))),
        );
        let response = tree.execute(["help"]).unwrap();
        assert_eq!(response.output, Output::Text("help for app".into()));
    }

    #[test]
    fn test_node_without_handler_prints_help() {
        let tree = CommandTree::new(Command::new("app").subcommand(Command::new("child")));
        let response = tree.execute(Vec::<String>::new()).unwrap();
        assert!(response.output.to_string().contains("child"));
    }
}
