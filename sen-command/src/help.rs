use std::fmt::Write;

use crate::{CommandTree, NodeId};

impl CommandTree {
    /// Default usage text for a node.
    pub fn render_help(&self, id: NodeId) -> String {
        let node = self.node(id);
        let path = self.command_path(id).join(" ");
        let mut out = String::new();

        if !node.about().is_empty() {
            let _ = writeln!(out, "{}\n", node.about());
        }

        let _ = writeln!(out, "Usage:");
        let _ = writeln!(out, "  {path} [flags]");
        if !node.children().is_empty() {
            let _ = writeln!(out, "  {path} [command]");
            let _ = writeln!(out, "\nAvailable Commands:");
            let width = node
                .children()
                .iter()
                .map(|c| self.name(*c).len())
                .max()
                .unwrap_or(0);
            for child in node.children() {
                let child = self.node(*child);
                let _ = writeln!(out, "  {:width$}  {}", child.name(), child.about());
            }
        }

        let _ = writeln!(out, "\nFlags:");
        let mut current = Some(id);
        while let Some(owner) = current {
            for flag in self.node(owner).flags() {
                let short = flag.short.map(|c| format!("-{c}, ")).unwrap_or_default();
                let value = if flag.takes_value { " <value>" } else { "" };
                let _ = writeln!(out, "  {short}--{}{value}  {}", flag.name, flag.about);
            }
            current = self.parent(owner);
        }
        let _ = writeln!(out, "  -h, --help  help for {}", node.name());

        out
    }
}
