//! Mirroring a clap command tree.
//!
//! Lets applications that already parse with clap reuse the hook machinery:
//! build the tree from the clap definition, let clap parse, then turn the
//! matches into an [`Invocation`].

use std::collections::BTreeMap;

use clap::parser::ValueSource;
use clap::ArgMatches;

use crate::{Command, CommandTree, FlagSpec, Invocation, NodeId};

impl Command {
    /// Mirror the names, flags and subcommands of a clap command.
    ///
    /// Positional arguments are skipped; hooks start empty.
    pub fn from_clap(cmd: &clap::Command) -> Self {
        let mut command = Command::new(cmd.get_name());
        if let Some(about) = cmd.get_about() {
            command = command.about(about.to_string());
        }
        for arg in cmd.get_arguments().filter(|a| !a.is_positional()) {
            let mut flag = if arg.get_action().takes_values() {
                FlagSpec::value(arg.get_id().as_str())
            } else {
                FlagSpec::switch(arg.get_id().as_str())
            };
            if let Some(short) = arg.get_short() {
                flag = flag.short(short);
            }
            if let Some(help) = arg.get_help() {
                flag = flag.about(help.to_string());
            }
            command = command.flag(flag);
        }
        for sub in cmd.get_subcommands() {
            command = command.subcommand(Command::from_clap(sub));
        }
        command
    }
}

impl CommandTree {
    /// Build an invocation from clap's parse result.
    ///
    /// Only arguments whose value came from the command line count as
    /// supplied; defaults and environment values do not.
    pub fn invocation_from_matches(&self, matches: &ArgMatches) -> Invocation {
        let mut node = self.root();
        let mut current = matches;
        let mut flags = BTreeMap::new();
        let mut args = Vec::new();

        loop {
            self.collect_supplied(node, current, &mut flags, &mut args);
            match current.subcommand() {
                Some((name, sub)) => match self.find_child(node, name) {
                    Some(child) => {
                        node = child;
                        current = sub;
                    }
                    None => break,
                },
                None => break,
            }
        }

        let path = self
            .command_path(node)
            .into_iter()
            .map(str::to_string)
            .collect();
        Invocation::new(node, path, flags, args, false)
    }

    fn collect_supplied(
        &self,
        node: NodeId,
        matches: &ArgMatches,
        flags: &mut BTreeMap<String, Option<String>>,
        args: &mut Vec<String>,
    ) {
        for id in matches.ids() {
            let id = id.as_str();
            if matches.value_source(id) != Some(ValueSource::CommandLine) {
                continue;
            }
            let mut values = matches
                .get_raw(id)
                .into_iter()
                .flatten()
                .map(|v| v.to_string_lossy().into_owned());
            if self.find_flag(node, id).is_some() {
                flags.insert(id.to_string(), values.next());
            } else {
                args.extend(values);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction};

    fn clap_app() -> clap::Command {
        clap::Command::new("myapp").subcommand(
            clap::Command::new("sync")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .short('f')
                        .action(ArgAction::SetTrue),
                )
                .arg(Arg::new("target").long("target").default_value("dev")),
        )
    }

    #[test]
    fn test_from_clap_mirrors_structure() {
        let tree = CommandTree::new(Command::from_clap(&clap_app()));
        let sync = tree.find_child(tree.root(), "sync").unwrap();
        assert_eq!(tree.find_flag(sync, "force").unwrap().short, Some('f'));
        assert!(tree.find_flag(sync, "target").unwrap().takes_value);
    }

    #[test]
    fn test_only_command_line_values_count() {
        let tree = CommandTree::new(Command::from_clap(&clap_app()));
        let matches = clap_app()
            .try_get_matches_from(["myapp", "sync", "--force"])
            .unwrap();
        let inv = tree.invocation_from_matches(&matches);

        assert_eq!(inv.command_path(), ["myapp", "sync"]);
        assert!(inv.is_present("force"));
        assert!(!inv.is_present("target"));
    }
}
