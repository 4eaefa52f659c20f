//! Resolving a command line against a tree.

use std::collections::BTreeMap;

use crate::{CliResult, CommandTree, FlagSpec, NodeId, UserError};

/// A resolved command line: which node was hit and what was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    node: NodeId,
    path: Vec<String>,
    flags: BTreeMap<String, Option<String>>,
    args: Vec<String>,
    help: bool,
}

impl Invocation {
    /// Build an invocation directly, bypassing [`CommandTree::parse`].
    ///
    /// `path` is the list of command names from the root to the node.
    pub fn new(
        node: NodeId,
        path: Vec<String>,
        flags: BTreeMap<String, Option<String>>,
        args: Vec<String>,
        help: bool,
    ) -> Self {
        Self {
            node,
            path,
            flags,
            args,
            help,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Names from the root down to the invoked node, root included.
    pub fn command_path(&self) -> &[String] {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    pub fn root_name(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.path.len() <= 1
    }

    /// Names of the flags given on the command line, in name order.
    pub fn supplied_flags(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    pub fn is_present(&self, flag: &str) -> bool {
        self.flags.contains_key(flag)
    }

    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.flags.get(flag).and_then(|v| v.as_deref())
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_help(&self) -> bool {
        self.help
    }
}

impl CommandTree {
    /// Resolve `args` (program name excluded) into an [`Invocation`].
    pub fn parse<I, S>(&self, args: I) -> CliResult<Invocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = args.into_iter().map(Into::into);
        let mut node = self.root();
        let mut flags = BTreeMap::new();
        let mut positional = Vec::new();
        let mut help = false;

        while let Some(token) = tokens.next() {
            if token == "--" {
                positional.extend(tokens.by_ref());
                break;
            }
            if token == "--help" || token == "-h" {
                help = true;
                continue;
            }

            if let Some(long) = token.strip_prefix("--") {
                let (name, inline) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (long, None),
                };
                let spec = self
                    .find_flag(node, name)
                    .ok_or_else(|| self.unknown_flag(node, &token))?;
                let value = take_value(spec, inline, &mut tokens)?;
                flags.insert(spec.name.clone(), value);
                continue;
            }

            if let Some(shorts) = token.strip_prefix('-').filter(|s| !s.is_empty()) {
                for (at, short) in shorts.char_indices() {
                    let spec = self
                        .find_short_flag(node, short)
                        .ok_or_else(|| self.unknown_flag(node, &format!("-{short}")))?;
                    if spec.takes_value {
                        let rest = &shorts[at + short.len_utf8()..];
                        let inline = (!rest.is_empty()).then(|| rest.to_string());
                        let value = take_value(spec, inline, &mut tokens)?;
                        flags.insert(spec.name.clone(), value);
                        break;
                    }
                    flags.insert(spec.name.clone(), None);
                }
                continue;
            }

            if positional.is_empty() {
                if let Some(child) = self.find_child(node, &token) {
                    node = child;
                    continue;
                }
                if token == "help" && !help {
                    help = true;
                    continue;
                }
            }
            positional.push(token);
        }

        let path = self
            .command_path(node)
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(Invocation::new(node, path, flags, positional, help))
    }

    fn unknown_flag(&self, node: NodeId, flag: &str) -> UserError {
        UserError::UnknownFlag {
            flag: flag.to_string(),
            command: self.command_path(node).join(" "),
        }
    }
}

fn take_value(
    spec: &FlagSpec,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = String>,
) -> Result<Option<String>, UserError> {
    match (spec.takes_value, inline) {
        (true, Some(value)) => Ok(Some(value)),
        (true, None) => rest.next().map(Some).ok_or_else(|| UserError::MissingValue {
            flag: spec.name.clone(),
        }),
        (false, Some(_)) => Err(UserError::UnexpectedValue {
            flag: spec.name.clone(),
        }),
        (false, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CliError, Command};

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("myapp")
                .flag(FlagSpec::switch("debug").short('d'))
                .subcommand(
                    Command::new("sync")
                        .flag(FlagSpec::switch("force").short('f'))
                        .flag(FlagSpec::value("target").short('t'))
                        .subcommand(Command::new("remote")),
                ),
        )
    }

    #[test]
    fn test_empty_args_hit_root() {
        let inv = tree().parse(Vec::<String>::new()).unwrap();
        assert!(inv.is_root());
        assert_eq!(inv.name(), "myapp");
        assert_eq!(inv.supplied_flags().count(), 0);
    }

    #[test]
    fn test_subcommand_with_flags() {
        let inv = tree()
            .parse(["sync", "--force", "--target=prod", "file.txt"])
            .unwrap();
        assert_eq!(inv.command_path(), ["myapp", "sync"]);
        assert!(inv.is_present("force"));
        assert_eq!(inv.flag_value("target"), Some("prod"));
        assert_eq!(inv.args(), ["file.txt"]);
    }

    #[test]
    fn test_separate_value_and_short_cluster() {
        let inv = tree().parse(["sync", "-df", "--target", "dev"]).unwrap();
        assert!(inv.is_present("debug"));
        assert!(inv.is_present("force"));
        assert_eq!(inv.flag_value("target"), Some("dev"));

        let inv = tree().parse(["sync", "-tstaging"]).unwrap();
        assert_eq!(inv.flag_value("target"), Some("staging"));
    }

    #[test]
    fn test_nested_subcommand() {
        let inv = tree().parse(["sync", "remote"]).unwrap();
        assert_eq!(inv.command_path(), ["myapp", "sync", "remote"]);
    }

    #[test]
    fn test_help_forms() {
        assert!(tree().parse(["sync", "--help"]).unwrap().is_help());
        assert!(tree().parse(["-h"]).unwrap().is_help());

        let inv = tree().parse(["help", "sync"]).unwrap();
        assert!(inv.is_help());
        assert_eq!(inv.name(), "sync");
    }

    #[test]
    fn test_double_dash_stops_flag_parsing() {
        let inv = tree().parse(["sync", "--", "--force"]).unwrap();
        assert!(!inv.is_present("force"));
        assert_eq!(inv.args(), ["--force"]);
    }

    #[test]
    fn test_unknown_flag_is_user_error() {
        let err = tree().parse(["--force"]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(matches!(
            err,
            CliError::User(UserError::UnknownFlag { ref command, .. }) if command == "myapp"
        ));
    }

    #[test]
    fn test_missing_and_unexpected_values() {
        assert!(matches!(
            tree().parse(["sync", "--target"]).unwrap_err(),
            CliError::User(UserError::MissingValue { .. })
        ));
        assert!(matches!(
            tree().parse(["sync", "--force=yes"]).unwrap_err(),
            CliError::User(UserError::UnexpectedValue { .. })
        ));
    }
}
