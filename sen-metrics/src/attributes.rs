//! Invocation labels and metric names.
//!
//! Flag values are never recorded. Each supplied flag becomes a presence
//! label, so label cardinality is bounded by the number of declared flags.

use std::collections::BTreeMap;
use std::fmt;

use opentelemetry::KeyValue;
use sen_command::Invocation;

/// Label recording whether the session is attached to a terminal.
pub const TTY_LABEL: &str = "tty";

/// Metric name used when the root command itself is invoked.
pub const ROOT_PATH: &str = "root";

/// Value of a single label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Int(v) => write!(f, "{v}"),
            LabelValue::Bool(v) => write!(f, "{v}"),
            LabelValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<&LabelValue> for opentelemetry::Value {
    fn from(v: &LabelValue) -> Self {
        match v {
            LabelValue::Int(v) => opentelemetry::Value::I64(*v),
            LabelValue::Bool(v) => opentelemetry::Value::Bool(*v),
            LabelValue::Str(v) => opentelemetry::Value::from(v.clone()),
        }
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        LabelValue::Int(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        LabelValue::Bool(v)
    }
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        LabelValue::Str(v.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        LabelValue::Str(v)
    }
}

/// Deduplicated, order-independent set of labels.
///
/// Inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(BTreeMap<String, LabelValue>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LabelValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&LabelValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attributes in key order, as recorded on instruments.
    pub fn to_key_values(&self) -> Vec<KeyValue> {
        self.0
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), opentelemetry::Value::from(v)))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Labels for one invocation: `flag = 1` for every supplied flag plus
/// `tty = <interactive>`.
pub fn invocation_labels(invocation: &Invocation, interactive: bool) -> LabelSet {
    let mut labels: LabelSet = invocation
        .supplied_flags()
        .filter(|name| !name.trim().is_empty())
        .map(|name| (name, 1_i64))
        .collect();
    labels.insert(TTY_LABEL, interactive);
    labels
}

/// Metric name for an invocation: the command path without the root,
/// joined with `-`, or [`ROOT_PATH`] for the root itself.
pub fn invocation_path(invocation: &Invocation) -> String {
    match invocation.command_path() {
        [] | [_] => ROOT_PATH.to_string(),
        [_, rest @ ..] => rest.join("-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sen_command::{Command, CommandTree, FlagSpec};

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("myapp").subcommand(
                Command::new("sub1").subcommand(
                    Command::new("sub2")
                        .flag(FlagSpec::value("output"))
                        .flag(FlagSpec::switch("debug"))
                        .flag(FlagSpec::switch("dry-run")),
                ),
            ),
        )
    }

    #[test]
    fn test_path_for_root_is_sentinel() {
        let inv = tree().parse(Vec::<String>::new()).unwrap();
        assert_eq!(invocation_path(&inv), "root");
    }

    #[test]
    fn test_path_joins_names_below_root() {
        let inv = tree().parse(["sub1"]).unwrap();
        assert_eq!(invocation_path(&inv), "sub1");

        let inv = tree().parse(["sub1", "sub2"]).unwrap();
        assert_eq!(invocation_path(&inv), "sub1-sub2");
    }

    #[test]
    fn test_only_supplied_flags_become_labels() {
        let inv = tree()
            .parse(["sub1", "sub2", "--output", "json", "--debug"])
            .unwrap();
        let labels = invocation_labels(&inv, true);

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get("output"), Some(&LabelValue::Int(1)));
        assert_eq!(labels.get("debug"), Some(&LabelValue::Int(1)));
        assert!(!labels.contains_key("dry-run"));
        assert_eq!(labels.get(TTY_LABEL), Some(&LabelValue::Bool(true)));
    }

    #[test]
    fn test_flag_values_never_leak() {
        let a = tree().parse(["sub1", "sub2", "--output=json"]).unwrap();
        let b = tree().parse(["sub1", "sub2", "--output=yaml"]).unwrap();
        assert_eq!(invocation_labels(&a, false), invocation_labels(&b, false));
    }

    #[test]
    fn test_no_flags_only_tty() {
        let inv = tree().parse(["sub1"]).unwrap();
        let labels = invocation_labels(&inv, false);
        assert_eq!(labels, LabelSet::new().with(TTY_LABEL, false));
    }

    #[test]
    fn test_key_values_keep_types() {
        let kvs = LabelSet::new()
            .with("force", 1_i64)
            .with(TTY_LABEL, false)
            .to_key_values();
        assert_eq!(
            kvs,
            vec![KeyValue::new("force", 1_i64), KeyValue::new(TTY_LABEL, false)]
        );
    }

    #[test]
    fn test_last_write_wins() {
        let labels: LabelSet = [("a", 1_i64), ("a", 2_i64)].into_iter().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("a"), Some(&LabelValue::Int(2)));
    }
}
