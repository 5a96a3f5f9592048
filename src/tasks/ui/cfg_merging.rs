/* ************************************************************************ **
** This file is part of cvgraph, and is licensed under EITHER the MIT       **
** license or the Apache 2.0 license, at your option.                       **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of cvgraph is provided under this permissive       **
** license, and that the project as a whole is licensed under the GPL 3.0.  **
** ************************************************************************ */

use crate::FailResult;

use std::path::{Path, PathBuf};

use cvgraph_tasks_config::{Settings, YamlRead};
use serde_yaml::{Mapping, Value};

/// The configs given to `--config`, in order, to be merged into one.
///
/// Serializable so that a record of exactly what was used can be saved.
#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSources(Vec<Config>);

#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Config {
    source: ConfigSource,
    yaml: Value,
}

#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
enum ConfigSource {
    File(PathBuf),
    Argument,
}

impl Config {
    /// A string with a ':' is a literal, written `[NESTED.KEY]:YAML`.
    /// Anything else is a path, which is read immediately.
    pub(crate) fn resolve_from_arg(s: &str) -> FailResult<Config> {
        // there is no way to escape a ':' in a path.
        match s.find(':') {
            Some(colon) => Config::from_literal(&s[..colon], &s[colon + 1..]),
            None => Config::from_file(s.as_ref()),
        }
    }

    fn from_literal(path: &str, yaml: &str) -> FailResult<Config> {
        let path: Vec<&str> = match path {
            "" => vec![],
            path => path.split('.').collect(),
        };
        let value: Value = YamlRead::from_reader(yaml.as_bytes())?;
        Ok(Config {
            yaml: make_nested_mapping(&path, value),
            source: ConfigSource::Argument,
        })
    }

    fn from_file(path: &Path) -> FailResult<Config> {
        let file = cvgraph_fs_util::open_text(path)?;
        let yaml = YamlRead::from_reader(file)?;
        let path = path.canonicalize().unwrap_or_else(|_| path.to_owned());
        Ok(Config { yaml, source: ConfigSource::File(path) })
    }
}

fn make_nested_mapping(path: &[&str], mut value: Value) -> Value {
    for &key in path.iter().rev() {
        let mut mapping = Mapping::new();
        mapping.insert(Value::String(key.into()), value);
        value = Value::Mapping(mapping);
    }
    value
}

impl ConfigSources {
    /// Construct from values given to --config.
    pub fn resolve_from_args<As>(args: As) -> FailResult<Self>
    where
        As: IntoIterator,
        As::Item: AsRef<str>,
    {
        let configs = args.into_iter()
            .map(|arg| Config::resolve_from_arg(arg.as_ref()))
            .collect::<FailResult<Vec<_>>>()?;
        ensure!(!configs.is_empty(), "at least one config is required");
        Ok(ConfigSources(configs))
    }

    pub fn effective_yaml(&self) -> Value {
        let empty = Value::Mapping(Default::default());
        self.0.iter().fold(empty, |a, b| dumb_config_merge(a, b.yaml.clone()))
    }

    /// Merge and deserialize. Unknown keys are warned about, not rejected.
    pub fn settings(&self) -> FailResult<Settings>
    { Ok(YamlRead::from_value(self.effective_yaml())?) }
}

/// Merges two yaml documents without knowing what they deserialize to.
///
/// Mappings take the union of their keys and merge recursively on the intersection.
/// For anything else, `b` wins. In particular, the `actions` list is replaced
/// wholesale rather than appended to.
fn dumb_config_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Mapping(mut a), Value::Mapping(b)) => {
            for (key, b_value) in b {
                let value = match a.remove(&key) {
                    None => b_value,
                    Some(a_value) => dumb_config_merge(a_value, b_value),
                };
                a.insert(key, value);
            }
            Value::Mapping(a)
        },
        (_, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_fs_util::TempDir;

    macro_rules! m { ($($arg:tt)*) => { Value::Mapping(vec![$($arg)*].into_iter().collect()) }; }
    macro_rules! s { ($($arg:tt)*) => { Value::Sequence(vec![$($arg)*]) }; }

    fn literal(s: &str) -> Value {
        Config::resolve_from_arg(s).unwrap().yaml
    }

    #[test]
    fn literal_args() {
        let expected = m!{ ("print".into(), m!{ ("args".into(), s!["d".into()]) }) };
        assert_eq!(literal(":{print: {args: [d]}}"), expected);
        assert_eq!(literal(": {print: {args: [d]}}"), expected);
        assert_eq!(literal("print:{args: [d]}"), expected);
        assert_eq!(literal("print.args: [d]"), expected);
        assert_eq!(literal("print.args:[d]"), expected);
    }

    #[test]
    fn later_sources_win() {
        let dir = TempDir::new("cvgraph-config").unwrap();
        let path = dir.path().join("base.yaml");
        cvgraph_fs_util::write(&path, "
chaining: true
print: {args: [d], stride: 5}
actions:
  - {label: d, action: DISTANCE, atoms: [[0, 1]]}
").unwrap();

        let path = path.to_str().unwrap().to_string();
        let sources = ConfigSources::resolve_from_args(vec![
            path,
            "print.stride: 2".to_string(),
            "chaining: false".to_string(),
        ]).unwrap();
        let settings = sources.settings().unwrap();
        assert!(!settings.chaining);
        assert_eq!(settings.print.args, vec!["d".to_string()]);
        assert_eq!(settings.print.stride, 2);
        assert_eq!(settings.actions.len(), 1);
    }

    #[test]
    fn missing_files_are_errors() {
        let dir = TempDir::new("cvgraph-config").unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(ConfigSources::resolve_from_args(vec![missing.to_str().unwrap()]).is_err());
        assert!(ConfigSources::resolve_from_args(Vec::<String>::new()).is_err());
    }
}
