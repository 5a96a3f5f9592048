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

use crate::{FailResult, YamlRead};

use std::collections::BTreeMap;

use cvgraph_engine::ActionEntry;
use serde_yaml::{Mapping, Value};

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default)]
    pub threading: Threading,

    /// Fuse compatible actions into shared loops. Turning this off stores
    /// every intermediate value, which is mostly useful for debugging.
    #[serde(default = "_settings__chaining")]
    pub chaining: bool,

    /// Number of atoms. Taken from the first trajectory frame when absent.
    #[serde(default)]
    pub natoms: Option<usize>,

    /// Named lists of atom indices, usable wherever an action takes a group.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<usize>>,

    /// Box vectors as rows, overriding the trajectory. All zeros means no periodicity.
    #[serde(default, rename = "box")]
    pub cell: Option<[[f64; 3]; 3]>,

    #[serde(default)]
    pub masses: Option<Vec<f64>>,

    #[serde(default)]
    pub charges: Option<Vec<f64>>,

    pub actions: Vec<ActionSettings>,

    #[serde(default)]
    pub print: Print,

    #[serde(default)]
    pub checkpoint: Checkpoint,
}
derive_yaml_read!{Settings}

fn _settings__chaining() -> bool { true }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Threading {
    Serial,
    Rayon,
}

impl Default for Threading {
    fn default() -> Self { Threading::Serial }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Print {
    /// Values to write as columns. Vectors get one column per element.
    #[serde(default)]
    pub args: Vec<String>,

    /// Write a row every this many frames.
    #[serde(default = "_print__stride")]
    pub stride: u64,

    /// `None` writes to stdout.
    #[serde(default)]
    pub file: Option<String>,
}

fn _print__stride() -> u64 { 1 }

impl Default for Print {
    fn default() -> Self {
        Print { args: vec![], stride: _print__stride(), file: None }
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Checkpoint {
    /// Restore stored values from this file before the first frame.
    #[serde(default)]
    pub read: Option<String>,

    /// Save stored values to this file after the last frame.
    #[serde(default)]
    pub write: Option<String>,
}

/// Option keys whose values name other values.
pub const ARGUMENT_KEYS: &[&str] = &["arg", "heights"];

/// One entry of the `actions` list.
///
/// Everything but the label and the action name is kept as raw YAML, to be
/// parsed by the action into its own options type.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSettings {
    pub label: String,
    pub action: String,
    #[serde(flatten)]
    pub options: Mapping,
}

impl ActionSettings {
    pub fn new(label: &str, action: &str) -> Self {
        ActionSettings {
            label: label.to_string(),
            action: action.to_string(),
            options: Mapping::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value>
    { self.options.get(&key_value(key)) }

    pub fn set(&mut self, key: &str, value: Value)
    { self.options.insert(key_value(key), value); }

    /// Builder form of `set`.
    pub fn with(mut self, key: &str, value: Value) -> Self
    { self.set(key, value); self }

    pub fn take(&mut self, key: &str) -> Option<Value>
    { self.options.remove(&key_value(key)) }

    /// Parse the options into an action's options type.
    ///
    /// Unknown keys produce a warning naming the label.
    pub fn parse_options<T: for<'de> serde::Deserialize<'de>>(&self) -> FailResult<T> {
        let label = &self.label;
        let value = Value::Mapping(self.options.clone());
        serde_ignored::deserialize(
            value,
            |path| warn!("Unused config item (possible typo?): {}.{}", label, path),
        ).map_err(|e| format_err!("bad options for {} '{}': {}", self.action, label, e))
    }
}

impl ActionEntry for ActionSettings {
    fn label(&self) -> &str { &self.label }

    fn action_name(&self) -> &str { &self.action }

    fn argument_names(&self) -> Vec<String> {
        let mut out = vec![];
        for key in ARGUMENT_KEYS {
            match self.get(key) {
                Some(Value::String(name)) => out.push(name.clone()),
                Some(Value::Sequence(items)) => {
                    out.extend(items.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()));
                },
                _ => {},
            }
        }
        out
    }
}

fn key_value(key: &str) -> Value
{ Value::String(key.to_string()) }
