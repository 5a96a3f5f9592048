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

//! Post-processing that occurs after the config is read.

use crate::FailResult;
use crate::config::Settings;

use std::collections::BTreeMap;
use std::ops::Deref;

use serde_yaml::Value;

/// Option keys where the name of a group may stand in for a list of atoms.
pub const GROUP_KEYS: &[&str] = &["group", "group-b", "backbone"];

/// Settings whose groups have been substituted and whose sizes agree.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings(pub Settings);

impl Deref for ValidatedSettings {
    type Target = Settings;
    fn deref(&self) -> &Settings { &self.0 }
}

impl Settings {
    pub fn validate(mut self) -> FailResult<ValidatedSettings> {
        ensure!(self.print.stride > 0, "print.stride must be positive");

        if let Some(natoms) = self.natoms {
            for (name, atoms) in &self.groups {
                if let Some(&bad) = atoms.iter().find(|&&i| i >= natoms) {
                    bail!("group '{}' contains atom {}, but there are only {} atoms", name, bad, natoms);
                }
            }
            for &(key, list) in &[("masses", &self.masses), ("charges", &self.charges)] {
                if let Some(list) = list {
                    ensure!(list.len() == natoms, "expected {} {}, got {}", natoms, key, list.len());
                }
            }
        }

        for action in &mut self.actions {
            for key in GROUP_KEYS {
                if let Some(mut value) = action.take(key) {
                    substitute_groups(&self.groups, &mut value);
                    action.set(key, value);
                }
            }
        }
        Ok(ValidatedSettings(self))
    }
}

/// Replace every string naming a group with the group's atoms.
fn substitute_groups(groups: &BTreeMap<String, Vec<usize>>, value: &mut Value) {
    let replacement = match value {
        Value::String(name) => match groups.get(name.as_str()) {
            Some(atoms) => atoms.iter().map(|&i| Value::Number((i as u64).into())).collect(),
            None => return,
        },
        Value::Sequence(items) => {
            for item in items {
                substitute_groups(groups, item);
            }
            return;
        },
        _ => return,
    };
    *value = Value::Sequence(replacement);
}
