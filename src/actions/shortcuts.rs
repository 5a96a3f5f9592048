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

//! Options that expand a single entry into a small pipeline.
//!
//! For instance, a `DISTANCE` entry labeled `d` with a `less-than` option
//! becomes the `DISTANCE` itself, a `LESS_THAN` labeled `d_lt`, and a `SUM`
//! of that labeled `d_lessthan`.

use crate::{ActionRegistry, FailResult, SecondaryKind};

use cvgraph_tasks_config::ActionSettings;
use serde_yaml::Value;

/// A function applied to every element and then summed.
struct Summed {
    key: &'static str,
    action: &'static str,
    suffix: &'static str,
    sum_suffix: &'static str,
}

const LESS_THAN: Summed = Summed { key: "less-than", action: "LESS_THAN", suffix: "_lt", sum_suffix: "_lessthan" };
const MORE_THAN: Summed = Summed { key: "more-than", action: "MORE_THAN", suffix: "_mt", sum_suffix: "_morethan" };
const BETWEEN: Summed = Summed { key: "between", action: "BETWEEN", suffix: "_bt", sum_suffix: "_between" };

/// Reductions written as `sum: true` or `max: {beta: 0.1}`.
const REDUCTIONS: &[(&str, &str)] = &[
    ("sum", "SUM"),
    ("mean", "MEAN"),
    ("max", "MAX"),
    ("min", "MIN"),
];

pub(crate) fn register_shortcuts(registry: &mut ActionRegistry) {
    for name in &["DISTANCE", "ANGLE"] {
        registry.register_shortcut(name, expand_functions);
    }
    for kind in &[SecondaryKind::Alpha, SecondaryKind::AntiBeta, SecondaryKind::ParaBeta] {
        registry.register_shortcut(kind.action_name(), expand_less_than);
    }
}

fn expand_functions(entry: &ActionSettings) -> FailResult<Option<Vec<ActionSettings>>> {
    let mut base = entry.clone();
    let mut extra = vec![];
    for summed in &[LESS_THAN, MORE_THAN, BETWEEN] {
        summed.expand(&mut base, &mut extra)?;
    }
    for &(key, action) in REDUCTIONS {
        let options = match base.take(key) {
            None | Some(Value::Bool(false)) => continue,
            Some(Value::Bool(true)) => None,
            Some(options) => Some(options),
        };
        let mut reduce = ActionSettings::new(&format!("{}_{}", entry.label, key), action)
            .with("arg", Value::String(entry.label.clone()));
        if let Some(options) = options {
            merge_into(&mut reduce, key, options)?;
        }
        extra.push(reduce);
    }
    Ok(finish(base, extra))
}

fn expand_less_than(entry: &ActionSettings) -> FailResult<Option<Vec<ActionSettings>>> {
    let mut base = entry.clone();
    let mut extra = vec![];
    LESS_THAN.expand(&mut base, &mut extra)?;
    Ok(finish(base, extra))
}

impl Summed {
    fn expand(&self, base: &mut ActionSettings, extra: &mut Vec<ActionSettings>) -> FailResult<()> {
        let options = match base.take(self.key) {
            Some(options) => options,
            None => return Ok(()),
        };
        let label = base.label.clone();
        let function_label = format!("{}{}", label, self.suffix);

        let mut function = ActionSettings::new(&function_label, self.action)
            .with("arg", Value::String(label.clone()));
        match self.action {
            "BETWEEN" => merge_into(&mut function, self.key, options)?,
            _ => function.set("switch", options),
        }
        extra.push(function);
        extra.push({
            ActionSettings::new(&format!("{}{}", label, self.sum_suffix), "SUM")
                .with("arg", Value::String(function_label))
        });
        Ok(())
    }
}

/// Copy the keys of a mapping into an entry.
fn merge_into(entry: &mut ActionSettings, key: &str, options: Value) -> FailResult<()> {
    match options {
        Value::Mapping(mapping) => {
            for (k, v) in mapping {
                entry.options.insert(k, v);
            }
            Ok(())
        },
        _ => bail!("'{}' option of '{}' must be a mapping", key, entry.label),
    }
}

fn finish(base: ActionSettings, extra: Vec<ActionSettings>) -> Option<Vec<ActionSettings>> {
    match extra.is_empty() {
        true => None,
        false => {
            debug!("expanded '{}' into {} more actions", base.label, extra.len());
            Some(std::iter::once(base).chain(extra).collect())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_engine::ActionEntry;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn labels(entries: &[ActionSettings]) -> Vec<(&str, &str)> {
        entries.iter().map(|e| (e.label(), e.action_name())).collect()
    }

    #[test]
    fn distance_functions() {
        let entry = ActionSettings::new("d", "DISTANCE")
            .with("atoms", yaml("[[0, 1], [1, 2]]"))
            .with("less-than", yaml("{rational: {r0: 0.3}}"))
            .with("between", yaml("{lower: 0.1, upper: 0.2}"))
            .with("mean", Value::Bool(true))
            .with("max", yaml("{beta: 0.05}"));
        let out = expand_functions(&entry).unwrap().unwrap();
        assert_eq!(labels(&out), vec![
            ("d", "DISTANCE"),
            ("d_lt", "LESS_THAN"),
            ("d_lessthan", "SUM"),
            ("d_bt", "BETWEEN"),
            ("d_between", "SUM"),
            ("d_mean", "MEAN"),
            ("d_max", "MAX"),
        ]);

        assert_eq!(out[0].options.len(), 1);
        assert_eq!(out[1].get("switch"), Some(&yaml("{rational: {r0: 0.3}}")));
        assert_eq!(out[2].argument_names(), vec!["d_lt".to_string()]);
        assert_eq!(out[3].get("upper"), Some(&yaml("0.2")));
        assert_eq!(out[6].get("beta"), Some(&yaml("0.05")));
        assert_eq!(out[6].argument_names(), vec!["d".to_string()]);
    }

    #[test]
    fn entries_without_options_are_left_alone() {
        let entry = ActionSettings::new("a", "ANGLE")
            .with("atoms", yaml("[[0, 1, 2]]"))
            .with("sum", Value::Bool(false));
        assert_eq!(expand_functions(&entry).unwrap(), None);
    }

    #[test]
    fn malformed_options() {
        let entry = ActionSettings::new("d", "DISTANCE").with("between", yaml("0.3"));
        assert!(expand_functions(&entry).is_err());
    }

    #[test]
    fn secondary_structure_less_than() {
        let entry = ActionSettings::new("helix", "ALPHARMSD")
            .with("backbone", yaml("[[0, 1, 2]]"))
            .with("less-than", yaml("{rational: {r0: 0.08, nn: 8, mm: 12}}"));
        let out = expand_less_than(&entry).unwrap().unwrap();
        assert_eq!(labels(&out), vec![
            ("helix", "ALPHARMSD"),
            ("helix_lt", "LESS_THAN"),
            ("helix_lessthan", "SUM"),
        ]);
    }
}
