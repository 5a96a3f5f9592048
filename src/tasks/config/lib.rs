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

#![allow(non_snake_case)]

//! Crate where serde_yaml code for cvgraph is monomorphized, because this is a
//! huge compile time sink.
//!
//! The functions here also make use of serde_ignored to catch typos in the config.

// NOTE: Please make sure to use the YamlRead trait!
//       DO NOT USE serde_yaml::from_{reader,value,etc.} OUTSIDE THIS CRATE
//       or else you defeat the entire reason for its existence.

#[macro_use] extern crate serde_derive;
#[macro_use] extern crate log;
#[macro_use] extern crate failure;
#[cfg(test)] #[macro_use] extern crate pretty_assertions;

use std::io::Read;

pub type FailResult<T> = Result<T, failure::Error>;

/// Provides an alternative to serde_yaml::from_reader where all of the
/// expensive codegen has already been performed in this crate.
pub trait YamlRead: for<'de> serde::Deserialize<'de> {
    fn from_reader(mut r: impl Read) -> Result<Self, serde_yaml::Error>
    { YamlRead::from_dyn_reader(&mut r) }

    fn from_dyn_reader(r: &mut dyn Read) -> Result<Self, serde_yaml::Error> {
        // serde_ignored needs a Deserializer, and serde_yaml only gives us
        // one for Value.
        Self::from_value(value_from_dyn_reader(r)?)
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error>;
}

macro_rules! derive_yaml_read {
    ($Type:ty) => {
        impl YamlRead for $Type {
            // NOTE: Identical bodies are generated by a macro rather than written
            //       as a default method so that codegen happens in this crate.
            fn from_value(value: serde_yaml::Value) -> Result<$Type, serde_yaml::Error> {
                serde_ignored::deserialize(
                    value,
                    |path| warn!("Unused config item (possible typo?): {}", path),
                )
            }
        }
    };
}

derive_yaml_read!{serde_yaml::Value}

// (this also exists solely for codegen reasons)
fn value_from_dyn_reader(r: &mut dyn Read) -> Result<serde_yaml::Value, serde_yaml::Error>
{ serde_yaml::from_reader(r) }

mod config;
mod options;
mod validation;

pub use crate::config::{Settings, Threading, Print, Checkpoint, ActionSettings, ARGUMENT_KEYS};
pub use crate::options::*;
pub use crate::validation::{ValidatedSettings, GROUP_KEYS};

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_engine::ActionEntry;

    const EXAMPLE: &str = "
threading: rayon
groups:
  oxygens: [0, 3, 6]
box: [[10, 0, 0], [0, 10, 0], [0, 0, 10]]
actions:
  - label: cmap
    action: CONTACT_MATRIX
    group: oxygens
    switch:
      rational: {r0: 0.3}
  - label: cn
    action: COORDINATION_NUMBER
    arg: cmap
  - label: hist
    action: HISTOGRAM
    arg: [cn]
    heights: w
    grid: {min: [0], max: [4], bins: [40]}
    bandwidth: [0.1]
print:
  args: [cn]
  stride: 10
";

    fn example() -> Settings {
        Settings::from_reader(EXAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn top_level() {
        let settings = example();
        assert_eq!(settings.threading, Threading::Rayon);
        assert!(settings.chaining);
        assert_eq!(settings.natoms, None);
        assert_eq!(settings.groups["oxygens"], vec![0, 3, 6]);
        assert_eq!(settings.cell.unwrap()[1], [0.0, 10.0, 0.0]);
        assert_eq!(settings.print, Print {
            args: vec!["cn".to_string()],
            stride: 10,
            file: None,
        });
        assert_eq!(settings.checkpoint, Checkpoint::default());
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_reader("actions: []".as_bytes()).unwrap();
        assert_eq!(settings.threading, Threading::Serial);
        assert_eq!(settings.print.stride, 1);
        assert!(settings.actions.is_empty());
    }

    #[test]
    fn entries_report_their_arguments() {
        let settings = example();
        let names: Vec<_> = settings.actions.iter().map(|a| a.argument_names()).collect();
        assert_eq!(names, vec![
            vec![],
            vec!["cmap".to_string()],
            vec!["cn".to_string(), "w".to_string()],
        ]);
        assert_eq!(settings.actions[1].action_name(), "COORDINATION_NUMBER");
    }

    #[test]
    fn action_options() {
        let settings = example().validate().unwrap();
        let cmap: ContactMatrixOptions = settings.actions[0].parse_options().unwrap();
        assert_eq!(cmap.group, vec![0, 3, 6]);
        assert_eq!(cmap.group_b, None);
        assert!(!cmap.dense);
        assert_eq!(cmap.switch, SwitchSettings::Rational {
            r0: 0.3, d0: 0.0, nn: 6, mm: 0, d_max: None,
        });

        let hist: HistogramOptions = settings.actions[2].parse_options().unwrap();
        assert_eq!(hist.arg, Args(vec!["cn".to_string()]));
        assert_eq!(hist.heights, Some("w".to_string()));
        assert_eq!(hist.grid.bins, vec![40]);
        assert_eq!(hist.normalization, Normalization::Ndata);
    }

    #[test]
    fn args_accept_one_or_many() {
        let one: Args = serde_yaml::from_str("d1").unwrap();
        let many: Args = serde_yaml::from_str("[d1, d2]").unwrap();
        assert_eq!(one, Args(vec!["d1".to_string()]));
        assert_eq!(many.0.len(), 2);
        assert!(serde_yaml::from_str::<Args>("{a: 1}").is_err());
    }

    #[test]
    fn bad_options_are_errors() {
        let mut entry = ActionSettings::new("s", "SUM");
        assert!(entry.parse_options::<ArgOptions>().is_err());
        entry.set("arg", serde_yaml::Value::String("d".to_string()));
        assert_eq!(entry.parse_options::<ArgOptions>().unwrap().arg.single("s").unwrap(), "d");
        assert_eq!(entry.get("arg"), Some(&serde_yaml::Value::String("d".to_string())));
        assert!(entry.take("arg").is_some());
        assert!(entry.get("arg").is_none());
    }
}
