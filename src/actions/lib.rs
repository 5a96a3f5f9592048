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

//! The actions that cvgraph graphs are made of.
//!
//! Every action is constructed from an `ActionSettings` by a factory in
//! `register_all`. Factories parse their options, declare arguments and
//! outputs on the `NodeBuilder`, and hand back a boxed `Action`.

#[macro_use] extern crate log;
#[macro_use] extern crate failure;
#[macro_use] extern crate lazy_static;
#[cfg(test)] #[macro_use] extern crate cvgraph_assert_close;

use cvgraph_engine::{Registry, NodeBuilder, ArgInfo};
use cvgraph_tasks_config::ActionSettings;

pub type FailResult<T> = Result<T, failure::Error>;

pub mod switch;
mod distance;
mod angle;
mod adjacency;
mod elementwise;
mod reduce;
mod combine;
mod bias;
mod inputs;
mod histogram;
mod contour;
mod clustering;
mod secondary;
mod average;
mod shortcuts;

#[cfg(test)]
mod tests;

pub use crate::switch::Switch;
pub use crate::adjacency::{AdjacencyMatrix, PairWeight, ContactWeight, DistanceWeight};
pub use crate::secondary::SecondaryKind;

/// The registry type used by the driver.
pub type ActionRegistry = Registry<ActionSettings>;

/// Register every action and shortcut.
pub fn register_all(registry: &mut ActionRegistry) {
    registry.register("DISTANCE", distance::build_distance);
    registry.register("ANGLE", angle::build_angle);
    registry.register("CONTACT_MATRIX", adjacency::build_contact_matrix);
    registry.register("DISTANCE_MATRIX", adjacency::build_distance_matrix);
    registry.register("COORDINATION_NUMBER", reduce::build_coordination_number);
    registry.register("LESS_THAN", elementwise::build_less_than);
    registry.register("MORE_THAN", elementwise::build_more_than);
    registry.register("BETWEEN", elementwise::build_between);
    registry.register("SUM", reduce::build_sum);
    registry.register("MEAN", reduce::build_mean);
    registry.register("MAX", reduce::build_max);
    registry.register("MIN", reduce::build_min);
    registry.register("COMBINE", combine::build_combine);
    registry.register("RESTRAINT", bias::build_restraint);
    registry.register("ENERGY", inputs::build_energy);
    registry.register("CONSTANT", inputs::build_constant);
    registry.register("HISTOGRAM", histogram::build_histogram);
    registry.register("FIND_CONTOUR", contour::build_find_contour);
    registry.register("DFS_CLUSTERING", clustering::build_dfs_clustering);
    registry.register("CLUSTER_WEIGHTS", clustering::build_cluster_weights);
    registry.register("ALPHARMSD", secondary::build_alpha);
    registry.register("ANTIBETARMSD", secondary::build_antibeta);
    registry.register("PARABETARMSD", secondary::build_parabeta);
    registry.register("AVERAGE", average::build_average);
    shortcuts::register_shortcuts(registry);
}

/// A registry with every action.
pub fn registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    register_all(&mut registry);
    registry
}

/// Check atom indices against the size of the system.
pub(crate) fn check_atoms<'a>(nb: &NodeBuilder<'_>, atoms: impl IntoIterator<Item=&'a usize>) -> FailResult<()> {
    let natoms = nb.natoms();
    for &atom in atoms {
        if atom >= natoms {
            return Err(nb.error(format!("atom index {} out of range for {} atoms", atom, natoms)));
        }
    }
    Ok(())
}

/// Declare every argument named by `names`.
pub(crate) fn arguments(nb: &mut NodeBuilder<'_>, names: &[String]) -> FailResult<Vec<ArgInfo>> {
    if names.is_empty() {
        return Err(nb.error("no arguments given"));
    }
    names.iter().map(|name| nb.argument(name)).collect()
}

/// Check that an option list has one entry per argument, filling in a default when empty.
pub(crate) fn per_argument(
    nb: &NodeBuilder<'_>,
    what: &str,
    given: Option<Vec<f64>>,
    nargs: usize,
    default: f64,
) -> FailResult<Vec<f64>> {
    match given {
        None => Ok(vec![default; nargs]),
        Some(ref v) if v.is_empty() => Ok(vec![default; nargs]),
        Some(v) => match v.len() == nargs {
            true => Ok(v),
            false => Err(nb.error(format!("{} has {} entries but there are {} arguments", what, v.len(), nargs))),
        },
    }
}
