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

use crate::{FailResult, check_atoms};

use cvgraph_array_types::V3;
use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode};
use cvgraph_engine::numerical_error;
use cvgraph_tasks_config::{ActionSettings, DistanceOptions};

/// Distances between pairs of atoms, one task per pair.
pub(crate) struct Distance {
    label: String,
    pairs: Vec<[usize; 2]>,
    out: ValueId,
    components: Option<[ValueId; 3]>,
}

pub(crate) fn build_distance(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let DistanceOptions { atoms, components } = settings.parse_options()?;
    if atoms.is_empty() {
        return Err(nb.error("no atom pairs given"));
    }
    check_atoms(nb, atoms.iter().flat_map(|pair| pair.iter()))?;

    let spec = ValueSpec::new(per_task_shape(atoms.len()), OutputMode::PerTask);
    let out = nb.output(spec.clone())?;
    let components = match components {
        true => Some([
            nb.component("x", spec.clone())?,
            nb.component("y", spec.clone())?,
            nb.component("z", spec)?,
        ]),
        false => None,
    };
    Ok(Box::new(Distance { label: nb.label().to_string(), pairs: atoms, out, components }))
}

/// A scalar for a single task, a vector otherwise.
pub(crate) fn per_task_shape(ntasks: usize) -> Shape {
    match ntasks {
        1 => Shape::Scalar,
        n => Shape::Vector(n),
    }
}

impl Action for Distance {
    fn kind(&self) -> &'static str { "DISTANCE" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Elements(self.pairs.len()) }

    fn uses_atoms(&self) -> bool { true }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let [a, b] = self.pairs[ctx.task_index()];
        let pos = ctx.positions();
        let r = ctx.pbc().distance(pos[a], pos[b]);
        let d = r.norm();
        if d == 0.0 {
            return Err(numerical_error(&self.label, format!("atoms {} and {} coincide", a, b)));
        }

        let g = r / d;
        ctx.set_value(self.out, d);
        ctx.add_atom_derivative(self.out, a, -g);
        ctx.add_atom_derivative(self.out, b, g);
        ctx.add_box_derivative(self.out, &-r.outer(&g));

        if let Some(components) = self.components {
            for (k, &out) in components.iter().enumerate() {
                let e = V3::axis_unit(k);
                ctx.set_value(out, r[k]);
                ctx.add_atom_derivative(out, a, -e);
                ctx.add_atom_derivative(out, b, e);
                ctx.add_box_derivative(out, &-r.outer(&e));
            }
        }
        Ok(())
    }
}
