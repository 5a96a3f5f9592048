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

//! Actions that introduce values rather than compute them from atoms.

use crate::FailResult;

use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode, GridSpec, ENERGY};
use cvgraph_tasks_config::{ActionSettings, ConstantOptions, GridSettings, NoOptions};

/// The potential energy handed over by the host.
pub(crate) struct Energy {
    energy: ValueId,
    out: ValueId,
}

pub(crate) fn build_energy(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let NoOptions {} = settings.parse_options()?;
    let energy = nb.argument(ENERGY)?.id;
    let out = nb.output(ValueSpec::new(Shape::Scalar, OutputMode::PerTask))?;
    Ok(Box::new(Energy { energy, out }))
}

impl Action for Energy {
    fn kind(&self) -> &'static str { "ENERGY" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Single }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let x = ctx.argument_value(self.energy, 0);
        ctx.set_value(self.out, x);
        ctx.add_argument_derivative(self.out, self.energy, 0, 1.0);
        Ok(())
    }
}

/// Fixed values, optionally laid out on a grid.
pub(crate) struct Constant;

pub(crate) fn build_constant(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ConstantOptions { values, grid } = settings.parse_options()?;
    let shape = match grid {
        Some(grid) => Shape::Grid(grid_spec(grid)?),
        None => match values.len() {
            0 => return Err(nb.error("no values given")),
            1 => Shape::Scalar,
            n => Shape::Vector(n),
        },
    };
    let out = nb.output(ValueSpec::new(shape, OutputMode::Passive))?;
    nb.set_constant(out, values)?;
    Ok(Box::new(Constant))
}

impl Action for Constant {
    fn kind(&self) -> &'static str { "CONSTANT" }

    fn task_space(&self) -> TaskSpace { TaskSpace::None }

    fn is_constant(&self) -> bool { true }
}

/// Build a grid, treating an empty `periodic` list as all non-periodic.
pub(crate) fn grid_spec(settings: GridSettings) -> FailResult<GridSpec> {
    let GridSettings { min, max, bins, periodic } = settings;
    let periodic = match periodic.is_empty() {
        true => vec![false; min.len()],
        false => periodic,
    };
    GridSpec::new(min, max, bins, periodic)
}
