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

//! Points where a function on a grid crosses a given value.

use crate::FailResult;

use cvgraph_engine::{Action, TaskSpace, TaskContext, StepContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode, GridSpec};
use cvgraph_numerical::{bisect_sign_change, BisectSettings};
use cvgraph_tasks_config::{ActionSettings, ContourOptions};

const COMPONENT_NAMES: [&str; 3] = ["x", "y", "z"];

/// Searches every grid edge for a crossing of the contour.
///
/// Task `p * ndim + d` looks at the edge from point `p` to its successor
/// along dimension `d`. Only edges whose endpoints straddle the contour are
/// selected, and each of them contributes one point.
pub(crate) struct FindContour {
    arg: ValueId,
    grid: GridSpec,
    contour: f64,
    /// Whether the grid carries gradients to interpolate with.
    hermite: bool,
    out: Vec<ValueId>,
}

pub(crate) fn build_find_contour(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ContourOptions { arg, contour } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    let grid = match arg.shape.grid() {
        Some(grid) => grid.clone(),
        None => return Err(nb.error(format!("'{}' is not a grid", arg.name))),
    };
    if grid.ndim() > COMPONENT_NAMES.len() {
        return Err(nb.error(format!("contours of {}-dimensional grids are not supported", grid.ndim())));
    }

    let spec = ValueSpec::new(Shape::Vector(0), OutputMode::Compacted).without_derivatives();
    let out = COMPONENT_NAMES[..grid.ndim()].iter()
        .map(|name| nb.component(name, spec.clone()))
        .collect::<FailResult<_>>()?;
    let hermite = arg.mode == OutputMode::Accumulated && arg.has_derivatives;
    Ok(Box::new(FindContour { arg: arg.id, grid, contour, hermite, out }))
}

impl FindContour {
    fn edge(&self, task: usize) -> Option<(usize, usize, usize)> {
        let ndim = self.grid.ndim();
        let (point, dim) = (task / ndim, task % ndim);
        self.grid.next_along(point, dim).map(|next| (point, next, dim))
    }

    /// Interpolate the grid function along an edge, at distance `s` from its start.
    fn along_edge(&self, data: &[f64], grads: &[f64], (p, q, dim): (usize, usize, usize), s: f64) -> f64 {
        let h = self.grid.spacing(dim);
        let t = s / h;
        let (fp, fq) = (data[p], data[q]);
        if !self.hermite {
            return fp + t * (fq - fp);
        }

        // cubic hermite
        let ndim = self.grid.ndim();
        let (mp, mq) = (grads[p * ndim + dim], grads[q * ndim + dim]);
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * fp + h10 * h * mp + h01 * fq + h11 * h * mq
    }
}

impl Action for FindContour {
    fn kind(&self) -> &'static str { "FIND_CONTOUR" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Elements(self.grid.npoints() * self.grid.ndim()) }

    fn needs_stored_arguments(&self) -> bool { true }

    fn select_tasks(&self, ctx: &StepContext<'_>, flags: &mut [bool]) -> FailResult<bool> {
        let data = ctx.value(self.arg).data();
        let c = self.contour;
        for (task, flag) in flags.iter_mut().enumerate() {
            if let Some((p, q, _)) = self.edge(task) {
                if (data[p] - c) * (data[q] - c) < 0.0 {
                    *flag = true;
                }
            }
        }
        Ok(true)
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let edge = match self.edge(ctx.task_index()) {
            Some(edge) => edge,
            None => return Ok(()),
        };
        let (p, q, dim) = edge;
        let value = ctx.value(self.arg);
        let (data, grads) = (value.data(), value.grid_gradients());
        let h = self.grid.spacing(dim);

        let settings = BisectSettings { tolerance: 1e-10 * h, ..Default::default() };
        let root = bisect_sign_change::<failure::Error, _>((0.0, 0.999999999 * h), settings, |s| {
            Ok(self.along_edge(data, grads, edge, s) - self.contour)
        })?;
        let s = match root {
            Some(s) => s,
            // the interpolant can miss a crossing that the endpoints show
            None => h * (self.contour - data[p]) / (data[q] - data[p]),
        };

        let mut point = self.grid.point(p);
        point[dim] += s;
        if self.grid.periodic[dim] && point[dim] >= self.grid.max[dim] {
            point[dim] -= self.grid.max[dim] - self.grid.min[dim];
        }
        for (&out, &x) in self.out.iter().zip(&point) {
            ctx.set_value(out, x);
        }
        Ok(())
    }
}
