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

//! Kernel density estimates on a grid.

use crate::FailResult;
use crate::inputs::grid_spec;

use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode, GridSpec};
use cvgraph_tasks_config::{ActionSettings, HistogramOptions, Normalization};

use std::f64::consts::PI;

/// Kernels are truncated where `Σ (d_k / σ_k)² / 2` exceeds this.
const DP2_CUTOFF: f64 = 6.25;

/// Sum of normalized gaussians centered on each data point.
///
/// One task per data point. Each task accumulates into the grid points near
/// its center, together with the gradient of the density at those points.
pub(crate) struct Histogram {
    args: Vec<ValueId>,
    heights: Option<ValueId>,
    ndata: usize,
    grid: GridSpec,
    bandwidth: Vec<f64>,
    /// Prefactor of every kernel, including the normalization.
    prefactor: f64,
    out: ValueId,
}

pub(crate) fn build_histogram(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let HistogramOptions { arg, heights, grid, bandwidth, normalization } = settings.parse_options()?;
    let grid = grid_spec(grid)?;
    let ndim = grid.ndim();
    if arg.0.len() != ndim {
        return Err(nb.error(format!("a {}-dimensional grid needs {} arguments, got {}", ndim, ndim, arg.0.len())));
    }
    if bandwidth.len() != ndim || bandwidth.iter().any(|&s| !(s > 0.0)) {
        return Err(nb.error(format!("bandwidth needs {} positive entries", ndim)));
    }

    let mut args = vec![];
    let mut ndata = None;
    for name in arg.0.iter().chain(&heights) {
        let info = nb.argument(name)?;
        match ndata {
            None => ndata = Some(info.len()),
            Some(n) if n != info.len() => {
                return Err(nb.error(format!("'{}' has {} elements, expected {}", info.name, info.len(), n)));
            },
            Some(_) => {},
        }
        args.push(info.id);
    }
    let ndata = ndata.unwrap_or(0);
    let heights = match heights {
        Some(_) => args.pop(),
        None => None,
    };

    let norm = match normalization {
        Normalization::None => 1.0,
        Normalization::Ndata => 1.0 / ndata as f64,
    };
    let kernel_norm = (2.0 * PI).powf(-0.5 * ndim as f64) / bandwidth.iter().product::<f64>();

    let out = nb.output(ValueSpec::new(Shape::Grid(grid.clone()), OutputMode::Accumulated))?;
    Ok(Box::new(Histogram {
        args, heights, ndata, grid, bandwidth, out,
        prefactor: norm * kernel_norm,
    }))
}

impl Histogram {
    /// Indices along `dim` of the grid points within the kernel support of `x`.
    fn support(&self, dim: usize, x: f64) -> Vec<usize> {
        let grid = &self.grid;
        let h = grid.spacing(dim);
        let n = grid.npoints_along(dim) as i64;
        let reach = self.bandwidth[dim] * (2.0 * DP2_CUTOFF).sqrt();
        let lo = ((x - reach - grid.min[dim]) / h).ceil() as i64;
        let hi = ((x + reach - grid.min[dim]) / h).floor() as i64;

        match grid.periodic[dim] {
            true => {
                // never visit a point twice, even for kernels wider than the box
                let hi = hi.min(lo + n - 1);
                (lo..=hi).map(|i| i.rem_euclid(n) as usize).collect()
            },
            false => (lo.max(0)..=hi.min(n - 1)).map(|i| i as usize).collect(),
        }
    }

    /// Signed distance from `x` to grid coordinate `g` along `dim`.
    fn offset(&self, dim: usize, x: f64, g: f64) -> f64 {
        let d = g - x;
        match self.grid.periodic[dim] {
            true => {
                let period = self.grid.max[dim] - self.grid.min[dim];
                d - period * (d / period).round()
            },
            false => d,
        }
    }
}

impl Action for Histogram {
    fn kind(&self) -> &'static str { "HISTOGRAM" }

    fn task_space(&self) -> TaskSpace {
        match self.ndata {
            1 => TaskSpace::Single,
            n => TaskSpace::Elements(n),
        }
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let task = ctx.task_index();
        let ndim = self.grid.ndim();
        let center: Vec<f64> = self.args.iter().map(|&a| ctx.argument_value(a, task)).collect();
        let height = self.heights.map_or(1.0, |h| ctx.argument_value(h, task));
        if height == 0.0 {
            return Ok(());
        }

        let ranges: Vec<Vec<usize>> = (0..ndim).map(|d| self.support(d, center[d])).collect();
        if ranges.iter().any(|r| r.is_empty()) {
            return Ok(());
        }

        let mut multi = vec![0; ndim];
        let mut cursor = vec![0; ndim];
        let mut offsets = vec![0.0; ndim];
        let mut derivs = Vec::with_capacity(ndim + 1);
        'points: loop {
            for d in 0..ndim {
                multi[d] = ranges[d][cursor[d]];
                let g = self.grid.min[d] + multi[d] as f64 * self.grid.spacing(d);
                offsets[d] = self.offset(d, center[d], g);
            }
            let dp2: f64 = (0..ndim).map(|d| 0.5 * (offsets[d] / self.bandwidth[d]).powi(2)).sum();
            if dp2 < DP2_CUTOFF {
                let kernel = self.prefactor * (-dp2).exp();
                let value = height * kernel;
                let point = self.grid.flat_index(&multi);

                derivs.clear();
                for d in 0..ndim {
                    // moving the center toward the point raises the density there
                    let slope = value * offsets[d] / self.bandwidth[d].powi(2);
                    derivs.push((self.args[d], task, slope));
                    ctx.accumulate_gradient(self.out, point, d, -slope);
                }
                if let Some(h) = self.heights {
                    derivs.push((h, task, kernel));
                }
                ctx.accumulate(self.out, point, value, &derivs);
            }

            // odometer over the support box
            for d in (0..ndim).rev() {
                cursor[d] += 1;
                if cursor[d] < ranges[d].len() {
                    continue 'points;
                }
                cursor[d] = 0;
            }
            break;
        }
        Ok(())
    }
}
