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

use crate::{NodeId, FailResult};

/// Periodic domain of a scalar value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Periodicity {
    NonPeriodic,
    Periodic { min: f64, max: f64 },
}

impl Default for Periodicity {
    fn default() -> Self { Periodicity::NonPeriodic }
}

impl Periodicity {
    #[inline]
    pub fn is_periodic(&self) -> bool
    { *self != Periodicity::NonPeriodic }

    /// `b - a`, mapped to its shortest representative in the domain.
    pub fn difference(&self, a: f64, b: f64) -> f64 {
        match *self {
            Periodicity::NonPeriodic => b - a,
            Periodicity::Periodic { min, max } => {
                let period = max - min;
                let d = b - a;
                d - period * (d / period).round()
            },
        }
    }

    /// Map a value into `[min, max)`.
    pub fn bring_back(&self, x: f64) -> f64 {
        match *self {
            Periodicity::NonPeriodic => x,
            Periodicity::Periodic { min, max } => {
                let period = max - min;
                min + (x - min).rem_euclid(period)
            },
        }
    }
}

/// Whether a value survives beyond the task that computed it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Only lives in the per-task record of its chain.
    Streamed,
    /// Materialized into the value's data after its chain runs.
    Stored,
}

/// How the per-task results of a chain make up a value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// One element per task.
    PerTask,
    /// One element per (row, column) pair of a row chain.
    MatrixElement,
    /// A scalar summed over tasks, with derivatives over the chain's layout.
    Reduced,
    /// Elements that any task may add to. (grids, cluster labels)
    Accumulated,
    /// One element per task that was actually run.
    Compacted,
    /// Not computed by tasks at all. (constants, put slots, running averages)
    Passive,
}

impl OutputMode {
    /// Can a consumer read this value from inside the producer's chain?
    #[inline]
    pub fn is_streamable(self) -> bool
    { self == OutputMode::PerTask || self == OutputMode::MatrixElement }

    /// Does the value have a slot in the per-task record?
    #[inline]
    pub(crate) fn uses_record(self) -> bool {
        match self {
            OutputMode::PerTask | OutputMode::MatrixElement |
            OutputMode::Reduced | OutputMode::Compacted => true,
            OutputMode::Accumulated | OutputMode::Passive => false,
        }
    }
}

/// A regular grid of points.
///
/// Points are numbered in row-major order (the last dimension varies fastest).
/// Along a periodic dimension there are `nbins` points; along a
/// non-periodic one, `nbins + 1` so that both ends are included.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub nbins: Vec<usize>,
    pub periodic: Vec<bool>,
}

impl GridSpec {
    pub fn new(min: Vec<f64>, max: Vec<f64>, nbins: Vec<usize>, periodic: Vec<bool>) -> FailResult<GridSpec> {
        let ndim = min.len();
        ensure!(ndim > 0, "a grid needs at least one dimension");
        ensure!(
            max.len() == ndim && nbins.len() == ndim && periodic.len() == ndim,
            "grid min, max, nbins and periodicity must have the same length"
        );
        for d in 0..ndim {
            ensure!(min[d] < max[d], "grid dimension {} has min >= max", d);
            ensure!(nbins[d] > 0, "grid dimension {} has no bins", d);
        }
        Ok(GridSpec { min, max, nbins, periodic })
    }

    #[inline]
    pub fn ndim(&self) -> usize { self.min.len() }

    #[inline]
    pub fn spacing(&self, dim: usize) -> f64
    { (self.max[dim] - self.min[dim]) / self.nbins[dim] as f64 }

    #[inline]
    pub fn npoints_along(&self, dim: usize) -> usize {
        match self.periodic[dim] {
            true => self.nbins[dim],
            false => self.nbins[dim] + 1,
        }
    }

    pub fn npoints(&self) -> usize
    { (0..self.ndim()).map(|d| self.npoints_along(d)).product() }

    pub fn multi_index(&self, mut flat: usize) -> Vec<usize> {
        let mut out = vec![0; self.ndim()];
        for d in (0..self.ndim()).rev() {
            let n = self.npoints_along(d);
            out[d] = flat % n;
            flat /= n;
        }
        out
    }

    pub fn flat_index(&self, multi: &[usize]) -> usize {
        multi.iter().enumerate().fold(0, |acc, (d, &i)| acc * self.npoints_along(d) + i)
    }

    /// Coordinates of a grid point.
    pub fn point(&self, flat: usize) -> Vec<f64> {
        self.multi_index(flat).iter().enumerate()
            .map(|(d, &i)| self.min[d] + i as f64 * self.spacing(d))
            .collect()
    }

    /// The next point along a dimension, wrapping when periodic.
    ///
    /// `None` for the last point of a non-periodic dimension.
    pub fn next_along(&self, flat: usize, dim: usize) -> Option<usize> {
        let mut multi = self.multi_index(flat);
        let n = self.npoints_along(dim);
        multi[dim] += 1;
        if multi[dim] == n {
            match self.periodic[dim] {
                true => multi[dim] = 0,
                false => return None,
            }
        }
        Some(self.flat_index(&multi))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Scalar,
    Vector(usize),
    Matrix(usize, usize),
    Grid(GridSpec),
}

impl Shape {
    pub fn len(&self) -> usize {
        match *self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
            Shape::Matrix(r, c) => r * c,
            Shape::Grid(ref grid) => grid.npoints(),
        }
    }

    pub fn rank(&self) -> usize {
        match *self {
            Shape::Scalar => 0,
            Shape::Vector(_) => 1,
            Shape::Matrix(_, _) => 2,
            Shape::Grid(ref grid) => grid.ndim(),
        }
    }

    pub fn grid(&self) -> Option<&GridSpec> {
        match *self {
            Shape::Grid(ref grid) => Some(grid),
            _ => None,
        }
    }
}

/// Declares an output of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub shape: Shape,
    pub mode: OutputMode,
    pub periodicity: Periodicity,
    pub has_derivatives: bool,
}

impl ValueSpec {
    pub fn new(shape: Shape, mode: OutputMode) -> Self {
        ValueSpec { shape, mode, periodicity: Periodicity::NonPeriodic, has_derivatives: true }
    }

    pub fn periodic(mut self, min: f64, max: f64) -> Self {
        self.periodicity = Periodicity::Periodic { min, max };
        self
    }

    pub fn without_derivatives(mut self) -> Self {
        self.has_derivatives = false;
        self
    }
}

/// A named output of the graph.
#[derive(Debug, Clone)]
pub struct Value {
    pub(crate) name: String,
    pub(crate) owner: Option<NodeId>,
    pub(crate) shape: Shape,
    pub(crate) mode: OutputMode,
    pub(crate) periodicity: Periodicity,
    pub(crate) has_derivatives: bool,
    pub(crate) constant: bool,
    pub(crate) storage: Storage,
    pub(crate) data: Vec<f64>,
    /// For reduced values: derivatives over the owning chain's layout.
    pub(crate) derivatives: Vec<f64>,
    /// For grids: the gradient at each point, `ndim` entries per point.
    pub(crate) grid_gradients: Vec<f64>,
    pub(crate) forces: Vec<f64>,
    pub(crate) has_forces: bool,
}

impl Value {
    pub(crate) fn new(name: String, owner: Option<NodeId>, spec: ValueSpec) -> Value {
        let len = spec.shape.len();
        let ngrad = match &spec.shape {
            Shape::Grid(grid) => grid.ndim() * len,
            _ => 0,
        };
        Value {
            name,
            owner,
            mode: spec.mode,
            periodicity: spec.periodicity,
            has_derivatives: spec.has_derivatives,
            constant: false,
            storage: Storage::Stored,
            data: vec![0.0; len],
            derivatives: vec![],
            grid_gradients: vec![0.0; ngrad],
            forces: vec![0.0; len],
            has_forces: false,
            shape: spec.shape,
        }
    }

    #[inline] pub fn name(&self) -> &str { &self.name }
    #[inline] pub fn owner(&self) -> Option<NodeId> { self.owner }
    #[inline] pub fn shape(&self) -> &Shape { &self.shape }
    #[inline] pub fn mode(&self) -> OutputMode { self.mode }
    #[inline] pub fn periodicity(&self) -> Periodicity { self.periodicity }
    #[inline] pub fn has_derivatives(&self) -> bool { self.has_derivatives }
    #[inline] pub fn is_constant(&self) -> bool { self.constant }
    #[inline] pub fn storage(&self) -> Storage { self.storage }
    #[inline] pub fn len(&self) -> usize { self.data.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.data.is_empty() }
    #[inline] pub fn data(&self) -> &[f64] { &self.data }
    #[inline] pub fn derivatives(&self) -> &[f64] { &self.derivatives }
    #[inline] pub fn grid_gradients(&self) -> &[f64] { &self.grid_gradients }
    #[inline] pub fn forces(&self) -> &[f64] { &self.forces }
    #[inline] pub fn has_forces(&self) -> bool { self.has_forces }

    /// First element of the value.
    #[inline]
    pub fn scalar(&self) -> f64 { self.data.get(0).cloned().unwrap_or(0.0) }

    /// Give the value a new length, as compacted values do every step.
    pub(crate) fn resize(&mut self, len: usize) {
        self.data.clear();
        self.data.resize(len, 0.0);
        self.forces.clear();
        self.forces.resize(len, 0.0);
        if let Shape::Vector(ref mut n) = self.shape {
            *n = len;
        }
    }

    pub(crate) fn clear_forces(&mut self) {
        if self.has_forces {
            for x in &mut self.forces {
                *x = 0.0;
            }
            self.has_forces = false;
        }
    }

    pub(crate) fn add_force(&mut self, index: usize, f: f64) {
        self.forces[index] += f;
        self.has_forces = true;
    }
}
