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

//! Reductions of a vector or matrix argument to a scalar, and row sums of matrices.

use crate::FailResult;

use cvgraph_engine::{Action, TaskSpace, TaskContext, StepContext, NodeBuilder, ArgInfo, ValueId, ValueSpec, Shape, OutputMode};
use cvgraph_tasks_config::{ActionSettings, ArgOptions, ExtremumOptions};

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum Reduction {
    Sum,
    Mean,
    /// `β ln Σ exp(x / β)`
    Max { beta: f64 },
    /// `-β ln Σ exp(-x / β)`
    Min { beta: f64 },
}

impl Reduction {
    fn name(self) -> &'static str {
        match self {
            Reduction::Sum => "SUM",
            Reduction::Mean => "MEAN",
            Reduction::Max { .. } => "MAX",
            Reduction::Min { .. } => "MIN",
        }
    }

    fn is_extremum(self) -> bool {
        match self {
            Reduction::Max { .. } | Reduction::Min { .. } => true,
            Reduction::Sum | Reduction::Mean => false,
        }
    }

    /// Contribution of one element to the sum, and its derivative.
    ///
    /// Exponentials are taken relative to `shift`, which `finish` adds back.
    #[inline]
    fn term(self, x: f64, shift: f64) -> (f64, f64) {
        match self {
            Reduction::Sum | Reduction::Mean => (x, 1.0),
            Reduction::Max { beta } => {
                let e = ((x - shift) / beta).exp();
                (e, e / beta)
            },
            Reduction::Min { beta } => {
                let e = ((shift - x) / beta).exp();
                (e, -e / beta)
            },
        }
    }

    /// Final value from the sum over `n` elements, and its derivative.
    fn finish(self, sum: f64, n: usize, shift: f64) -> (f64, f64) {
        match self {
            Reduction::Sum => (sum, 1.0),
            Reduction::Mean => (sum / n as f64, 1.0 / n as f64),
            Reduction::Max { beta } => (shift + beta * sum.ln(), beta / sum),
            Reduction::Min { beta } => (shift - beta * sum.ln(), -beta / sum),
        }
    }

    /// The largest element for MAX and the smallest for MIN, so that no term overflows.
    fn shift_for(self, xs: impl Iterator<Item=f64>) -> f64 {
        let best = match self {
            Reduction::Max { .. } => xs.fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x)))),
            Reduction::Min { .. } => xs.fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x)))),
            Reduction::Sum | Reduction::Mean => None,
        };
        best.filter(|x| x.is_finite()).unwrap_or(0.0)
    }
}

pub(crate) struct Reduce {
    how: Reduction,
    arg: ValueId,
    space: TaskSpace,
    count: usize,
    out: ValueId,
    shift: f64,
}

pub(crate) fn build_sum(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ArgOptions { arg } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    Ok(Box::new(Reduce::new(nb, Reduction::Sum, &arg)?))
}

pub(crate) fn build_mean(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ArgOptions { arg } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    Ok(Box::new(Reduce::new(nb, Reduction::Mean, &arg)?))
}

pub(crate) fn build_max(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ExtremumOptions { arg, beta } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    Ok(Box::new(Reduce::new(nb, Reduction::Max { beta }, &arg)?))
}

pub(crate) fn build_min(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ExtremumOptions { arg, beta } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    Ok(Box::new(Reduce::new(nb, Reduction::Min { beta }, &arg)?))
}

impl Reduce {
    pub(crate) fn new(nb: &mut NodeBuilder<'_>, how: Reduction, arg: &ArgInfo) -> FailResult<Self> {
        if let Reduction::Max { beta } | Reduction::Min { beta } = how {
            if !(beta > 0.0) {
                return Err(nb.error(format!("beta must be positive (got {})", beta)));
            }
        }
        let out = nb.output(ValueSpec::new(Shape::Scalar, OutputMode::Reduced))?;
        Ok(Reduce { how, arg: arg.id, space: arg.elementwise_space(), count: arg.len(), out, shift: 0.0 })
    }

    fn add_term(&self, ctx: &mut TaskContext<'_>, element: usize) {
        let x = ctx.argument_value(self.arg, element);
        let (y, dy) = self.how.term(x, self.shift);
        ctx.add_value(self.out, y);
        ctx.add_argument_derivative(self.out, self.arg, element, dy);
    }
}

impl Action for Reduce {
    fn kind(&self) -> &'static str { self.how.name() }

    fn task_space(&self) -> TaskSpace { self.space }

    fn needs_stored_arguments(&self) -> bool { self.how.is_extremum() }

    fn prepare(&mut self, ctx: &StepContext<'_>) -> FailResult<()> {
        if self.how.is_extremum() {
            let data = ctx.value(self.arg).data();
            // absent matrix elements are stored as zero and never summed
            self.shift = match self.space {
                TaskSpace::Rows { .. } => self.how.shift_for(data.iter().cloned().filter(|&x| x != 0.0)),
                _ => self.how.shift_for(data.iter().cloned()),
            };
        }
        Ok(())
    }

    fn perform_element(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        if let TaskSpace::Rows { cols, .. } = self.space {
            let element = ctx.row() * cols + ctx.col();
            if ctx.argument_value(self.arg, element) != 0.0 {
                self.add_term(ctx, element);
            }
        }
        Ok(())
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        match self.space {
            TaskSpace::Rows { .. } => {},
            _ => {
                let element = ctx.task_index();
                self.add_term(ctx, element);
            },
        }
        Ok(())
    }

    fn transform_reduction(&self, _: ValueId, sum: f64) -> (f64, f64)
    { self.how.finish(sum, self.count, self.shift) }
}

/// Sum of each row of a matrix.
pub(crate) struct CoordinationNumber {
    arg: ValueId,
    rows: usize,
    cols: usize,
    out: ValueId,
}

pub(crate) fn build_coordination_number(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ArgOptions { arg } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    let (rows, cols) = match (arg.is_matrix(), &arg.shape) {
        (true, &Shape::Matrix(rows, cols)) => (rows, cols),
        _ => return Err(nb.error(format!("'{}' is not a matrix", arg.name))),
    };
    let out = nb.output(ValueSpec::new(Shape::Vector(rows), OutputMode::PerTask))?;
    Ok(Box::new(CoordinationNumber { arg: arg.id, rows, cols, out }))
}

impl Action for CoordinationNumber {
    fn kind(&self) -> &'static str { "COORDINATION_NUMBER" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Rows { rows: self.rows, cols: self.cols } }

    fn perform_element(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let element = ctx.row() * self.cols + ctx.col();
        let x = ctx.argument_value(self.arg, element);
        ctx.add_value(self.out, x);
        ctx.add_argument_derivative(self.out, self.arg, element, 1.0);
        Ok(())
    }
}
