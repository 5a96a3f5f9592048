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

//! Functions applied to each element of an argument.
//!
//! Matrix arguments are processed element by element inside row tasks, so
//! that they can share the loop of the matrix. Zero matrix elements are
//! treated as absent and give zero, whether or not the matrix was pruned.

use crate::FailResult;
use crate::switch::Switch;

use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ArgInfo, ValueId, ValueSpec, Shape, OutputMode};
use cvgraph_tasks_config::{ActionSettings, SwitchOptions, BetweenOptions};

use std::f64::consts::PI;

/// A differentiable function of one variable.
pub(crate) trait Function: Send + Sync {
    const NAME: &'static str;

    /// Value and derivative.
    fn eval(&self, x: f64) -> (f64, f64);
}

pub(crate) struct LessThan(Switch);

impl Function for LessThan {
    const NAME: &'static str = "LESS_THAN";

    fn eval(&self, x: f64) -> (f64, f64) { self.0.eval(x) }
}

pub(crate) struct MoreThan(Switch);

impl Function for MoreThan {
    const NAME: &'static str = "MORE_THAN";

    fn eval(&self, x: f64) -> (f64, f64) {
        let (s, ds) = self.0.eval(x);
        (1.0 - s, -ds)
    }
}

/// Probability that a gaussian centered on `x` lands in `[lower, upper]`.
pub(crate) struct Between {
    lower: f64,
    upper: f64,
    sigma: f64,
}

impl Function for Between {
    const NAME: &'static str = "BETWEEN";

    fn eval(&self, x: f64) -> (f64, f64) {
        let scale = 1.0 / (std::f64::consts::SQRT_2 * self.sigma);
        let value = 0.5 * (libm::erf((self.upper - x) * scale) - libm::erf((self.lower - x) * scale));
        let gauss = |d: f64| (-0.5 * d * d / (self.sigma * self.sigma)).exp();
        let deriv = (gauss(self.lower - x) - gauss(self.upper - x)) / (self.sigma * (2.0 * PI).sqrt());
        (value, deriv)
    }
}

pub(crate) struct Elementwise<F> {
    f: F,
    arg: ValueId,
    space: TaskSpace,
    out: ValueId,
}

pub(crate) fn build_less_than(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let SwitchOptions { arg, switch } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    Ok(Box::new(Elementwise::new(nb, LessThan(Switch::from_settings(&switch)?), &arg)?))
}

pub(crate) fn build_more_than(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let SwitchOptions { arg, switch } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    Ok(Box::new(Elementwise::new(nb, MoreThan(Switch::from_settings(&switch)?), &arg)?))
}

pub(crate) fn build_between(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let BetweenOptions { arg, lower, upper, smear } = settings.parse_options()?;
    if !(lower < upper) {
        return Err(nb.error(format!("BETWEEN needs lower < upper (got {} and {})", lower, upper)));
    }
    if !(smear > 0.0) {
        return Err(nb.error(format!("smear must be positive (got {})", smear)));
    }
    let arg = nb.argument(arg.single(nb.label())?)?;
    let sigma = smear * (upper - lower);
    Ok(Box::new(Elementwise::new(nb, Between { lower, upper, sigma }, &arg)?))
}

impl<F: Function> Elementwise<F> {
    pub(crate) fn new(nb: &mut NodeBuilder<'_>, f: F, arg: &ArgInfo) -> FailResult<Self> {
        let space = arg.elementwise_space();
        let spec = match space {
            TaskSpace::Rows { rows, cols } => ValueSpec::new(Shape::Matrix(rows, cols), OutputMode::MatrixElement),
            TaskSpace::Single => ValueSpec::new(Shape::Scalar, OutputMode::PerTask),
            _ => ValueSpec::new(Shape::Vector(arg.len()), OutputMode::PerTask),
        };
        let out = nb.output(spec)?;
        Ok(Elementwise { f, arg: arg.id, space, out })
    }

    fn apply(&self, ctx: &mut TaskContext<'_>, element: usize) {
        let x = ctx.argument_value(self.arg, element);
        let (y, dy) = self.f.eval(x);
        ctx.set_value(self.out, y);
        ctx.add_argument_derivative(self.out, self.arg, element, dy);
    }
}

impl<F: Function> Action for Elementwise<F> {
    fn kind(&self) -> &'static str { F::NAME }

    fn task_space(&self) -> TaskSpace { self.space }

    fn perform_element(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        if let TaskSpace::Rows { cols, .. } = self.space {
            let element = ctx.row() * cols + ctx.col();
            if ctx.argument_value(self.arg, element) != 0.0 {
                self.apply(ctx, element);
            }
        }
        Ok(())
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        match self.space {
            TaskSpace::Rows { .. } => {},
            _ => {
                let element = ctx.task_index();
                self.apply(ctx, element);
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_numerical as numerical;
    use cvgraph_tasks_config::SwitchSettings;

    fn check_slope<F: Function>(f: &F, xs: &[f64]) {
        for &x in xs {
            let (_, d) = f.eval(x);
            assert_close!(rel=1e-7, abs=1e-9, d, numerical::slope(1e-4, None, x, |x| f.eval(x).0));
        }
    }

    #[test]
    fn between() {
        let f = Between { lower: 1.0, upper: 2.0, sigma: 0.1 };
        assert_close!(abs=1e-6, f.eval(1.5).0, 1.0);
        assert_close!(abs=1e-6, f.eval(1.0).0, 0.5);
        assert_close!(abs=1e-12, f.eval(-3.0).0, 0.0);
        check_slope(&f, &[0.8, 1.0, 1.1, 1.5, 1.95, 2.3]);
    }

    #[test]
    fn more_than_complements_less_than() {
        let settings = SwitchSettings::Rational { r0: 0.5, d0: 0.0, nn: 6, mm: 0, d_max: None };
        let lt = LessThan(Switch::from_settings(&settings).unwrap());
        let mt = MoreThan(Switch::from_settings(&settings).unwrap());
        for &x in &[0.1, 0.4, 0.5, 0.7, 1.2] {
            assert_close!(abs=1e-14, lt.eval(x).0 + mt.eval(x).0, 1.0);
        }
        check_slope(&mt, &[0.2, 0.45, 0.8]);
    }
}
