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

use crate::{FailResult, arguments, per_argument};
use crate::distance::per_task_shape;

use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ValueId, ValueSpec, OutputMode, Periodicity};
use cvgraph_tasks_config::{ActionSettings, CombineOptions};

/// `Σ c_i (x_i - p_i)^{n_i}`, elementwise over vector arguments.
pub(crate) struct Combine {
    terms: Vec<Term>,
    ntasks: usize,
    periodicity: Periodicity,
    out: ValueId,
}

struct Term {
    arg: ValueId,
    /// Scalar arguments are reused by every task.
    broadcast: bool,
    periodicity: Periodicity,
    coefficient: f64,
    parameter: f64,
    power: f64,
}

pub(crate) fn build_combine(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let CombineOptions { arg, coefficients, parameters, powers, periodic } = settings.parse_options()?;
    let args = arguments(nb, &arg.0)?;
    let nargs = args.len();
    let coefficients = per_argument(nb, "coefficients", coefficients, nargs, 1.0)?;
    let parameters = per_argument(nb, "parameters", parameters, nargs, 0.0)?;
    let powers = per_argument(nb, "powers", powers, nargs, 1.0)?;

    let ntasks = args.iter().map(|a| a.len()).max().unwrap_or(1);
    if let Some(bad) = args.iter().find(|a| a.len() != 1 && a.len() != ntasks) {
        return Err(nb.error(format!("'{}' has {} elements, expected 1 or {}", bad.name, bad.len(), ntasks)));
    }

    let terms = args.iter().enumerate()
        .map(|(i, a)| Term {
            arg: a.id,
            broadcast: a.len() == 1,
            periodicity: a.periodicity,
            coefficient: coefficients[i],
            parameter: parameters[i],
            power: powers[i],
        })
        .collect();

    let mut spec = ValueSpec::new(per_task_shape(ntasks), OutputMode::PerTask);
    if let Some([min, max]) = periodic {
        if !(min < max) {
            return Err(nb.error(format!("periodic domain [{}, {}] is empty", min, max)));
        }
        spec = spec.periodic(min, max);
    }
    let periodicity = spec.periodicity;
    let out = nb.output(spec)?;
    Ok(Box::new(Combine { terms, ntasks, periodicity, out }))
}

impl Action for Combine {
    fn kind(&self) -> &'static str { "COMBINE" }

    fn task_space(&self) -> TaskSpace {
        match self.ntasks {
            1 => TaskSpace::Single,
            n => TaskSpace::Elements(n),
        }
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let task = ctx.task_index();
        let mut total = 0.0;
        for term in &self.terms {
            let element = if term.broadcast { 0 } else { task };
            let x = ctx.argument_value(term.arg, element);
            let d = term.periodicity.difference(term.parameter, x);
            total += term.coefficient * d.powf(term.power);
            let deriv = term.coefficient * term.power * d.powf(term.power - 1.0);
            ctx.add_argument_derivative(self.out, term.arg, element, deriv);
        }
        ctx.set_value(self.out, self.periodicity.bring_back(total));
        Ok(())
    }
}
