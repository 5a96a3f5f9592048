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

use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode, Periodicity};
use cvgraph_tasks_config::{ActionSettings, RestraintOptions};

/// Harmonic and linear restraint on scalar arguments.
///
/// `bias = Σ κ_i/2 d_i² + m_i d_i`, where `d_i` is the (periodic) distance
/// of argument `i` from its center.
pub(crate) struct Restraint {
    terms: Vec<Term>,
    bias: ValueId,
}

struct Term {
    arg: ValueId,
    periodicity: Periodicity,
    at: f64,
    kappa: f64,
    slope: f64,
}

pub(crate) fn build_restraint(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let RestraintOptions { arg, at, kappa, slope } = settings.parse_options()?;
    let args = arguments(nb, &arg.0)?;
    if let Some(bad) = args.iter().find(|a| a.len() != 1) {
        return Err(nb.error(format!("RESTRAINT needs scalar arguments, but '{}' has {} elements", bad.name, bad.len())));
    }
    let nargs = args.len();
    if at.len() != nargs {
        return Err(nb.error(format!("'at' has {} entries but there are {} arguments", at.len(), nargs)));
    }
    let kappa = per_argument(nb, "kappa", Some(kappa), nargs, 0.0)?;
    let slope = per_argument(nb, "slope", Some(slope), nargs, 0.0)?;

    let terms = args.iter().enumerate()
        .map(|(i, a)| Term { arg: a.id, periodicity: a.periodicity, at: at[i], kappa: kappa[i], slope: slope[i] })
        .collect();
    let bias = nb.component("bias", ValueSpec::new(Shape::Scalar, OutputMode::Reduced))?;
    Ok(Box::new(Restraint { terms, bias }))
}

impl Action for Restraint {
    fn kind(&self) -> &'static str { "RESTRAINT" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Single }

    fn is_sink(&self) -> bool { true }

    fn is_bias(&self) -> bool { true }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let mut total = 0.0;
        for term in &self.terms {
            let x = ctx.argument_value(term.arg, 0);
            let d = term.periodicity.difference(term.at, x);
            total += 0.5 * term.kappa * d * d + term.slope * d;
            ctx.add_argument_derivative(self.bias, term.arg, 0, term.kappa * d + term.slope);
        }
        ctx.set_value(self.bias, total);
        Ok(())
    }
}
