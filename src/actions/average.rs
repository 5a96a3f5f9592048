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

use crate::FailResult;

use cvgraph_engine::{Action, TaskSpace, UpdateContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode, Periodicity};
use cvgraph_tasks_config::{ActionSettings, AverageOptions};

/// Running mean of a value over the steps it has been sampled on.
///
/// The mean and the number of samples are ordinary stored values, so they
/// are carried over by checkpoints.
pub(crate) struct Average {
    arg: ValueId,
    periodicity: Periodicity,
    stride: u64,
    out: ValueId,
    count: ValueId,
}

pub(crate) fn build_average(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let AverageOptions { arg, stride } = settings.parse_options()?;
    if stride == 0 {
        return Err(nb.error("stride must be at least 1"));
    }
    let arg = nb.argument(arg.single(nb.label())?)?;
    if arg.mode == OutputMode::Compacted {
        return Err(nb.error(format!("'{}' changes length between steps and cannot be averaged", arg.name)));
    }

    let mut spec = ValueSpec::new(arg.shape.clone(), OutputMode::Passive).without_derivatives();
    spec.periodicity = arg.periodicity;
    let out = nb.output(spec)?;
    let count = nb.component("count", ValueSpec::new(Shape::Scalar, OutputMode::Passive).without_derivatives())?;
    Ok(Box::new(Average { arg: arg.id, periodicity: arg.periodicity, stride, out, count }))
}

impl Action for Average {
    fn kind(&self) -> &'static str { "AVERAGE" }

    fn task_space(&self) -> TaskSpace { TaskSpace::None }

    fn is_sink(&self) -> bool { true }

    fn needs_stored_arguments(&self) -> bool { true }

    fn is_active_on_step(&self, step: u64) -> bool { step % self.stride == 0 }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> FailResult<()> {
        if !self.is_active_on_step(ctx.step()) {
            return Ok(());
        }
        let sample = ctx.value(self.arg).data().to_vec();
        let n = {
            let count = ctx.data_mut(self.count);
            count[0] += 1.0;
            count[0]
        };
        trace!("AVERAGE: sample {} on step {}", n, ctx.step());

        let periodicity = self.periodicity;
        for (mean, x) in ctx.data_mut(self.out).iter_mut().zip(sample) {
            *mean = periodicity.bring_back(*mean + periodicity.difference(*mean, x) / n);
        }
        Ok(())
    }
}
