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

//! Reverse pass: forces on outputs become forces on upstream values.

use cvgraph_newtype_indices::IndexVec;

use crate::{FailResult, NodeId, ValueId};
use crate::action::StepInputs;
use crate::chain::{self, ChainRun, Pass};
use crate::comm::Communicator;
use crate::graph::{Chain, Node};
use crate::value::{Value, OutputMode};

/// Propagate the forces on a chain's outputs onto the blocks of its layout.
///
/// Forces on reduced scalars go through their stored derivatives. Forces on
/// anything computed per task require the tasks to be run again.
pub(crate) fn backward_chain<C: Communicator>(
    chain: &Chain,
    nodes: &IndexVec<NodeId, Node>,
    values: &mut IndexVec<ValueId, Value>,
    inputs: StepInputs<'_>,
    tasks: &[usize],
    comm: &C,
) -> FailResult<()> {
    let mut layout_forces = vec![0.0; chain.layout.total()];
    let mut rerun = false;
    for slot in &chain.slots {
        let value = &values[slot.value];
        if !value.has_forces() {
            continue;
        }
        match slot.mode {
            OutputMode::Reduced => if slot.has_derivatives {
                let force = value.forces()[0];
                for (dest, &d) in layout_forces.iter_mut().zip(value.derivatives()) {
                    *dest += force * d;
                }
            },
            OutputMode::PerTask |
            OutputMode::MatrixElement |
            OutputMode::Compacted => rerun |= slot.has_derivatives,
            OutputMode::Accumulated => rerun = true,
            OutputMode::Passive => {},
        }
    }

    if rerun {
        let run = ChainRun { chain, nodes, step: inputs.with_values(values), pass: Pass::Gather };
        let mut worker = run.run(tasks, inputs.parallel)?;
        comm.sum_in_place(&mut worker.forces);
        chain::add_into(&mut layout_forces, &worker.forces);
    }

    for block in chain.layout.blocks() {
        let value = &mut values[block.value];
        for i in 0..block.len {
            let f = layout_forces[block.start + i];
            if f != 0.0 {
                value.add_force(i, f);
            }
        }
    }
    Ok(())
}
