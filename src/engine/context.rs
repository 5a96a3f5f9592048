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

use cvgraph_array_types::{V3, M33};
use cvgraph_structure::Pbc;

use crate::ValueId;
use crate::action::StepContext;
use crate::chain::{ChainRun, Pass, Worker};
use crate::value::Value;

/// What an action sees while it works on one task.
///
/// Arguments produced earlier in the same chain are read from the task
/// record; all others come from storage. Derivatives are always expressed
/// over the chain's derivative layout.
pub struct TaskContext<'a> {
    pub(crate) run: &'a ChainRun<'a>,
    pub(crate) worker: &'a mut Worker,
    pub(crate) task: usize,
    pub(crate) col: usize,
    pub(crate) rank: usize,
}

impl<'a> TaskContext<'a> {
    #[inline] pub fn step(&self) -> &StepContext<'a> { &self.run.step }
    #[inline] pub fn pbc(&self) -> &'a Pbc { self.run.step.pbc }
    #[inline] pub fn positions(&self) -> &'a [V3] { self.run.step.positions }
    #[inline] pub fn natoms(&self) -> usize { self.run.step.positions.len() }
    #[inline] pub fn value(&self, id: ValueId) -> &'a Value { &self.run.step.values[id] }

    #[inline] pub fn task_index(&self) -> usize { self.task }
    /// Same as `task_index`, for row chains.
    #[inline] pub fn row(&self) -> usize { self.task }
    /// Column of the current element of a row task.
    #[inline] pub fn col(&self) -> usize { self.col }
    /// Position of the task in this step's task list.
    #[inline] pub fn rank(&self) -> usize { self.rank }

    /// True while forces are being collected rather than values computed.
    #[inline] pub fn is_gather(&self) -> bool { self.run.pass == Pass::Gather }

    fn pos(&self, out: ValueId) -> usize {
        match self.run.chain.component_of.get(&out) {
            Some(&pos) => pos,
            None => panic!("(BUG) '{}' is not computed by this chain", self.value(out).name()),
        }
    }

    fn streamed_pos(&self, arg: ValueId) -> Option<usize> {
        match self.value(arg).mode().is_streamable() {
            true => self.run.chain.component_of.get(&arg).cloned(),
            false => None,
        }
    }

    /// Read an element of an argument.
    ///
    /// For an argument computed earlier in this loop, the element of the
    /// current task is returned regardless of `element`.
    pub fn argument_value(&self, arg: ValueId, element: usize) -> f64 {
        match self.streamed_pos(arg) {
            Some(pos) => self.worker.record.value(pos),
            None => self.value(arg).data()[element],
        }
    }

    /// Current value of one of the action's own outputs.
    pub fn output_value(&self, out: ValueId) -> f64
    { self.worker.record.value(self.pos(out)) }

    pub fn set_value(&mut self, out: ValueId, x: f64) {
        let pos = self.pos(out);
        self.worker.record.set_value(pos, x);
    }

    pub fn add_value(&mut self, out: ValueId, x: f64) {
        let pos = self.pos(out);
        self.worker.record.add_value(pos, x);
    }

    /// `d(out) += d * d(arg[element])`.
    pub fn add_argument_derivative(&mut self, out: ValueId, arg: ValueId, element: usize, d: f64) {
        if !self.value(out).has_derivatives() {
            return;
        }
        let to = self.pos(out);
        self.argument_derivative_into(to, arg, element, d);
    }

    fn argument_derivative_into(&mut self, to: usize, arg: ValueId, element: usize, d: f64) {
        if let Some(from) = self.streamed_pos(arg) {
            self.worker.record.chain_rule(from, to, d);
            return;
        }
        let value = self.value(arg);
        if value.is_constant() || !value.has_derivatives() {
            return;
        }
        let start = match self.run.chain.layout.block_start(arg) {
            Some(start) => start,
            None => panic!("(BUG) '{}' has no derivative block in this chain", value.name()),
        };
        self.worker.record.add_derivative(to, start + element, d);
    }

    /// Derivative of an output with respect to the position of an atom.
    pub fn add_atom_derivative(&mut self, out: ValueId, atom: usize, d: V3) {
        if !self.value(out).has_derivatives() {
            return;
        }
        let pos = self.pos(out);
        let layout = &self.run.chain.layout;
        for k in 0..3 {
            self.worker.record.add_derivative(pos, layout.atom_index(atom, k), d[k]);
        }
    }

    /// Box derivative (virial contribution) of an output.
    pub fn add_box_derivative(&mut self, out: ValueId, d: &M33) {
        if !self.value(out).has_derivatives() {
            return;
        }
        let pos = self.pos(out);
        let layout = &self.run.chain.layout;
        for a in 0..3 {
            for b in 0..3 {
                self.worker.record.add_derivative(pos, layout.box_index(a, b), d[a][b]);
            }
        }
    }

    /// Add into one element of an accumulated output.
    ///
    /// `derivs` lists `(argument, element, d)`: the derivatives of the
    /// contribution with respect to arguments. They are only used when
    /// collecting forces.
    pub fn accumulate(&mut self, out: ValueId, element: usize, x: f64, derivs: &[(ValueId, usize, f64)]) {
        match self.run.pass {
            Pass::Forward => {
                let slot = self.slot(out);
                self.worker.data[slot][element] += x;
            },
            Pass::Gather => {
                let force = self.value(out).forces()[element];
                if force == 0.0 {
                    return;
                }
                let to = self.run.chain.gather_component();
                for &(arg, arg_element, d) in derivs {
                    self.argument_derivative_into(to, arg, arg_element, force * d);
                }
            },
        }
    }

    /// Add into the gradient of an accumulated grid output.
    pub fn accumulate_gradient(&mut self, out: ValueId, element: usize, dim: usize, x: f64) {
        if self.run.pass == Pass::Forward {
            let slot = self.slot(out);
            let ndim = self.run.chain.slots[slot].grid_ndim;
            self.worker.grads[slot][element * ndim + dim] += x;
        }
    }

    fn slot(&self, out: ValueId) -> usize {
        match self.run.chain.slot_of.get(&out) {
            Some(&slot) => slot,
            None => panic!("(BUG) '{}' is not an output of this chain", self.value(out).name()),
        }
    }
}
