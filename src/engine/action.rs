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

use cvgraph_array_types::V3;
use cvgraph_newtype_indices::IndexVec;
use cvgraph_structure::Pbc;

use crate::{FailResult, ValueId};
use crate::value::Value;
use crate::context::TaskContext;

/// The set of tasks an action loops over.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskSpace {
    /// No tasks; the action does its work in `prepare` or `update`.
    None,
    /// Exactly one task.
    Single,
    /// One task per element.
    Elements(usize),
    /// One task per matrix row, with an inner loop over columns.
    Rows { rows: usize, cols: usize },
}

impl TaskSpace {
    pub fn ntasks(self) -> usize {
        match self {
            TaskSpace::None => 0,
            TaskSpace::Single => 1,
            TaskSpace::Elements(n) => n,
            TaskSpace::Rows { rows, .. } => rows,
        }
    }

    /// Can two actions iterate over these spaces in the same loop?
    pub fn matches(self, other: TaskSpace) -> bool {
        match (self, other) {
            (TaskSpace::None, _) | (_, TaskSpace::None) => false,
            (TaskSpace::Rows { cols: a, .. }, TaskSpace::Rows { cols: b, .. }) => {
                a == b && self.ntasks() == other.ntasks()
            },
            _ => self.ntasks() == other.ntasks(),
        }
    }

    /// The space of a chain containing both.
    pub(crate) fn join(self, other: TaskSpace) -> TaskSpace {
        match (self, other) {
            (TaskSpace::Rows { .. }, _) => self,
            (_, TaskSpace::Rows { .. }) => other,
            _ => self,
        }
    }
}

/// Data shared by every task of a step.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub(crate) step: u64,
    pub(crate) pbc: &'a Pbc,
    pub(crate) positions: &'a [V3],
    pub(crate) values: &'a IndexVec<ValueId, Value>,
    pub(crate) parallel: bool,
}

impl<'a> StepContext<'a> {
    #[inline] pub fn step(&self) -> u64 { self.step }
    #[inline] pub fn pbc(&self) -> &'a Pbc { self.pbc }
    #[inline] pub fn positions(&self) -> &'a [V3] { self.positions }
    #[inline] pub fn natoms(&self) -> usize { self.positions.len() }
    #[inline] pub fn value(&self, id: ValueId) -> &'a Value { &self.values[id] }
    /// Whether the engine was asked to use threads.
    #[inline] pub fn parallel(&self) -> bool { self.parallel }
}

/// The parts of a `StepContext` that do not borrow the values.
#[derive(Clone, Copy)]
pub(crate) struct StepInputs<'a> {
    pub(crate) step: u64,
    pub(crate) pbc: &'a Pbc,
    pub(crate) positions: &'a [V3],
    pub(crate) parallel: bool,
}

impl<'a> StepInputs<'a> {
    pub(crate) fn with_values<'b>(&self, values: &'b IndexVec<ValueId, Value>) -> StepContext<'b>
    where 'a: 'b,
    {
        StepContext {
            step: self.step,
            pbc: self.pbc,
            positions: self.positions,
            parallel: self.parallel,
            values,
        }
    }
}

/// Access to stored values from `Action::update`.
pub struct UpdateContext<'a> {
    pub(crate) step: u64,
    pub(crate) values: &'a mut IndexVec<ValueId, Value>,
}

impl<'a> UpdateContext<'a> {
    #[inline] pub fn step(&self) -> u64 { self.step }
    #[inline] pub fn value(&self, id: ValueId) -> &Value { &self.values[id] }

    pub fn data_mut(&mut self, id: ValueId) -> &mut [f64]
    { &mut self.values[id].data }
}

/// A node of the graph.
///
/// Capability queries describe how the scheduler may treat the action; the
/// `perform_*` methods do the per-task work through a `TaskContext`.
pub trait Action: Send + Sync {
    /// Name of the action kind, e.g. `"DISTANCE"`.
    fn kind(&self) -> &'static str;

    fn task_space(&self) -> TaskSpace;

    /// May this action share a task loop with the producers of its arguments?
    fn can_chain(&self) -> bool { true }

    /// Does the action need random access to whole argument values?
    fn needs_stored_arguments(&self) -> bool { false }

    /// Must this action run even when nothing consumes it?
    fn is_sink(&self) -> bool { false }

    fn is_active_on_step(&self, _step: u64) -> bool { true }

    /// Outputs never change, so the action only runs on the first step.
    fn is_constant(&self) -> bool { false }

    /// Outputs are bias energies, seeded with a force of -1.
    fn is_bias(&self) -> bool { false }

    /// Does the action add derivatives with respect to positions or the box?
    fn uses_atoms(&self) -> bool { false }

    /// Called once per step before any task runs.
    fn prepare(&mut self, _ctx: &StepContext<'_>) -> FailResult<()> { Ok(()) }

    /// Flag the tasks this action needs.
    ///
    /// Returns `false` if the action has no opinion, in which case it
    /// does not restrict the task list.
    fn select_tasks(&self, _ctx: &StepContext<'_>, _flags: &mut [bool]) -> FailResult<bool> { Ok(false) }

    /// For row actions: the columns of `row` that may be nonzero.
    ///
    /// Returns `false` to have every column visited.
    fn row_columns(&self, _row: usize, _out: &mut Vec<usize>) -> bool { false }

    /// Work for one (row, column) element of a row task.
    fn perform_element(&self, _ctx: &mut TaskContext<'_>) -> FailResult<()> { Ok(()) }

    /// Work for one task.
    fn perform_task(&self, _ctx: &mut TaskContext<'_>) -> FailResult<()> { Ok(()) }

    /// Map the sum of a reduced output over tasks to its final value.
    ///
    /// Returns the value and its derivative with respect to the sum.
    fn transform_reduction(&self, _output: ValueId, sum: f64) -> (f64, f64) { (sum, 1.0) }

    /// Called after the step's forces have been propagated.
    fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> FailResult<()> { Ok(()) }
}
