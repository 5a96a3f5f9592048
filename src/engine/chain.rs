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

//! The per-task loop of a chain.

use rayon::prelude::*;

use cvgraph_newtype_indices::IndexVec;

use crate::{FailResult, ChainId, NodeId, ValueId};
use crate::action::{StepContext, TaskSpace};
use crate::context::TaskContext;
use crate::errors::numerical_error;
use crate::graph::{Chain, Node};
use crate::multi_value::MultiValue;
use crate::value::{Value, OutputMode};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Compute values and derivatives.
    Forward,
    /// Re-run tasks to turn forces on outputs into forces on the layout.
    Gather,
}

/// Everything a thread owns while running tasks.
///
/// Buffers are indexed by output slot and summed when workers are merged.
pub(crate) struct Worker {
    pub(crate) record: MultiValue,
    pub(crate) data: Vec<Vec<f64>>,
    pub(crate) derivs: Vec<Vec<f64>>,
    pub(crate) grads: Vec<Vec<f64>>,
    pub(crate) forces: Vec<f64>,
    columns: Vec<usize>,
}

impl Worker {
    fn merge(mut self, other: Worker) -> Worker {
        for (a, b) in self.data.iter_mut().zip(&other.data) { add_into(a, b); }
        for (a, b) in self.derivs.iter_mut().zip(&other.derivs) { add_into(a, b); }
        for (a, b) in self.grads.iter_mut().zip(&other.grads) { add_into(a, b); }
        add_into(&mut self.forces, &other.forces);
        self
    }

    /// `forces += force * d(component)`
    fn gather(&mut self, pos: usize, force: f64) {
        if force == 0.0 {
            return;
        }
        let Worker { ref record, ref mut forces, .. } = *self;
        for (i, d) in record.active_derivatives(pos) {
            forces[i] += force * d;
        }
    }

    /// All buffers that must be summed across processes.
    pub(crate) fn buffers_mut(&mut self) -> impl Iterator<Item=&mut Vec<f64>> {
        self.data.iter_mut()
            .chain(self.derivs.iter_mut())
            .chain(self.grads.iter_mut())
            .chain(std::iter::once(&mut self.forces))
    }
}

pub(crate) fn add_into(a: &mut [f64], b: &[f64]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

/// One pass of a chain over its task list.
pub(crate) struct ChainRun<'a> {
    pub(crate) chain: &'a Chain,
    pub(crate) nodes: &'a IndexVec<NodeId, Node>,
    pub(crate) step: StepContext<'a>,
    pub(crate) pass: Pass,
}

impl<'a> ChainRun<'a> {
    fn new_worker(&self, ntasks: usize) -> Worker {
        let chain = self.chain;
        let total = chain.layout.total();
        let values = self.step.values;

        let mut data = vec![];
        let mut derivs = vec![];
        let mut grads = vec![];
        for slot in &chain.slots {
            let value = &values[slot.value];
            let forward = self.pass == Pass::Forward;
            let len = match slot.mode {
                OutputMode::PerTask | OutputMode::MatrixElement if forward && slot.stored => value.len(),
                OutputMode::Reduced if forward => 1,
                OutputMode::Accumulated if forward => value.len(),
                OutputMode::Compacted if forward => ntasks,
                _ => 0,
            };
            let nderiv = match slot.mode {
                OutputMode::Reduced if forward && slot.has_derivatives => total,
                _ => 0,
            };
            let ngrad = match slot.mode {
                OutputMode::Accumulated if forward => slot.grid_ndim * value.len(),
                _ => 0,
            };
            data.push(vec![0.0; len]);
            derivs.push(vec![0.0; nderiv]);
            grads.push(vec![0.0; ngrad]);
        }
        let forces = match self.pass {
            Pass::Gather => vec![0.0; total],
            Pass::Forward => vec![],
        };

        Worker {
            record: MultiValue::new(chain.record_size(), total),
            data, derivs, grads, forces,
            columns: vec![],
        }
    }

    pub(crate) fn run(&self, tasks: &[usize], parallel: bool) -> FailResult<Worker> {
        trace!(
            "{:?} pass over {} of {} tasks: [{}]",
            self.pass, tasks.len(), self.chain.space.ntasks(),
            self.chain.members.iter().map(|&m| &self.nodes[m].label[..]).collect::<Vec<_>>().join(", "),
        );

        match parallel {
            true => {
                tasks.par_iter().enumerate()
                    .try_fold(
                        || self.new_worker(tasks.len()),
                        |mut worker, (rank, &task)| -> FailResult<Worker> {
                            self.run_task(&mut worker, rank, task)?;
                            Ok(worker)
                        },
                    )
                    .try_reduce(
                        || self.new_worker(tasks.len()),
                        |a, b| Ok(a.merge(b)),
                    )
            },
            false => {
                let mut worker = self.new_worker(tasks.len());
                for (rank, &task) in tasks.iter().enumerate() {
                    self.run_task(&mut worker, rank, task)?;
                }
                Ok(worker)
            },
        }
    }

    fn run_task(&self, worker: &mut Worker, rank: usize, task: usize) -> FailResult<()> {
        let chain = self.chain;
        worker.record.clear_all();
        worker.record.set_task_index(task);

        if let TaskSpace::Rows { cols, .. } = chain.space {
            let mut columns = std::mem::replace(&mut worker.columns, vec![]);
            columns.clear();
            let pruned = chain.members.iter().any(|&m| self.nodes[m].action.row_columns(task, &mut columns));
            if !pruned {
                columns.extend(0..cols);
            }

            for &col in &columns {
                worker.record.set_second_task(col);
                for (k, &m) in chain.members.iter().enumerate() {
                    {
                        let mut ctx = TaskContext { run: self, worker: &mut *worker, task, col, rank };
                        self.nodes[m].action.perform_element(&mut ctx)?;
                    }
                    for &pos in &chain.element_outputs[k] {
                        worker.record.complete_update(pos);
                    }
                }
                self.after_element(worker, task, col, cols);
            }
            worker.columns = columns;
        }

        for (k, &m) in chain.members.iter().enumerate() {
            {
                let mut ctx = TaskContext { run: self, worker: &mut *worker, task, col: 0, rank };
                self.nodes[m].action.perform_task(&mut ctx)?;
            }
            for &pos in &chain.task_outputs[k] {
                worker.record.complete_update(pos);
            }
        }
        self.after_task(worker, task, rank);
        Ok(())
    }

    fn after_element(&self, worker: &mut Worker, row: usize, col: usize, cols: usize) {
        let values = self.step.values;
        let index = row * cols + col;
        for (s, slot) in self.chain.slots.iter().enumerate() {
            if slot.mode != OutputMode::MatrixElement {
                continue;
            }
            let pos = match slot.pos {
                Some(pos) => pos,
                None => continue,
            };
            match self.pass {
                Pass::Forward => if slot.stored {
                    worker.data[s][index] = worker.record.value(pos);
                },
                Pass::Gather => worker.gather(pos, values[slot.value].forces()[index]),
            }
            worker.record.clear_component(pos);
        }
    }

    fn after_task(&self, worker: &mut Worker, task: usize, rank: usize) {
        let values = self.step.values;
        for (s, slot) in self.chain.slots.iter().enumerate() {
            let pos = match slot.pos {
                Some(pos) => pos,
                None => continue,
            };
            let index = match slot.mode {
                OutputMode::PerTask => task,
                OutputMode::Compacted => rank,
                OutputMode::Reduced => {
                    if self.pass == Pass::Forward {
                        worker.data[s][0] += worker.record.value(pos);
                        if slot.has_derivatives {
                            let Worker { ref record, ref mut derivs, .. } = *worker;
                            for (i, d) in record.active_derivatives(pos) {
                                derivs[s][i] += d;
                            }
                        }
                    }
                    continue;
                },
                _ => continue,
            };
            match self.pass {
                Pass::Forward => if slot.stored || slot.mode == OutputMode::Compacted {
                    worker.data[s][index] = worker.record.value(pos);
                },
                Pass::Gather => if slot.has_derivatives {
                    worker.gather(pos, values[slot.value].forces()[index]);
                },
            }
        }
        if self.pass == Pass::Gather {
            worker.gather(self.chain.gather_component(), 1.0);
        }
    }
}

/// Decide which tasks of a chain run on this step.
///
/// `upstream` holds the filtered task lists of chains that feed this one over the
/// same task space. A task skipped upstream is skipped here too. The flag is true
/// when the result is narrower than the full task space.
pub(crate) fn select_tasks(
    chain: &Chain,
    nodes: &IndexVec<NodeId, Node>,
    step: &StepContext<'_>,
    upstream: &[&[usize]],
) -> FailResult<(Vec<usize>, bool)> {
    let ntasks = chain.space.ntasks();
    let mut flags = vec![false; ntasks];
    let mut selective = false;
    for &m in &chain.members {
        selective |= nodes[m].action.select_tasks(step, &mut flags)?;
    }
    if !selective {
        flags.iter_mut().for_each(|f| *f = true);
    }
    for &list in upstream {
        let mut keep = vec![false; ntasks];
        for &t in list.iter().filter(|&&t| t < ntasks) {
            keep[t] = true;
        }
        for (f, k) in flags.iter_mut().zip(keep) {
            *f &= k;
        }
        selective = true;
    }
    let tasks = (0..ntasks).filter(|&t| flags[t]).collect();
    Ok((tasks, selective))
}

/// Chains that produce arguments of `c` over the same task space.
pub(crate) fn same_space_producers(
    c: ChainId,
    chains: &IndexVec<ChainId, Chain>,
    chain_of: &IndexVec<NodeId, ChainId>,
    nodes: &IndexVec<NodeId, Node>,
    values: &IndexVec<ValueId, Value>,
) -> Vec<ChainId> {
    let chain = &chains[c];
    let mut out = vec![];
    if chain.space == TaskSpace::None {
        return out;
    }
    for &m in &chain.members {
        for &arg in &nodes[m].arguments {
            let owner = match values[arg].owner {
                Some(owner) => owner,
                None => continue,
            };
            let up = chain_of[owner];
            if up != c && chains[up].space == chain.space && !out.contains(&up) {
                out.push(up);
            }
        }
    }
    out
}

/// Move the merged results of a forward pass into the values.
pub(crate) fn store_outputs(
    chain: &Chain,
    nodes: &IndexVec<NodeId, Node>,
    values: &mut IndexVec<ValueId, Value>,
    worker: &Worker,
    ntasks: usize,
) -> FailResult<()> {
    for (s, slot) in chain.slots.iter().enumerate() {
        let node = &nodes[slot.owner];
        let value = &mut values[slot.value];
        match slot.mode {
            OutputMode::PerTask | OutputMode::MatrixElement => {
                if !slot.stored {
                    continue;
                }
                value.data.copy_from_slice(&worker.data[s]);
            },
            OutputMode::Reduced => {
                let (x, dx) = node.action.transform_reduction(slot.value, worker.data[s][0]);
                value.data[0] = x;
                if slot.has_derivatives {
                    for (dest, &d) in value.derivatives.iter_mut().zip(&worker.derivs[s]) {
                        *dest = dx * d;
                    }
                }
            },
            OutputMode::Accumulated => {
                value.data.copy_from_slice(&worker.data[s]);
                if slot.grid_ndim > 0 {
                    value.grid_gradients.copy_from_slice(&worker.grads[s]);
                }
            },
            OutputMode::Compacted => {
                value.resize(ntasks);
                value.data.copy_from_slice(&worker.data[s]);
            },
            OutputMode::Passive => {},
        }
        if let Some(bad) = value.data.iter().position(|x| !x.is_finite()) {
            return Err(numerical_error(&node.label, format!(
                "element {} of '{}' is not finite", bad, value.name,
            )));
        }
    }
    Ok(())
}
