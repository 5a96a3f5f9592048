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

use std::io::{Read, Write};

use slice_of_array::prelude::*;

use cvgraph_array_types::{V3, M33, Unvee, v3_vec_from_flat};
use cvgraph_newtype_indices::IndexVec;
use cvgraph_structure::Pbc;

use crate::{FailResult, ChainId};
use crate::action::{StepInputs, TaskSpace, UpdateContext};
use crate::chain::{self, ChainRun, Pass};
use crate::checkpoint;
use crate::comm::{Communicator, SerialComm};
use crate::forces;
use crate::graph::ActionGraph;
use crate::value::{Value, Storage};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Threading {
    Serial,
    Rayon,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub threading: Threading,
}

impl Default for EngineOptions {
    fn default() -> Self { EngineOptions { threading: Threading::Serial } }
}

/// Everything a step hands back to the host.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Force on each atom.
    pub forces: Vec<V3>,
    /// Force on the box, in the row-major convention of box derivatives.
    pub virial: M33,
    /// Sum of the bias energies.
    pub bias: f64,
    /// Force on the potential energy put slot.
    pub energy_force: f64,
}

/// Drives an `ActionGraph` one step at a time.
pub struct Engine<C: Communicator = SerialComm> {
    graph: ActionGraph,
    comm: C,
    options: EngineOptions,
    step: u64,
    positions: Option<Vec<V3>>,
    pbc: Option<Pbc>,
    pub(crate) active: Option<Vec<ChainId>>,
    task_lists: IndexVec<ChainId, Vec<usize>>,
    /// Whether the task list of a chain was narrowed on its last run.
    filtered: IndexVec<ChainId, bool>,
    constants_done: IndexVec<ChainId, bool>,
}

impl Engine<SerialComm> {
    pub fn new(graph: ActionGraph, options: EngineOptions) -> Self
    { Engine::with_communicator(graph, options, SerialComm) }
}

impl<C: Communicator> Engine<C> {
    pub fn with_communicator(graph: ActionGraph, options: EngineOptions, comm: C) -> Self {
        let nchains = graph.num_chains();
        Engine {
            graph, comm, options,
            step: 0,
            positions: None,
            pbc: None,
            active: None,
            task_lists: IndexVec::from_elem_n(vec![], nchains),
            filtered: IndexVec::from_elem_n(false, nchains),
            constants_done: IndexVec::from_elem_n(false, nchains),
        }
    }

    #[inline] pub fn graph(&self) -> &ActionGraph { &self.graph }
    #[inline] pub fn step(&self) -> u64 { self.step }

    pub fn set_step(&mut self, step: u64) {
        self.step = step;
        self.active = None;
    }

    pub fn put_positions(&mut self, positions: &[V3]) -> FailResult<()> {
        let natoms = self.graph.natoms;
        ensure!(
            positions.len() == natoms,
            "expected positions for {} atoms, got {}", natoms, positions.len(),
        );
        let id = self.graph.puts.positions;
        self.graph.values[id].data.copy_from_slice(positions.unvee_ref().flat());
        self.positions = Some(positions.to_vec());
        Ok(())
    }

    /// Set the box, with lattice vectors as rows. An all-zero matrix means no periodicity.
    pub fn put_box(&mut self, cell: &M33) -> FailResult<()> {
        let pbc = Pbc::new(cell)?;
        let id = self.graph.puts.box_;
        self.graph.values[id].data.copy_from_slice(&cell.flat());
        self.pbc = Some(pbc);
        Ok(())
    }

    pub fn put_masses(&mut self, masses: &[f64]) -> FailResult<()> {
        let id = self.graph.puts.masses;
        self.put_per_atom(id, masses)
    }

    pub fn put_charges(&mut self, charges: &[f64]) -> FailResult<()> {
        let id = self.graph.puts.charges;
        self.put_per_atom(id, charges)
    }

    fn put_per_atom(&mut self, id: crate::ValueId, data: &[f64]) -> FailResult<()> {
        let value = &mut self.graph.values[id];
        ensure!(
            data.len() == value.len(),
            "expected {} {}, got {}", value.len(), value.name, data.len(),
        );
        value.data.copy_from_slice(data);
        Ok(())
    }

    pub fn put_energy(&mut self, energy: f64) {
        let id = self.graph.puts.energy;
        self.graph.values[id].data[0] = energy;
    }

    /// Decide which chains run on this step.
    pub fn prepare_dependencies(&mut self) -> FailResult<()> {
        ensure!(self.positions.is_some(), "positions were not provided before step {}", self.step);
        ensure!(self.pbc.is_some(), "the box was not provided before step {}", self.step);
        let active = self.graph.active_chains(self.step, &self.constants_done);
        debug!("step {}: {} of {} chains active", self.step, active.len(), self.graph.num_chains());
        self.active = Some(active);
        Ok(())
    }

    fn active(&mut self) -> FailResult<Vec<ChainId>> {
        if self.active.is_none() {
            self.prepare_dependencies()?;
        }
        Ok(self.active.clone().unwrap_or_default())
    }

    /// Run the forward pass of every active chain.
    pub fn just_calculate(&mut self) -> FailResult<()> {
        let active = self.active()?;
        for value in self.graph.values.iter_mut() {
            value.clear_forces();
        }

        let Engine {
            ref mut graph, ref comm, ref mut task_lists, ref mut filtered, ref mut constants_done,
            ref positions, ref pbc, ref options, step, ..
        } = *self;
        let inputs = step_inputs(step, positions, pbc, options)?;
        for &c in &active {
            let ActionGraph { ref mut nodes, ref mut values, ref chains, ref chain_of, .. } = *graph;
            let chain = &chains[c];

            for &m in &chain.members {
                nodes[m].action.prepare(&inputs.with_values(values))?;
            }
            if chain.space == TaskSpace::None {
                constants_done[c] = chain.constant;
                continue;
            }

            let producers = chain::same_space_producers(c, chains, chain_of, nodes, values);
            let upstream = producers.iter()
                .filter(|&&up| filtered[up])
                .map(|&up| &task_lists[up][..])
                .collect::<Vec<_>>();
            let (tasks, narrowed) = chain::select_tasks(chain, nodes, &inputs.with_values(values), &upstream)?;
            let mut worker = {
                let run = ChainRun { chain, nodes, step: inputs.with_values(values), pass: Pass::Forward };
                run.run(&tasks, inputs.parallel)?
            };
            for buffer in worker.buffers_mut() {
                comm.sum_in_place(buffer);
            }
            chain::store_outputs(chain, nodes, values, &worker, tasks.len())?;

            task_lists[c] = tasks;
            filtered[c] = narrowed;
            constants_done[c] = chain.constant;
        }
        Ok(())
    }

    /// Seed bias forces and carry all forces back to the atoms.
    pub fn backward_propagate(&mut self) -> FailResult<StepOutput> {
        let active = self.active()?;
        let Engine {
            ref mut graph, ref comm, ref task_lists,
            ref positions, ref pbc, ref options, step, ..
        } = *self;
        let inputs = step_inputs(step, positions, pbc, options)?;
        let ActionGraph { ref nodes, ref mut values, ref chains, puts, .. } = *graph;

        let mut bias = 0.0;
        for &c in &active {
            for &m in &chains[c].members {
                if nodes[m].action.is_bias() {
                    for &out in &nodes[m].outputs {
                        bias += values[out].scalar();
                        values[out].add_force(0, -1.0);
                    }
                }
            }
        }

        for &c in active.iter().rev() {
            forces::backward_chain(&chains[c], nodes, values, inputs, &task_lists[c], comm)?;
        }

        Ok(StepOutput {
            forces: v3_vec_from_flat(values[puts.positions].forces()),
            virial: M33::from_flat(values[puts.box_].forces()),
            energy_force: values[puts.energy].forces()[0],
            bias,
        })
    }

    /// Run post-step hooks, such as running averages.
    pub fn update(&mut self) -> FailResult<()> {
        let active = self.active()?;
        let step = self.step;
        let ActionGraph { ref mut nodes, ref mut values, ref chains, .. } = self.graph;
        for &c in &active {
            for &m in &chains[c].members {
                let mut ctx = UpdateContext { step, values: &mut *values };
                nodes[m].action.update(&mut ctx)?;
            }
        }
        Ok(())
    }

    /// Do everything for one step.
    pub fn calc(&mut self) -> FailResult<StepOutput> {
        self.prepare_dependencies()?;
        self.just_calculate()?;
        let output = self.backward_propagate()?;
        self.update()?;
        Ok(output)
    }

    pub fn value(&self, name: &str) -> FailResult<&Value> {
        let value = match self.graph.value(name) {
            Some(value) => value,
            None => bail!("no value named '{}'", name),
        };
        ensure!(
            value.storage() == Storage::Stored,
            "'{}' only exists inside its loop; request it to read it", name,
        );
        Ok(value)
    }

    /// Tasks run by the chain containing an action on the last step.
    pub fn current_task_list(&self, label: &str) -> FailResult<&[usize]> {
        match self.graph.chain_of(label) {
            Some(chain) => Ok(&self.task_lists[chain]),
            None => bail!("no action labeled '{}'", label),
        }
    }

    /// Deposit a force on an element of a value, ahead of `backward_propagate`.
    pub fn add_force(&mut self, name: &str, index: usize, force: f64) -> FailResult<()> {
        let id = match self.graph.value_id(name) {
            Some(id) => id,
            None => bail!("no value named '{}'", name),
        };
        let value = &mut self.graph.values[id];
        ensure!(value.storage() == Storage::Stored, "cannot apply a force to '{}'; it is not stored", name);
        ensure!(index < value.len(), "index {} out of range for '{}' ({} elements)", index, name, value.len());
        value.add_force(index, force);
        Ok(())
    }

    pub fn write_checkpoint<W: Write>(&self, w: W) -> FailResult<()>
    { checkpoint::write(w, &self.graph) }

    pub fn read_checkpoint<R: Read>(&mut self, r: R) -> FailResult<()>
    { checkpoint::read(r, &mut self.graph) }
}

fn step_inputs<'a>(
    step: u64,
    positions: &'a Option<Vec<V3>>,
    pbc: &'a Option<Pbc>,
    options: &EngineOptions,
) -> FailResult<StepInputs<'a>> {
    let positions = match *positions {
        Some(ref positions) => positions,
        None => bail!("positions were not provided before step {}", step),
    };
    let pbc = match *pbc {
        Some(ref pbc) => pbc,
        None => bail!("the box was not provided before step {}", step),
    };
    Ok(StepInputs {
        step, pbc,
        positions: &positions[..],
        parallel: options.threading == Threading::Rayon,
    })
}
