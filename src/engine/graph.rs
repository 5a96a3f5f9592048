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

//! Graph construction, chain formation and per-step scheduling.

use std::collections::{HashMap, HashSet};

use petgraph::Graph;
use petgraph::algo::{toposort, has_path_connecting, DfsSpace};
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};

use cvgraph_newtype_indices::{Idx, IndexVec};

use crate::{FailResult, ValueId, NodeId, ChainId};
use crate::action::{Action, TaskSpace};
use crate::errors::config_error;
use crate::layout::DerivativeLayout;
use crate::value::{Value, ValueSpec, Shape, OutputMode, Periodicity, Storage};

pub const POSITIONS: &str = "positions";
pub const BOX: &str = "box";
pub const MASSES: &str = "masses";
pub const CHARGES: &str = "charges";
pub const ENERGY: &str = "energy";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GraphOptions {
    /// Fuse compatible actions into a single loop over tasks.
    pub chaining: bool,
}

impl Default for GraphOptions {
    fn default() -> Self { GraphOptions { chaining: true } }
}

/// The values fed by the host.
#[derive(Debug, Copy, Clone)]
pub(crate) struct PutSlots {
    pub(crate) positions: ValueId,
    pub(crate) box_: ValueId,
    pub(crate) masses: ValueId,
    pub(crate) charges: ValueId,
    pub(crate) energy: ValueId,
}

impl PutSlots {
    pub(crate) fn contains(&self, id: ValueId) -> bool {
        [self.positions, self.box_, self.masses, self.charges, self.energy].contains(&id)
    }
}

pub(crate) struct Node {
    pub(crate) label: String,
    pub(crate) action: Box<dyn Action>,
    pub(crate) arguments: Vec<ValueId>,
    pub(crate) outputs: Vec<ValueId>,
    pub(crate) requested: bool,
}

/// How one output of a chain member is collected.
#[derive(Debug, Copy, Clone)]
pub(crate) struct OutputSlot {
    pub(crate) value: ValueId,
    pub(crate) owner: NodeId,
    pub(crate) mode: OutputMode,
    /// Component of the task record, if any.
    pub(crate) pos: Option<usize>,
    pub(crate) stored: bool,
    pub(crate) has_derivatives: bool,
    pub(crate) grid_ndim: usize,
}

/// Actions that share one loop over tasks.
pub(crate) struct Chain {
    pub(crate) members: Vec<NodeId>,
    pub(crate) space: TaskSpace,
    pub(crate) layout: DerivativeLayout,
    /// Record components, by stream position.
    pub(crate) components: Vec<ValueId>,
    pub(crate) component_of: HashMap<ValueId, usize>,
    pub(crate) slots: Vec<OutputSlot>,
    pub(crate) slot_of: HashMap<ValueId, usize>,
    /// Per member: components completed after each element.
    pub(crate) element_outputs: Vec<Vec<usize>>,
    /// Per member: components completed after each task.
    pub(crate) task_outputs: Vec<Vec<usize>>,
    pub(crate) constant: bool,
}

impl Chain {
    /// Scratch component used to collect forces in the backward pass.
    #[inline]
    pub(crate) fn gather_component(&self) -> usize { self.components.len() }

    #[inline]
    pub(crate) fn record_size(&self) -> usize { self.components.len() + 1 }
}

/// What an action sees of one of its arguments while it is constructed.
#[derive(Debug, Clone)]
pub struct ArgInfo {
    pub id: ValueId,
    pub name: String,
    pub shape: Shape,
    pub mode: OutputMode,
    pub periodicity: Periodicity,
    pub has_derivatives: bool,
    pub constant: bool,
}

impl ArgInfo {
    #[inline]
    pub fn len(&self) -> usize { self.shape.len() }

    /// Task space of an action applied to each element of this argument.
    pub fn elementwise_space(&self) -> TaskSpace {
        match (self.mode, &self.shape) {
            (OutputMode::MatrixElement, &Shape::Matrix(rows, cols)) => TaskSpace::Rows { rows, cols },
            (_, &Shape::Scalar) => TaskSpace::Single,
            _ => TaskSpace::Elements(self.len()),
        }
    }

    #[inline]
    pub fn is_matrix(&self) -> bool { self.mode == OutputMode::MatrixElement }
}

/// Accumulates nodes in definition order.
pub struct GraphBuilder {
    natoms: usize,
    values: IndexVec<ValueId, Value>,
    nodes: IndexVec<NodeId, Node>,
    by_name: HashMap<String, ValueId>,
    by_label: HashMap<String, NodeId>,
    puts: PutSlots,
    stored: HashSet<ValueId>,
}

/// Handed to an action's constructor.
pub struct NodeBuilder<'b> {
    label: &'b str,
    id: NodeId,
    natoms: usize,
    values: &'b mut IndexVec<ValueId, Value>,
    by_name: &'b mut HashMap<String, ValueId>,
    arguments: Vec<ValueId>,
    outputs: Vec<ValueId>,
}

impl GraphBuilder {
    pub fn new(natoms: usize) -> Self {
        let mut values = IndexVec::new();
        let mut by_name = HashMap::new();
        let mut put = |name: &str, spec: ValueSpec, constant: bool| {
            let id = values.push(Value::new(name.to_string(), None, spec));
            values[id].constant = constant;
            by_name.insert(name.to_string(), id);
            id
        };
        let passive = |shape| ValueSpec::new(shape, OutputMode::Passive);
        let puts = PutSlots {
            positions: put(POSITIONS, passive(Shape::Vector(3 * natoms)), false),
            box_: put(BOX, passive(Shape::Matrix(3, 3)), false),
            masses: put(MASSES, passive(Shape::Vector(natoms)).without_derivatives(), true),
            charges: put(CHARGES, passive(Shape::Vector(natoms)).without_derivatives(), true),
            energy: put(ENERGY, passive(Shape::Scalar), false),
        };
        GraphBuilder {
            natoms, values, by_name, puts,
            nodes: IndexVec::new(),
            by_label: HashMap::new(),
            stored: HashSet::new(),
        }
    }

    #[inline]
    pub fn natoms(&self) -> usize { self.natoms }

    pub fn has_label(&self, label: &str) -> bool { self.by_label.contains_key(label) }

    /// Construct a node. Its arguments must already exist.
    pub fn add_node<F>(&mut self, label: &str, build: F) -> FailResult<NodeId>
    where F: FnOnce(&mut NodeBuilder<'_>) -> FailResult<Box<dyn Action>>,
    {
        if label.is_empty() || label.contains('.') {
            return Err(config_error(label, "labels must be nonempty and cannot contain '.'"));
        }
        if self.by_label.contains_key(label) || self.by_name.contains_key(label) {
            return Err(config_error(label, "duplicate label"));
        }

        let id = self.nodes.next_index();
        let (action, arguments, outputs) = {
            let mut nb = NodeBuilder {
                label, id,
                natoms: self.natoms,
                values: &mut self.values,
                by_name: &mut self.by_name,
                arguments: vec![],
                outputs: vec![],
            };
            let action = build(&mut nb).map_err(|e| match e.downcast::<crate::ConfigError>() {
                Ok(e) => e.into(),
                Err(e) => config_error(label, e),
            })?;
            (action, nb.arguments, nb.outputs)
        };
        if outputs.is_empty() && action.task_space() != TaskSpace::None && !action.is_sink() {
            return Err(config_error(label, "action declared no outputs"));
        }
        trace!("node '{}' ({}): {} arguments, {} outputs", label, action.kind(), arguments.len(), outputs.len());

        self.by_label.insert(label.to_string(), id);
        let pushed = self.nodes.push(Node {
            label: label.to_string(),
            action, arguments, outputs,
            requested: false,
        });
        debug_assert_eq!(pushed, id);
        Ok(id)
    }

    fn lookup(&self, name: &str) -> FailResult<ValueId> {
        match self.by_name.get(name) {
            Some(&id) => Ok(id),
            None => Err(config_error(name, "no such value")),
        }
    }

    /// Keep a value materialized even if all of its consumers share its loop.
    pub fn mark_stored(&mut self, name: &str) -> FailResult<()> {
        let id = self.lookup(name)?;
        self.stored.insert(id);
        Ok(())
    }

    /// Ask for a value to be computed on every step, even with no consumers.
    pub fn request(&mut self, name: &str) -> FailResult<()> {
        let id = self.lookup(name)?;
        self.stored.insert(id);
        if let Some(owner) = self.values[id].owner {
            self.nodes[owner].requested = true;
        }
        Ok(())
    }

    pub fn build(self, options: GraphOptions) -> FailResult<ActionGraph> {
        let GraphBuilder { natoms, mut values, nodes, by_name, by_label, puts, stored } = self;

        let mut dag = Graph::<NodeId, ()>::new();
        for id in nodes.indices() {
            dag.add_node(id);
        }
        let mut consumers: IndexVec<ValueId, Vec<NodeId>> = IndexVec::from_elem_n(vec![], values.len());
        for (id, node) in nodes.iter_enumerated() {
            for &arg in &node.arguments {
                consumers[arg].push(id);
                if let Some(owner) = values[arg].owner {
                    dag.update_edge(node_index(owner), node_index(id), ());
                }
            }
        }

        let order: Vec<NodeId> = match toposort(&dag, None) {
            Ok(order) => order.into_iter().map(|ix| dag[ix]).collect(),
            Err(cycle) => {
                let label = &nodes[dag[cycle.node_id()]].label;
                return Err(config_error(label, "dependency cycle"));
            },
        };

        let chain_members = form_chains(&dag, &nodes, &values, &order, options);

        let mut chain_of = IndexVec::from_elem_n(ChainId::new(0), nodes.len());
        let mut chains: IndexVec<ChainId, Chain> = IndexVec::new();
        for members in chain_members {
            let chain_id = chains.next_index();
            for &m in &members {
                chain_of[m] = chain_id;
            }
            let space = members.iter()
                .map(|&m| nodes[m].action.task_space())
                .fold(nodes[members[0]].action.task_space(), |acc, s| acc.join(s));
            let constant = members.iter().all(|&m| nodes[m].action.is_constant());
            chains.push(Chain {
                members, space, constant,
                layout: DerivativeLayout::new(),
                components: vec![],
                component_of: HashMap::new(),
                slots: vec![],
                slot_of: HashMap::new(),
                element_outputs: vec![],
                task_outputs: vec![],
            });
        }

        // storage
        for (id, value) in values.iter_enumerated_mut() {
            let owner = match value.owner {
                Some(owner) => owner,
                None => continue,
            };
            let streamed = value.mode.is_streamable()
                && !stored.contains(&id)
                && !consumers[id].is_empty()
                && consumers[id].iter().all(|&c| chain_of[c] == chain_of[owner]);
            value.storage = match streamed {
                true => Storage::Streamed,
                false => Storage::Stored,
            };
        }

        for chain in chains.iter_mut() {
            plan_chain(chain, &nodes, &mut values, puts, natoms);
        }

        let order = order_chains(&nodes, &chains, &chain_of, &values)?;

        let has_sinks = nodes.iter().any(|n| n.action.is_sink() || n.requested);
        info!(
            "graph: {} nodes in {} chains; {} values ({} streamed)",
            nodes.len(), chains.len(), values.len(),
            values.iter().filter(|v| v.storage == Storage::Streamed).count(),
        );
        for &c in &order {
            let chain = &chains[c];
            debug!(
                "chain {}: [{}] over {:?}, {} derivatives",
                c,
                chain.members.iter().map(|&m| &nodes[m].label[..]).collect::<Vec<_>>().join(", "),
                chain.space,
                chain.layout.total(),
            );
        }

        Ok(ActionGraph {
            values, nodes, chains, chain_of, order, dag, by_name, by_label, puts, natoms, has_sinks,
        })
    }
}

impl<'b> NodeBuilder<'b> {
    #[inline] pub fn label(&self) -> &str { self.label }
    #[inline] pub fn natoms(&self) -> usize { self.natoms }

    /// A configuration error that names this node.
    pub fn error(&self, message: impl ToString) -> failure::Error
    { config_error(self.label, message) }

    /// Declare that the action reads a value.
    pub fn argument(&mut self, name: &str) -> FailResult<ArgInfo> {
        let id = match self.by_name.get(name) {
            Some(&id) => id,
            None => return Err(self.error(format!("unknown argument '{}'", name))),
        };
        if !self.arguments.contains(&id) {
            self.arguments.push(id);
        }
        let value = &self.values[id];
        Ok(ArgInfo {
            id,
            name: name.to_string(),
            shape: value.shape.clone(),
            mode: value.mode,
            periodicity: value.periodicity,
            has_derivatives: value.has_derivatives,
            constant: value.constant,
        })
    }

    /// Declare the output named after the label itself.
    pub fn output(&mut self, spec: ValueSpec) -> FailResult<ValueId> {
        let name = self.label.to_string();
        self.new_output(name, spec)
    }

    /// Declare the output `label.name`.
    pub fn component(&mut self, name: &str, spec: ValueSpec) -> FailResult<ValueId> {
        let name = format!("{}.{}", self.label, name);
        self.new_output(name, spec)
    }

    fn new_output(&mut self, name: String, spec: ValueSpec) -> FailResult<ValueId> {
        if self.by_name.contains_key(&name) {
            return Err(self.error(format!("value '{}' already has a writer", name)));
        }
        if spec.mode == OutputMode::Compacted && spec.has_derivatives {
            return Err(self.error("compacted outputs cannot carry derivatives"));
        }
        match (spec.mode, &spec.shape) {
            (OutputMode::MatrixElement, &Shape::Matrix(_, _)) => {},
            (OutputMode::MatrixElement, _) => return Err(self.error("matrix elements need a matrix shape")),
            (OutputMode::Reduced, shape) if shape.len() != 1 => {
                return Err(self.error("reduced outputs must be scalars"));
            },
            _ => {},
        }
        let id = self.values.push(Value::new(name.clone(), Some(self.id), spec));
        self.by_name.insert(name, id);
        self.outputs.push(id);
        Ok(id)
    }

    /// Fix the data of an output once and for all.
    pub fn set_constant(&mut self, id: ValueId, data: Vec<f64>) -> FailResult<()> {
        if !self.outputs.contains(&id) {
            return Err(self.error("(BUG) set_constant on a value owned by another node"));
        }
        let value = &mut self.values[id];
        if data.len() != value.len() {
            return Err(config_error(self.label, format!(
                "constant '{}' has {} elements but its shape holds {}", value.name, data.len(), value.len(),
            )));
        }
        value.data = data;
        value.constant = true;
        value.has_derivatives = false;
        Ok(())
    }
}

#[inline]
fn node_index(id: NodeId) -> NodeIndex { NodeIndex::new(id.index()) }

/// Group nodes (in topological order) into chains.
fn form_chains(
    dag: &Graph<NodeId, ()>,
    nodes: &IndexVec<NodeId, Node>,
    values: &IndexVec<ValueId, Value>,
    order: &[NodeId],
    options: GraphOptions,
) -> Vec<Vec<NodeId>> {
    let mut topo_pos = vec![0; nodes.len()];
    for (i, &n) in order.iter().enumerate() {
        topo_pos[n.index()] = i;
    }

    let mut chains: Vec<Vec<NodeId>> = vec![];
    let mut spaces: Vec<TaskSpace> = vec![];
    let mut chain_of: Vec<usize> = vec![usize::max_value(); nodes.len()];
    let mut space = DfsSpace::new(dag);
    let mut reaches = |a: NodeId, b: NodeId| {
        has_path_connecting(dag, node_index(a), node_index(b), Some(&mut space))
    };

    for &n in order {
        let node = &nodes[n];
        let action = &node.action;
        let my_space = action.task_space();

        let joinable = options.chaining
            && action.can_chain()
            && !action.needs_stored_arguments()
            && my_space != TaskSpace::None;

        let mut target = None;
        if joinable {
            let mut candidates: Vec<usize> = vec![];
            let mut others: Vec<NodeId> = vec![];
            for &arg in &node.arguments {
                let value = &values[arg];
                let owner = match value.owner {
                    Some(owner) => owner,
                    None => continue,
                };
                let c = chain_of[owner.index()];
                if value.mode.is_streamable() {
                    if !candidates.contains(&c) {
                        candidates.push(c);
                    }
                } else {
                    others.push(owner);
                }
            }

            let ok = (|| {
                if candidates.is_empty() {
                    return None;
                }
                // nothing non-streamable may come from a chain being joined
                if others.iter().any(|&o| candidates.contains(&chain_of[o.index()])) {
                    return None;
                }
                let mut joined = my_space;
                for &c in &candidates {
                    if !spaces[c].matches(joined) {
                        return None;
                    }
                    joined = spaces[c].join(joined);
                }
                // joining must not make the chain both upstream and downstream of another
                for &c in &candidates {
                    for &m in &chains[c] {
                        for &o in &others {
                            for &q in &chains[chain_of[o.index()]] {
                                if reaches(m, q) {
                                    return None;
                                }
                            }
                        }
                    }
                }
                for (i, &c1) in candidates.iter().enumerate() {
                    for &c2 in &candidates[i + 1..] {
                        for &m1 in &chains[c1] {
                            for &m2 in &chains[c2] {
                                if reaches(m1, m2) || reaches(m2, m1) {
                                    return None;
                                }
                            }
                        }
                    }
                }
                Some((candidates.clone(), joined))
            })();

            if let Some((candidates, joined)) = ok {
                let first = candidates[0];
                for &c in &candidates[1..] {
                    let moved = std::mem::replace(&mut chains[c], vec![]);
                    for &m in &moved {
                        chain_of[m.index()] = first;
                    }
                    chains[first].extend(moved);
                }
                chains[first].sort_by_key(|m| topo_pos[m.index()]);
                spaces[first] = joined;
                target = Some(first);
            }
        }

        match target {
            Some(c) => {
                chains[c].push(n);
                chain_of[n.index()] = c;
            },
            None => {
                chain_of[n.index()] = chains.len();
                chains.push(vec![n]);
                spaces.push(my_space);
            },
        }
    }
    chains.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Assign record components, output slots and the derivative layout.
fn plan_chain(
    chain: &mut Chain,
    nodes: &IndexVec<NodeId, Node>,
    values: &mut IndexVec<ValueId, Value>,
    puts: PutSlots,
    natoms: usize,
) {
    for &m in &chain.members {
        let mut element_outputs = vec![];
        let mut task_outputs = vec![];
        for &out in &nodes[m].outputs {
            let value = &values[out];
            let pos = match value.mode.uses_record() {
                true => {
                    let pos = chain.components.len();
                    chain.components.push(out);
                    chain.component_of.insert(out, pos);
                    match value.mode {
                        OutputMode::MatrixElement => element_outputs.push(pos),
                        _ => task_outputs.push(pos),
                    }
                    Some(pos)
                },
                false => None,
            };
            if value.mode != OutputMode::Passive {
                chain.slot_of.insert(out, chain.slots.len());
                chain.slots.push(OutputSlot {
                    value: out,
                    owner: m,
                    mode: value.mode,
                    pos,
                    stored: value.storage == Storage::Stored,
                    has_derivatives: value.has_derivatives,
                    grid_ndim: value.shape.grid().map_or(0, |g| g.ndim()),
                });
            }
        }
        chain.element_outputs.push(element_outputs);
        chain.task_outputs.push(task_outputs);
    }

    if chain.members.iter().any(|&m| nodes[m].action.uses_atoms()) {
        chain.layout.add_atoms(puts.positions, puts.box_, natoms);
    }
    for &m in &chain.members {
        for &arg in &nodes[m].arguments {
            let value = &values[arg];
            if value.mode.is_streamable() && chain.component_of.contains_key(&arg) {
                continue;
            }
            if value.constant || !value.has_derivatives {
                continue;
            }
            chain.layout.add_block(arg, value.len());
        }
    }

    let total = chain.layout.total();
    for slot in &chain.slots {
        if slot.mode == OutputMode::Reduced && slot.has_derivatives {
            values[slot.value].derivatives = vec![0.0; total];
        }
    }
}

fn order_chains(
    nodes: &IndexVec<NodeId, Node>,
    chains: &IndexVec<ChainId, Chain>,
    chain_of: &IndexVec<NodeId, ChainId>,
    values: &IndexVec<ValueId, Value>,
) -> FailResult<Vec<ChainId>> {
    let mut graph = Graph::<ChainId, ()>::new();
    for id in chains.indices() {
        graph.add_node(id);
    }
    for (id, node) in nodes.iter_enumerated() {
        for &arg in &node.arguments {
            if let Some(owner) = values[arg].owner {
                let (a, b) = (chain_of[owner], chain_of[id]);
                if a != b {
                    graph.update_edge(NodeIndex::new(a.index()), NodeIndex::new(b.index()), ());
                }
            }
        }
    }
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|ix| graph[ix]).collect()),
        Err(cycle) => {
            let chain = &chains[graph[cycle.node_id()]];
            bail!("(BUG) chain containing '{}' is part of a cycle", nodes[chain.members[0]].label)
        },
    }
}

/// A fully planned graph of actions.
pub struct ActionGraph {
    pub(crate) values: IndexVec<ValueId, Value>,
    pub(crate) nodes: IndexVec<NodeId, Node>,
    pub(crate) chains: IndexVec<ChainId, Chain>,
    pub(crate) chain_of: IndexVec<NodeId, ChainId>,
    pub(crate) order: Vec<ChainId>,
    pub(crate) dag: Graph<NodeId, ()>,
    pub(crate) by_name: HashMap<String, ValueId>,
    pub(crate) by_label: HashMap<String, NodeId>,
    pub(crate) puts: PutSlots,
    pub(crate) natoms: usize,
    pub(crate) has_sinks: bool,
}

impl ActionGraph {
    #[inline] pub fn natoms(&self) -> usize { self.natoms }
    #[inline] pub fn num_nodes(&self) -> usize { self.nodes.len() }
    #[inline] pub fn num_chains(&self) -> usize { self.chains.len() }

    pub fn value_id(&self, name: &str) -> Option<ValueId> { self.by_name.get(name).cloned() }

    pub fn value(&self, name: &str) -> Option<&Value>
    { self.value_id(name).map(|id| &self.values[id]) }

    pub fn values(&self) -> impl Iterator<Item=&Value> { self.values.iter() }

    pub fn node_id(&self, label: &str) -> Option<NodeId> { self.by_label.get(label).cloned() }

    pub fn node_label(&self, id: NodeId) -> &str { &self.nodes[id].label }

    pub fn chain_of(&self, label: &str) -> Option<ChainId>
    { self.node_id(label).map(|n| self.chain_of[n]) }

    /// Labels of the members of a chain, in execution order.
    pub fn chain_labels(&self, chain: ChainId) -> Vec<&str>
    { self.chains[chain].members.iter().map(|&m| &self.nodes[m].label[..]).collect() }

    pub(crate) fn is_put(&self, id: ValueId) -> bool { self.puts.contains(id) }

    /// Chains that must run on a step, in execution order.
    ///
    /// A chain runs if any of its members feeds (directly or not) a sink that
    /// is active on this step. Constant chains that already ran are skipped.
    pub(crate) fn active_chains(&self, step: u64, done: &IndexVec<ChainId, bool>) -> Vec<ChainId> {
        let mut active = IndexVec::from_elem_n(false, self.nodes.len());
        if !self.has_sinks {
            for id in self.nodes.indices() {
                active[id] = true;
            }
        } else {
            let mut pending: Vec<NodeId> = self.nodes.iter_enumerated()
                .filter(|&(_, n)| (n.action.is_sink() || n.requested) && n.action.is_active_on_step(step))
                .map(|(id, _)| id)
                .collect();

            let rev = Reversed(&self.dag);
            let mut dfs = Dfs::empty(rev);
            while let Some(start) = pending.pop() {
                dfs.move_to(node_index(start));
                while let Some(ix) = dfs.next(rev) {
                    let id = self.dag[ix];
                    if active[id] {
                        continue;
                    }
                    active[id] = true;
                    // a chain always runs whole, so its other members need their inputs too
                    for &mate in &self.chains[self.chain_of[id]].members {
                        if !active[mate] {
                            pending.push(mate);
                        }
                    }
                }
            }
        }

        self.order.iter().cloned()
            .filter(|&c| self.chains[c].members.iter().any(|&m| active[m]))
            .filter(|&c| !(self.chains[c].constant && done[c]))
            .collect()
    }
}
