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

//! Lookup from action names to constructors.

use std::collections::{BTreeMap, HashMap};

use petgraph::Graph;
use petgraph::algo::toposort;

use crate::FailResult;
use crate::action::Action;
use crate::errors::config_error;
use crate::graph::{ActionGraph, GraphBuilder, GraphOptions, NodeBuilder};

/// One entry of a graph description.
pub trait ActionEntry {
    fn label(&self) -> &str;
    fn action_name(&self) -> &str;
    /// Names of every value the entry reads.
    fn argument_names(&self) -> Vec<String>;
}

pub type Factory<S> = Box<dyn Fn(&mut NodeBuilder<'_>, &S) -> FailResult<Box<dyn Action>> + Send + Sync>;

/// Expands an entry into several, or returns `None` to leave it alone.
pub type Shortcut<S> = Box<dyn Fn(&S) -> FailResult<Option<Vec<S>>> + Send + Sync>;

pub struct Registry<S> {
    factories: BTreeMap<String, Factory<S>>,
    shortcuts: BTreeMap<String, Shortcut<S>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Registry { factories: BTreeMap::new(), shortcuts: BTreeMap::new() }
    }
}

impl<S: ActionEntry> Registry<S> {
    pub fn new() -> Self { Self::default() }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where F: Fn(&mut NodeBuilder<'_>, &S) -> FailResult<Box<dyn Action>> + Send + Sync + 'static,
    {
        let old = self.factories.insert(name.to_string(), Box::new(factory));
        assert!(old.is_none(), "(BUG) action {} registered twice", name);
    }

    pub fn register_shortcut<F>(&mut self, name: &str, shortcut: F)
    where F: Fn(&S) -> FailResult<Option<Vec<S>>> + Send + Sync + 'static,
    {
        let old = self.shortcuts.insert(name.to_string(), Box::new(shortcut));
        assert!(old.is_none(), "(BUG) shortcut for {} registered twice", name);
    }

    pub fn contains(&self, name: &str) -> bool { self.factories.contains_key(name) }

    pub fn names(&self) -> impl Iterator<Item=&str> { self.factories.keys().map(|s| &s[..]) }

    /// Replace every entry that has a shortcut with its expansion.
    pub fn expand(&self, entries: &[S]) -> FailResult<Vec<S>>
    where S: Clone,
    {
        let mut out = vec![];
        for entry in entries {
            let expanded = match self.shortcuts.get(entry.action_name()) {
                Some(shortcut) => shortcut(entry)?,
                None => None,
            };
            match expanded {
                Some(entries) => out.extend(entries),
                None => out.push(entry.clone()),
            }
        }
        Ok(out)
    }

    fn construct(&self, builder: &mut GraphBuilder, entry: &S) -> FailResult<()> {
        let factory = match self.factories.get(entry.action_name()) {
            Some(factory) => factory,
            None => return Err(config_error(entry.label(), format!("unknown action '{}'", entry.action_name()))),
        };
        builder.add_node(entry.label(), |nb| factory(nb, entry))?;
        Ok(())
    }
}

/// Build a graph from entries given in any order.
///
/// `requested` names values that must be computed on every step.
pub fn build_graph<S: ActionEntry + Clone>(
    registry: &Registry<S>,
    entries: &[S],
    natoms: usize,
    requested: &[String],
    options: GraphOptions,
) -> FailResult<ActionGraph> {
    let entries = registry.expand(entries)?;

    // construct producers before consumers
    let mut deps = Graph::<usize, ()>::new();
    let mut by_label = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let ix = deps.add_node(i);
        if by_label.insert(entry.label(), ix).is_some() {
            return Err(config_error(entry.label(), "duplicate label"));
        }
    }
    for entry in &entries {
        for arg in entry.argument_names() {
            let producer = arg.split('.').next().unwrap_or(&arg[..]);
            if let Some(&from) = by_label.get(producer) {
                deps.update_edge(from, by_label[entry.label()], ());
            }
        }
    }
    let order = match toposort(&deps, None) {
        Ok(order) => order,
        Err(cycle) => {
            return Err(config_error(entries[deps[cycle.node_id()]].label(), "dependency cycle"));
        },
    };

    let mut builder = GraphBuilder::new(natoms);
    for ix in order {
        registry.construct(&mut builder, &entries[deps[ix]])?;
    }
    for name in requested {
        builder.request(name)?;
    }
    builder.build(options)
}
