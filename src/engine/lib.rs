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

//! Task-based evaluation of collective variables and their derivatives.
//!
//! Actions are arranged in a dependency graph. Actions that loop over the same
//! tasks are fused into chains, so that intermediate per-task values never need
//! to be stored. Every step runs a forward pass over the active chains and then
//! a backward pass that carries forces on outputs back to the atoms.

#[macro_use] extern crate log;
#[macro_use] extern crate failure;
#[macro_use] extern crate cvgraph_newtype_indices;
#[cfg(test)] #[macro_use] extern crate cvgraph_assert_close;

pub type FailResult<T> = Result<T, failure::Error>;

newtype_index!{
    /// Identifies a value of an `ActionGraph`.
    ValueId
}
newtype_index!{
    /// Identifies an action of an `ActionGraph`.
    NodeId
}
newtype_index!{
    ChainId
}

mod errors;
pub mod value;
mod multi_value;
mod layout;
mod action;
mod context;
mod graph;
mod chain;
mod forces;
mod engine;
pub mod checkpoint;
mod comm;
mod registry;

#[cfg(test)]
mod tests;

pub use crate::errors::{ConfigError, NumericalError, config_error, numerical_error};
pub use crate::value::{Value, ValueSpec, Shape, GridSpec, OutputMode, Periodicity, Storage};
pub use crate::multi_value::{MultiValue, UpdateState};
pub use crate::layout::{DerivativeLayout, LayoutBlock};
pub use crate::action::{Action, TaskSpace, StepContext, UpdateContext};
pub use crate::context::TaskContext;
pub use crate::graph::{GraphBuilder, NodeBuilder, ArgInfo, ActionGraph, GraphOptions};
pub use crate::graph::{POSITIONS, BOX, MASSES, CHARGES, ENERGY};
pub use crate::engine::{Engine, EngineOptions, Threading, StepOutput};
pub use crate::comm::{Communicator, SerialComm};
pub use crate::registry::{Registry, ActionEntry, Factory, Shortcut, build_graph};
