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

//! Periodic geometry: lattices, minimum images, neighbor search and RMSD kernels.

#[macro_use] extern crate log;
#[macro_use] extern crate failure;
#[cfg(test)] #[macro_use] extern crate cvgraph_assert_close;
#[cfg(test)] extern crate rand;

mod lattice;
mod pbc;
mod link_cells;
mod pairs;
pub mod rmsd;

//---------------------------
// public reexports; API

pub use crate::lattice::Lattice;
pub use crate::pbc::{Pbc, CutoffTooLarge};
pub use crate::link_cells::LinkCells;
pub use crate::pairs::brute_force_pairs;
pub use crate::rmsd::{RmsdKind, RmsdReference, RmsdOutput};
