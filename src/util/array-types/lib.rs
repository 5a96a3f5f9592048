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

//! Small fixed-size vector and matrix types used for cartesian geometry.

mod types;
mod ops;
mod methods_v;
mod methods_m;
mod conv;

pub use crate::types::{V3, M33};
pub use crate::methods_m::inv;
pub use crate::conv::{Envee, Unvee, v3_vec_from_flat};
