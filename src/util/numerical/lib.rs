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

//! Numerical utilities shared by the engine and the actions.
//!
//! * Finite difference derivatives, used throughout the test suites to
//!   validate analytic derivatives.
//! * A sign-change bisection used to locate isocontours.

#[cfg(test)]
#[macro_use]
extern crate cvgraph_assert_close;

mod derivative;
mod root;

pub use crate::derivative::{DerivativeKind, slope, try_slope, gradient, try_gradient};
pub use crate::root::{bisect_sign_change, BisectSettings};
