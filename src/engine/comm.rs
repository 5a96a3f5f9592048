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

/// Reduction across cooperating processes.
///
/// Invoked on every buffer after a forward pass and on the force buffers of
/// the backward pass.
pub trait Communicator: Send + Sync {
    fn sum_in_place(&self, data: &mut [f64]);

    fn rank(&self) -> usize { 0 }

    fn size(&self) -> usize { 1 }
}

/// A single process.
#[derive(Debug, Default, Copy, Clone)]
pub struct SerialComm;

impl Communicator for SerialComm {
    #[inline]
    fn sum_in_place(&self, _data: &mut [f64]) {}
}
