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

use crate::Pbc;

use cvgraph_array_types::V3;

/// Every pair `(i, j)` with `i < j` strictly within the cutoff, sorted.
///
/// Quadratic in the number of atoms; `LinkCells` produces the same set.
pub fn brute_force_pairs(pbc: &Pbc, cutoff: f64, positions: &[V3]) -> Vec<(usize, usize)> {
    let cutoff_sq = cutoff * cutoff;
    let mut out = vec![];
    for i in 0..positions.len() {
        for j in i + 1..positions.len() {
            if pbc.distance(positions[i], positions[j]).sqnorm() < cutoff_sq {
                out.push((i, j));
            }
        }
    }
    out
}
