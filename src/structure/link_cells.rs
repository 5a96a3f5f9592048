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
use failure::Error;

const NIL: usize = usize::MAX;

/// Buckets atoms into cells at least one cutoff wide, so that neighbor
/// candidates of an atom are confined to the 27 surrounding cells.
///
/// Cells are stored as head/next linked lists. With periodicity the cells
/// tile the box in fractional coordinates; without it they tile the
/// bounding box of the atoms.
#[derive(Debug, Clone)]
pub struct LinkCells {
    pbc: Pbc,
    cutoff: f64,
    ncells: [usize; 3],
    // origin and cell lengths for the non-periodic case
    origin: V3,
    cell_lengths: V3,
    head: Vec<usize>,
    next: Vec<usize>,
    cell_of: Vec<[usize; 3]>,
}

impl LinkCells {
    pub fn new(pbc: &Pbc, cutoff: f64, positions: &[V3]) -> Result<LinkCells, Error> {
        ensure!(cutoff > 0.0 && cutoff.is_finite(), "link cell cutoff must be positive (got {})", cutoff);
        pbc.check_cutoff(cutoff)?;

        let limit = usize::max(1, positions.len());
        let fit = |width: f64| usize::max(1, f64::min((width / cutoff).floor(), limit as f64) as usize);

        let mut origin = V3::zero();
        let mut cell_lengths = V3([1.0; 3]);
        let ncells = match pbc.lattice() {
            Some(lattice) => {
                let widths = lattice.perpendicular_widths();
                cap_cells(per_axis(|k| fit(widths[k])), limit)
            },
            None => {
                let (lo, hi) = bounding_box(positions);
                origin = lo;
                let extent = hi - lo;
                let ncells = cap_cells(per_axis(|k| fit(extent[k])), limit);
                cell_lengths = V3::from_fn(|k| extent[k] / ncells[k] as f64);
                ncells
            },
        };

        let mut cells = LinkCells {
            pbc: pbc.clone(),
            cutoff,
            ncells,
            origin,
            cell_lengths,
            head: vec![NIL; ncells[0] * ncells[1] * ncells[2]],
            next: vec![NIL; positions.len()],
            cell_of: Vec::with_capacity(positions.len()),
        };

        for (atom, &pos) in positions.iter().enumerate() {
            let cell = cells.cell_coords(pos);
            let flat = cells.flat_index(cell);
            cells.cell_of.push(cell);
            cells.next[atom] = cells.head[flat];
            cells.head[flat] = atom;
        }
        trace!("link cells: {:?} cells for {} atoms", ncells, positions.len());
        Ok(cells)
    }

    #[inline]
    pub fn cutoff(&self) -> f64 { self.cutoff }

    #[inline]
    pub fn ncells(&self) -> [usize; 3] { self.ncells }

    fn cell_coords(&self, pos: V3) -> [usize; 3] {
        let scaled = match self.pbc.lattice() {
            Some(_) => {
                let frac = self.pbc.to_frac(pos);
                V3::from_fn(|k| (frac[k] - frac[k].floor()) * self.ncells[k] as f64)
            },
            None => V3::from_fn(|k| match self.cell_lengths[k] > 0.0 {
                true => (pos[k] - self.origin[k]) / self.cell_lengths[k],
                false => 0.0,
            }),
        };
        // clamp handles both the upper boundary and rounding at 1.0
        per_axis(|k| usize::min(self.ncells[k] - 1, scaled[k].max(0.0) as usize))
    }

    #[inline]
    fn flat_index(&self, [a, b, c]: [usize; 3]) -> usize
    { (a * self.ncells[1] + b) * self.ncells[2] + c }

    /// Flat indices of the cells surrounding a cell (including itself), without duplicates.
    fn surrounding_cells(&self, cell: [usize; 3]) -> Vec<usize> {
        let periodic = self.pbc.is_periodic();
        let mut out = Vec::with_capacity(27);
        for da in -1i64..=1 {
            for db in -1i64..=1 {
                for dc in -1i64..=1 {
                    let mut coords = [0; 3];
                    let mut in_range = true;
                    for (k, &d) in [da, db, dc].iter().enumerate() {
                        let n = self.ncells[k] as i64;
                        let x = cell[k] as i64 + d;
                        coords[k] = match (periodic, 0 <= x && x < n) {
                            (_, true) => x as usize,
                            (true, false) => x.rem_euclid(n) as usize,
                            (false, false) => { in_range = false; 0 },
                        };
                    }
                    if in_range {
                        out.push(self.flat_index(coords));
                    }
                }
            }
        }
        // with fewer than 3 cells along an axis, wrapping visits cells twice
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Call a function on every atom that shares or borders the cell of `atom`.
    ///
    /// This includes `atom` itself. Candidates are not filtered by distance.
    pub fn for_each_candidate(&self, atom: usize, mut f: impl FnMut(usize)) {
        for cell in self.surrounding_cells(self.cell_of[atom]) {
            let mut j = self.head[cell];
            while j != NIL {
                f(j);
                j = self.next[j];
            }
        }
    }

    /// Atoms strictly within the cutoff of `atom` (excluding itself), in ascending order.
    pub fn neighbors(&self, atom: usize, positions: &[V3]) -> Vec<usize> {
        let cutoff_sq = self.cutoff * self.cutoff;
        let mut out = vec![];
        self.for_each_candidate(atom, |j| {
            if j != atom && self.pbc.distance(positions[atom], positions[j]).sqnorm() < cutoff_sq {
                out.push(j);
            }
        });
        out.sort_unstable();
        out
    }

    /// Every pair `(i, j)` with `i < j` strictly within the cutoff, sorted.
    pub fn pairs(&self, positions: &[V3]) -> Vec<(usize, usize)> {
        let mut out = vec![];
        for i in 0..positions.len() {
            out.extend(self.neighbors(i, positions).into_iter().filter(|&j| i < j).map(|j| (i, j)));
        }
        out
    }
}

#[inline]
fn per_axis(mut f: impl FnMut(usize) -> usize) -> [usize; 3]
{ [f(0), f(1), f(2)] }

/// Merge cells until there are at most `limit` of them.
///
/// Cells only ever grow, so they remain at least one cutoff wide.
fn cap_cells(mut ncells: [usize; 3], limit: usize) -> [usize; 3] {
    let total = |n: &[usize; 3]| n.iter().fold(1u128, |acc, &x| acc.saturating_mul(x as u128));
    while total(&ncells) > limit as u128 {
        let k = (0..3).max_by_key(|&k| ncells[k]).unwrap_or(0);
        ncells[k] = usize::max(1, ncells[k] / 2);
    }
    ncells
}

fn bounding_box(positions: &[V3]) -> (V3, V3) {
    if positions.is_empty() {
        return (V3::zero(), V3::zero());
    }
    let mut lo = positions[0];
    let mut hi = positions[0];
    for pos in positions {
        for k in 0..3 {
            lo[k] = lo[k].min(pos[k]);
            hi[k] = hi[k].max(pos[k]);
        }
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{brute_force_pairs, Lattice};
    use cvgraph_array_types::M33;

    fn random_positions(n: usize, scale: f64) -> Vec<V3> {
        (0..n).map(|_| V3::from_fn(|_| ::rand::random::<f64>() * scale)).collect()
    }

    #[test]
    fn matches_brute_force_orthorhombic() {
        let pbc = Pbc::new(&M33::diag(&[10.0, 12.0, 7.0])).unwrap();
        // some atoms outside the box, to test wrapping
        let positions = random_positions(200, 14.0);
        for &cutoff in &[0.9, 2.2, 3.5] {
            let cells = LinkCells::new(&pbc, cutoff, &positions).unwrap();
            assert_eq!(cells.pairs(&positions), brute_force_pairs(&pbc, cutoff, &positions));
        }
    }

    #[test]
    fn matches_brute_force_skewed() {
        let lattice = Lattice::from(&[[9.0, 0.0, 0.0], [2.5, 8.0, 0.0], [-1.0, 1.5, 9.5]]);
        let pbc = Pbc::from_lattice(&lattice);
        let positions = random_positions(150, 9.0);
        for &cutoff in &[1.5, 3.0] {
            let cells = LinkCells::new(&pbc, cutoff, &positions).unwrap();
            assert_eq!(cells.pairs(&positions), brute_force_pairs(&pbc, cutoff, &positions));
        }
    }

    #[test]
    fn matches_brute_force_without_pbc() {
        let pbc = Pbc::none();
        let positions = random_positions(150, 8.0);
        let cells = LinkCells::new(&pbc, 1.7, &positions).unwrap();
        assert_eq!(cells.pairs(&positions), brute_force_pairs(&pbc, 1.7, &positions));
    }

    #[test]
    fn pair_at_cutoff_is_excluded() {
        let pbc = Pbc::none();
        let positions = vec![V3([0.0, 0.0, 0.0]), V3([1.5, 0.0, 0.0]), V3([0.0, 1.0, 0.0])];
        let cells = LinkCells::new(&pbc, 1.5, &positions).unwrap();
        assert_eq!(cells.neighbors(0, &positions), vec![2]);
    }

    #[test]
    fn sparse_cloud_gets_few_cells() {
        let positions = vec![V3([0.0, 0.0, 0.0]), V3([0.5, 0.0, 0.0]), V3([1e6, 1e6, 1e6])];
        let cells = LinkCells::new(&Pbc::none(), 1.0, &positions).unwrap();
        let [a, b, c] = cells.ncells();
        assert!(a * b * c <= positions.len(), "{:?}", cells.ncells());
        assert_eq!(cells.pairs(&positions), vec![(0, 1)]);

        let pbc = Pbc::new(&M33::diag(&[1e5, 1e5, 1e5])).unwrap();
        let positions = random_positions(20, 3.0);
        let cells = LinkCells::new(&pbc, 1e-3, &positions).unwrap();
        let [a, b, c] = cells.ncells();
        assert!(a * b * c <= positions.len(), "{:?}", cells.ncells());
        assert_eq!(cells.pairs(&positions), brute_force_pairs(&pbc, 1e-3, &positions));
    }

    #[test]
    fn cutoff_too_large() {
        let pbc = Pbc::new(&M33::diag(&[4.0, 4.0, 4.0])).unwrap();
        let positions = random_positions(5, 4.0);
        let err = LinkCells::new(&pbc, 2.5, &positions).unwrap_err();
        assert!(err.downcast_ref::<crate::CutoffTooLarge>().is_some());
    }
}
