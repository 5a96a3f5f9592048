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

//! RMSD kernels against a fixed reference structure.

use crate::Pbc;

use std::cmp::Ordering;

use cvgraph_array_types::{V3, M33};
use failure::Error;
use nalgebra::Matrix4;

/// How a structure is compared against the reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RmsdKind {
    /// Centered, then optimally rotated (quaternion Kabsch).
    Optimal,
    /// Centered, without rotation.
    Simple,
    /// Compares distances between pairs of atoms, so needs no alignment.
    Drmsd,
}

impl std::str::FromStr for RmsdKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<RmsdKind, Error> {
        match s {
            "OPTIMAL" => Ok(RmsdKind::Optimal),
            "SIMPLE" => Ok(RmsdKind::Simple),
            "DRMSD" => Ok(RmsdKind::Drmsd),
            _ => bail!("unknown RMSD type '{}' (expected OPTIMAL, SIMPLE or DRMSD)", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RmsdOutput {
    pub value: f64,
    /// Derivative of the value with respect to each position.
    pub derivatives: Vec<V3>,
    /// Derivative with respect to the box, `-Σ pos ⊗ der` (or its pairwise equivalent).
    pub box_derivative: M33,
}

#[derive(Debug, Clone)]
pub struct RmsdReference {
    kind: RmsdKind,
    reference: Vec<V3>,
    centered: Vec<V3>,
    // (i, j, reference distance), for DRMSD
    pairs: Vec<(usize, usize, f64)>,
}

impl RmsdReference {
    /// `bond_length` is only used by DRMSD: pairs whose reference distance does
    /// not exceed it are left out of the comparison.
    pub fn new(kind: RmsdKind, reference: Vec<V3>, bond_length: f64) -> Result<RmsdReference, Error> {
        ensure!(reference.len() >= 2, "an RMSD reference needs at least 2 atoms");
        let centered = centered(&reference);

        let mut pairs = vec![];
        if kind == RmsdKind::Drmsd {
            for i in 0..reference.len() {
                for j in i + 1..reference.len() {
                    let d = (reference[j] - reference[i]).norm();
                    if d > bond_length {
                        pairs.push((i, j, d));
                    }
                }
            }
            ensure!(!pairs.is_empty(), "no DRMSD pairs are longer than the bond length {}", bond_length);
        }
        Ok(RmsdReference { kind, reference, centered, pairs })
    }

    #[inline] pub fn kind(&self) -> RmsdKind { self.kind }
    #[inline] pub fn natoms(&self) -> usize { self.reference.len() }
    #[inline] pub fn reference(&self) -> &[V3] { &self.reference }

    /// Compute the RMSD of `positions` from the reference.
    ///
    /// Only DRMSD uses `pbc`; the other kinds expect positions that have
    /// already been made whole.
    pub fn calc(&self, pbc: &Pbc, positions: &[V3]) -> Result<RmsdOutput, Error> {
        ensure!(
            positions.len() == self.natoms(),
            "RMSD got {} positions for a reference of {} atoms", positions.len(), self.natoms(),
        );

        let out = match self.kind {
            RmsdKind::Optimal => self.calc_aligned(positions, true)?,
            RmsdKind::Simple => self.calc_aligned(positions, false)?,
            RmsdKind::Drmsd => self.calc_drmsd(pbc, positions),
        };
        ensure!(out.value.is_finite(), "RMSD is not finite");
        Ok(out)
    }

    fn calc_aligned(&self, positions: &[V3], rotate: bool) -> Result<RmsdOutput, Error> {
        let n = positions.len() as f64;
        let current = centered(positions);
        let rot = match rotate {
            true => optimal_rotation(&self.centered, &current)?,
            false => M33::eye(),
        };

        // the rotation is optimal, so to first order it does not vary with the positions;
        // the centering term sums to zero.
        let residuals: Vec<V3> = zip_eq(&current, &self.centered)
            .map(|(&x, &r)| x - &rot * r)
            .collect();
        let msd = residuals.iter().map(|d| d.sqnorm()).sum::<f64>() / n;
        let rmsd = msd.sqrt();

        let derivatives: Vec<V3> = match rmsd > 0.0 {
            true => residuals.iter().map(|&d| d / (n * rmsd)).collect(),
            false => vec![V3::zero(); positions.len()],
        };
        let mut box_derivative = M33::zero();
        for (pos, der) in zip_eq(positions, &derivatives) {
            box_derivative -= pos.outer(der);
        }
        Ok(RmsdOutput { value: rmsd, derivatives, box_derivative })
    }

    fn calc_drmsd(&self, pbc: &Pbc, positions: &[V3]) -> RmsdOutput {
        let npairs = self.pairs.len() as f64;
        let vecs: Vec<V3> = self.pairs.iter()
            .map(|&(i, j, _)| pbc.distance(positions[i], positions[j]))
            .collect();
        let sum_sq: f64 = zip_eq(&self.pairs, &vecs)
            .map(|(&(_, _, d0), r)| (r.norm() - d0).powi(2))
            .sum();
        let value = (sum_sq / npairs).sqrt();

        let mut derivatives = vec![V3::zero(); positions.len()];
        let mut box_derivative = M33::zero();
        if value > 0.0 {
            for (&(i, j, d0), &r) in zip_eq(&self.pairs, &vecs) {
                let d = r.norm();
                let g = r * ((d - d0) / (d * npairs * value));
                derivatives[j] += g;
                derivatives[i] -= g;
                box_derivative -= r.outer(&g);
            }
        }
        RmsdOutput { value, derivatives, box_derivative }
    }
}

fn zip_eq<A, B>(a: A, b: B) -> impl Iterator<Item=(A::Item, B::Item)>
where A: IntoIterator, B: IntoIterator, A::IntoIter: ExactSizeIterator, B::IntoIter: ExactSizeIterator,
{
    let (a, b) = (a.into_iter(), b.into_iter());
    assert_eq!(a.len(), b.len());
    a.zip(b)
}

fn centered(positions: &[V3]) -> Vec<V3> {
    let n = positions.len() as f64;
    let center = positions.iter().fold(V3::zero(), |acc, p| acc + p) / n;
    positions.iter().map(|&p| p - center).collect()
}

/// Relative gap required between the two largest eigenvalues of the quaternion matrix.
const DEGENERACY_TOL: f64 = 1e-10;

/// The rotation `R` minimizing `Σ |target_i - R mobile_i|²` for centered inputs.
///
/// This is the leading eigenvector of Horn's 4x4 quaternion matrix. Fails when
/// that eigenvector is not unique, as it is for collinear structures.
pub fn optimal_rotation(mobile: &[V3], target: &[V3]) -> Result<M33, Error> {
    let mut h = M33::zero();
    for (q, p) in zip_eq(mobile, target) {
        h += q.outer(p);
    }

    let trace = h.trace();
    let k = Matrix4::new(
        trace, h[1][2] - h[2][1], h[2][0] - h[0][2], h[0][1] - h[1][0],
        h[1][2] - h[2][1], h[0][0] - h[1][1] - h[2][2], h[0][1] + h[1][0], h[0][2] + h[2][0],
        h[2][0] - h[0][2], h[0][1] + h[1][0], -h[0][0] + h[1][1] - h[2][2], h[1][2] + h[2][1],
        h[0][1] - h[1][0], h[0][2] + h[2][0], h[1][2] + h[2][1], -h[0][0] - h[1][1] + h[2][2],
    );
    let eigen = k.symmetric_eigen();
    ensure!(eigen.eigenvalues.iter().all(|x| x.is_finite()), "degenerate RMSD superposition: eigenvalues are not finite");

    let mut order = [0, 1, 2, 3];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b].partial_cmp(&eigen.eigenvalues[a]).unwrap_or(Ordering::Equal)
    });
    let (top, next) = (eigen.eigenvalues[order[0]], eigen.eigenvalues[order[1]]);
    let scale = eigen.eigenvalues.iter().map(|x| x.abs()).fold(0.0, f64::max);
    ensure!(
        top - next > DEGENERACY_TOL * scale,
        "degenerate RMSD superposition: the optimal rotation is not unique (eigenvalues {} and {})", top, next,
    );

    let q = eigen.eigenvectors.column(order[0]);
    let norm = q.norm();
    ensure!(norm > 0.0 && norm.is_finite(), "degenerate RMSD superposition: zero quaternion");
    Ok(quaternion_to_matrix([q[0] / norm, q[1] / norm, q[2] / norm, q[3] / norm]))
}

/// Rotation matrix of a unit quaternion `[w, x, y, z]`.
fn quaternion_to_matrix([w, x, y, z]: [f64; 4]) -> M33 {
    M33::from([
        [w * w + x * x - y * y - z * z, 2.0 * (x * y - w * z), 2.0 * (x * z + w * y)],
        [2.0 * (x * y + w * z), w * w - x * x + y * y - z * z, 2.0 * (y * z - w * x)],
        [2.0 * (x * z - w * y), 2.0 * (y * z + w * x), w * w - x * x - y * y + z * z],
    ])
}
