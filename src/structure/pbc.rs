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

use crate::Lattice;

use cvgraph_array_types::{V3, M33};
use failure::Error;
use ordered_float::OrderedFloat;

/// The cutoff of a neighbor search was too large for the periodic box.
#[derive(Debug, Fail)]
#[fail(display = "cutoff {} exceeds half the minimum perpendicular box width ({})", cutoff, max_cutoff)]
pub struct CutoffTooLarge {
    pub cutoff: f64,
    pub max_cutoff: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    NoPbc,
    Orthorhombic([f64; 3]),
    /// Cartesian images of the 27 lattice points around the origin.
    Generic(Vec<V3>),
}

/// Periodic boundary conditions, with a minimum image convention.
///
/// An all-zero box means no periodicity.
#[derive(Debug, Clone, PartialEq)]
pub struct Pbc {
    lattice: Option<Lattice>,
    kind: Kind,
}

impl Default for Pbc {
    fn default() -> Pbc { Pbc::none() }
}

impl Pbc {
    pub fn none() -> Pbc
    { Pbc { lattice: None, kind: Kind::NoPbc } }

    /// Construct from a box matrix whose rows are lattice vectors.
    pub fn new(matrix: &M33) -> Result<Pbc, Error> {
        if matrix.iter().all(|row| row.iter().all(|&x| x == 0.0)) {
            return Ok(Pbc::none());
        }
        ensure!(matrix.iter().all(|row| row.iter().all(|x| x.is_finite())), "box contains non-finite values");
        let det = matrix.det();
        ensure!(det.abs() > 1e-12 * matrix.flat().iter().map(|x| x.abs()).fold(0.0, f64::max).powi(3),
            "box is singular (determinant {})", det);
        Ok(Pbc::from_lattice(&Lattice::new(matrix)))
    }

    pub fn from_lattice(lattice: &Lattice) -> Pbc {
        let kind = match lattice.is_orthorhombic() {
            true => {
                let m = lattice.matrix();
                Kind::Orthorhombic([m[0][0].abs(), m[1][1].abs(), m[2][2].abs()])
            },
            false => {
                let mut images = Vec::with_capacity(27);
                for &fa in &[-1.0, 0.0, 1.0] {
                    for &fb in &[-1.0, 0.0, 1.0] {
                        for &fc in &[-1.0, 0.0, 1.0] {
                            images.push(V3([fa, fb, fc]) * lattice);
                        }
                    }
                }
                Kind::Generic(images)
            },
        };
        Pbc { lattice: Some(lattice.clone()), kind }
    }

    #[inline]
    pub fn is_periodic(&self) -> bool
    { self.lattice.is_some() }

    #[inline]
    pub fn lattice(&self) -> Option<&Lattice>
    { self.lattice.as_ref() }

    /// The minimum image of `b - a`.
    #[inline]
    pub fn distance(&self, a: V3, b: V3) -> V3
    { self.apply(b - a) }

    /// Replace a displacement with its shortest periodic image.
    pub fn apply(&self, d: V3) -> V3 {
        match (&self.kind, &self.lattice) {
            (Kind::NoPbc, _) | (_, None) => d,
            (Kind::Orthorhombic(lengths), _) => {
                V3::from_fn(|k| d[k] - lengths[k] * (d[k] / lengths[k]).round())
            },
            (Kind::Generic(images), Some(lattice)) => {
                // reduce into the cell around the origin, then check neighboring images
                let frac = (d / lattice).map(|x| x - x.round());
                let reduced = frac * lattice;
                images.iter()
                    .map(|&image| reduced + image)
                    .min_by_key(|v| OrderedFloat(v.sqnorm()))
                    .unwrap_or(reduced)
            },
        }
    }

    /// Convert cartesian coordinates to fractional ones. (identity without periodicity)
    pub fn to_frac(&self, cart: V3) -> V3 {
        match &self.lattice {
            Some(lattice) => cart / lattice,
            None => cart,
        }
    }

    /// Smallest distance between opposite faces of the box.
    pub fn min_perpendicular_width(&self) -> Option<f64> {
        self.lattice.as_ref().map(|lattice| {
            let w = lattice.perpendicular_widths();
            w[0].min(w[1]).min(w[2])
        })
    }

    /// Verify that a neighbor search with this cutoff can rely on minimum images.
    pub fn check_cutoff(&self, cutoff: f64) -> Result<(), CutoffTooLarge> {
        match self.min_perpendicular_width() {
            None => Ok(()),
            Some(width) => {
                let max_cutoff = 0.5 * width;
                match cutoff <= max_cutoff {
                    true => Ok(()),
                    false => Err(CutoffTooLarge { cutoff, max_cutoff }),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthorhombic_minimum_image() {
        let pbc = Pbc::new(&M33::diag(&[4.0, 8.0, 12.0])).unwrap();
        assert_close!(abs=1e-12, pbc.apply(V3([1.0, 6.0, -9.0])), V3([1.0, -2.0, 3.0]));
        assert_close!(abs=1e-12, pbc.distance(V3([0.5, 0.0, 0.0]), V3([3.5, 0.0, 0.0])), V3([-1.0, 0.0, 0.0]));
    }

    #[test]
    fn generic_matches_brute_force() {
        for _ in 0..20 {
            let lattice = Lattice::random_skewed(6.0, 1.0);
            let pbc = Pbc::from_lattice(&lattice);
            let d = V3::from_fn(|_| (::rand::random::<f64>() - 0.5) * 30.0);

            // brute force over a generous range of images
            let mut best = d;
            for a in -6..=6 {
                for b in -6..=6 {
                    for c in -6..=6 {
                        let v = d + V3([a as f64, b as f64, c as f64]) * &lattice;
                        if v.sqnorm() < best.sqnorm() {
                            best = v;
                        }
                    }
                }
            }
            assert_close!(abs=1e-9, pbc.apply(d).norm(), best.norm());
        }
    }

    #[test]
    fn zero_box_is_not_periodic() {
        let pbc = Pbc::new(&M33::zero()).unwrap();
        assert!(!pbc.is_periodic());
        assert_eq!(pbc.apply(V3([100.0, 0.0, 0.0])), V3([100.0, 0.0, 0.0]));
        assert!(pbc.check_cutoff(1e6).is_ok());
    }

    #[test]
    fn singular_box_is_an_error() {
        let m = M33::from([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(Pbc::new(&m).is_err());
    }

    #[test]
    fn cutoff_check() {
        let pbc = Pbc::new(&M33::diag(&[4.0, 8.0, 12.0])).unwrap();
        assert!(pbc.check_cutoff(2.0).is_ok());
        let err = pbc.check_cutoff(2.0 + 1e-9).unwrap_err();
        assert_eq!(err.max_cutoff, 2.0);
    }
}
