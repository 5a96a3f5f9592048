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

use std::ops::{Mul, Div};
use std::sync::Arc;

use cvgraph_array_types::{V3, M33};
use cvgraph_assert_close::CheckClose;

/// Lattice vectors of a periodic simulation box, with a precomputed inverse.
///
/// A `Lattice` is something that you multiply against fractional data to
/// produce cartesian data. Lattice vectors are the rows of the matrix.
#[derive(Debug, Clone)]
pub struct Lattice {
    matrix: Arc<M33>,
    inverse: Arc<M33>,
}

// Manual impl that doesn't compare the inverse.
impl PartialEq<Lattice> for Lattice {
    fn eq(&self, other: &Lattice) -> bool {
        let Lattice { ref matrix, inverse: _ } = *self;
        matrix == &other.matrix
    }
}

impl Lattice {
    /// Create a lattice from a matrix where the rows are lattice vectors.
    ///
    /// Panics on a singular matrix; see `Pbc::new` for the checked path.
    #[inline]
    pub fn new(matrix: &M33) -> Self {
        let inverse = Arc::new(matrix.inv());
        let matrix = Arc::new(*matrix);
        Lattice { matrix, inverse }
    }

    /// Matrix where lattice vectors are rows.
    #[inline]
    pub fn matrix(&self) -> &M33
    { &self.matrix }

    /// Get the (precomputed) inverse of the matrix where lattice vectors are rows.
    #[inline]
    pub fn inverse_matrix(&self) -> &M33
    { &self.inverse }

    #[inline]
    pub fn vectors(&self) -> &[V3; 3]
    { &self.matrix().0 }

    pub fn norms(&self) -> [f64; 3] {
        let v = self.vectors();
        [v[0].norm(), v[1].norm(), v[2].norm()]
    }

    /// Get the (positive) volume of the lattice cell.
    pub fn volume(&self) -> f64
    { self.matrix().det().abs() }

    /// Distances between opposite faces of the cell.
    ///
    /// Width `k` is the volume divided by the area of the face spanned by
    /// the other two vectors.
    pub fn perpendicular_widths(&self) -> [f64; 3] {
        let v = self.vectors();
        let volume = self.volume();
        [
            volume / v[1].cross(&v[2]).norm(),
            volume / v[2].cross(&v[0]).norm(),
            volume / v[0].cross(&v[1]).norm(),
        ]
    }

    /// Test whether the matrix is diagonal.
    pub fn is_orthorhombic(&self) -> bool {
        let m = self.matrix();
        (0..3).all(|r| (0..3).all(|c| r == c || m[r][c] == 0.0))
    }
}

/// Helper constructors
impl Lattice {
    /// The identity lattice.
    #[inline]
    pub fn eye() -> Self { Self::cubic(1.0) }

    #[inline]
    pub fn diagonal(&[x, y, z]: &[f64; 3]) -> Self { Self::orthorhombic(x, y, z) }

    /// A cubic lattice ((a, a, a), (90, 90, 90))
    #[inline]
    pub fn cubic(a: f64) -> Self { Self::orthorhombic(a, a, a) }

    /// An orthorhombic lattice ((a, b, c), (90, 90, 90))
    #[inline]
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self
    { Self::from(&[[a, 0., 0.], [0., b, 0.], [0., 0., c]]) }

    /// Generate a random lattice that is a small perturbation of a cube.
    #[cfg(test)]
    pub fn random_skewed(a: f64, skew: f64) -> Self {
        let mut m = M33::eye() * a;
        for r in 0..3 {
            for c in 0..3 {
                m[r][c] += (::rand::random::<f64>() - 0.5) * 2.0 * skew;
            }
        }
        Lattice::new(&m)
    }
}

/// Defaults to the identity matrix.
impl Default for Lattice {
    #[inline]
    fn default() -> Lattice { Lattice::eye() }
}

impl<'a> From<&'a [[f64; 3]; 3]> for Lattice {
    #[inline(always)]
    fn from(m: &'a [[f64; 3]; 3]) -> Self
    { Lattice::new(&M33::from(*m)) }
}

// fractional to cartesian
impl<'b> Mul<&'b Lattice> for V3 {
    type Output = V3;

    #[inline]
    fn mul(self, other: &'b Lattice) -> V3
    { self * other.matrix() }
}

// cartesian to fractional
impl<'b> Div<&'b Lattice> for V3 {
    type Output = V3;

    #[inline]
    fn div(self, other: &'b Lattice) -> V3
    { self * other.inverse_matrix() }
}

impl CheckClose for Lattice {
    fn for_each_pair(&self, other: &Lattice, f: &mut dyn FnMut(f64, f64))
    { self.matrix().for_each_pair(other.matrix(), f) }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    #[test]
    fn get_inverse() {
        // inverse should be computed exactly by any reasonable algorithm
        let matrix = M33::from([
            [2.0, 2.0, 0.0],
            [0.0, 4.0, 0.0],
            [0.0, 0.0, 2.0],
        ]);
        let exact_inverse = M33::from([
            [0.5, -0.25, 0.0],
            [0.0,  0.25, 0.0],
            [0.0,   0.0, 0.5],
        ]);

        let lattice = Lattice::new(&matrix);
        assert_eq!(&matrix, lattice.matrix());
        assert_eq!(&exact_inverse, lattice.inverse_matrix());
        assert!(!lattice.is_orthorhombic());
        assert!(Lattice::diagonal(&[1.0, 2.0, 3.0]).is_orthorhombic());
    }

    #[test]
    fn frac_cart_round_trip() {
        let lattice = Lattice::random_skewed(5.0, 1.0);
        let cart = V3([0.3, -2.0, 7.5]);
        assert_close!(abs=1e-12, (cart / &lattice) * &lattice, cart);
        assert_close!(abs=1e-12, V3([1.0, 0.0, 0.0]) * &lattice, lattice.vectors()[0]);
    }

    #[test]
    fn perpendicular_widths() {
        let widths = Lattice::orthorhombic(2.0, 3.0, 4.0).perpendicular_widths();
        assert_close!(abs=1e-12, widths, [2.0, 3.0, 4.0]);

        // shearing the second vector along x does not change the distance between
        // the planes normal to y
        let sheared = Lattice::from(&[[2.0, 0.0, 0.0], [1.5, 3.0, 0.0], [0.0, 0.0, 4.0]]);
        let widths = sheared.perpendicular_widths();
        assert_close!(abs=1e-12, widths[1], 3.0);
        assert_close!(abs=1e-12, widths[2], 4.0);
        assert!(widths[0] < 2.0);
    }
}
