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

use crate::types::{V3, M33};

impl V3 {
    /// Get a zero vector.
    #[inline(always)]
    pub fn zero() -> Self
    { V3([0.0; 3]) }

    /// Construct a vector from a function on indices.
    #[inline(always)]
    pub fn from_fn(mut f: impl FnMut(usize) -> f64) -> Self
    { V3([f(0), f(1), f(2)]) }

    /// Get a basis vector.
    #[inline(always)]
    pub fn axis_unit(i: usize) -> Self {
        let mut v = Self::zero();
        *v.get_mut(i).unwrap_or_else(|| panic!("Invalid axis for 3d vector: {}", i)) = 1.0;
        v
    }

    /// Get the inner product of two vectors.
    ///
    /// It is recommended you write this as `V3::dot(a, b)`, rather than `a.dot(b)`.
    #[inline(always)]
    pub fn dot(&self, other: &V3) -> f64
    { self[0] * other[0] + self[1] * other[1] + self[2] * other[2] }

    /// Get the vector's squared magnitude.
    #[inline(always)]
    pub fn sqnorm(&self) -> f64
    { self.dot(self) }

    /// Get the vector's magnitude.
    #[inline(always)]
    pub fn norm(&self) -> f64
    { self.sqnorm().sqrt() }

    /// Normalize the vector.
    #[inline(always)]
    pub fn unit(&self) -> V3
    { *self / self.norm() }

    /// Cross product.
    #[inline]
    pub fn cross(&self, other: &V3) -> V3 {
        let (a, b) = (self, other);
        V3([
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ])
    }

    /// Outer product `self ⊗ other`, i.e. `out[r][c] = self[r] * other[c]`.
    #[inline]
    pub fn outer(&self, other: &V3) -> M33
    { M33::from_fn(|r, c| self[r] * other[c]) }

    /// Apply a function to each element.
    #[inline(always)]
    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> V3
    { V3([f(self[0]), f(self[1]), f(self[2])]) }

    /// Get the shortest angle (as a value in `[0, pi]`) between this vector and another.
    #[inline]
    pub fn angle_to(&self, other: &V3) -> f64 {
        let arg = self.dot(other) / f64::sqrt(self.sqnorm() * other.sqnorm());
        f64::acos(arg.min(1.0).max(-1.0))
    }

    #[inline(always)]
    pub fn into_array(self) -> [f64; 3]
    { self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_is_orthogonal() {
        let a = V3([1.0, 2.0, -0.5]);
        let b = V3([-3.0, 0.25, 4.0]);
        let c = a.cross(&b);
        assert!(c.dot(&a).abs() < 1e-12);
        assert!(c.dot(&b).abs() < 1e-12);
        assert_eq!(V3::axis_unit(0).cross(&V3::axis_unit(1)), V3::axis_unit(2));
    }

    #[test]
    fn outer_layout() {
        let m = V3([1.0, 2.0, 3.0]).outer(&V3([1.0, 0.0, -1.0]));
        assert_eq!(m[1], V3([2.0, 0.0, -2.0]));
        assert_eq!(m.t()[2], V3([-1.0, -2.0, -3.0]));
    }
}
