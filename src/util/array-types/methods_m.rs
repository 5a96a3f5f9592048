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

/// Compute the inverse of a square matrix.
///
/// Panics if the matrix is singular; callers that can see singular
/// matrices should check `det` first.
#[inline]
pub fn inv(m: &M33) -> M33
{ m.inv() }

impl M33 {
    /// Get the identity matrix.
    #[inline(always)]
    pub fn eye() -> Self
    { M33::from_fn(|r, c| if r == c { 1.0 } else { 0.0 }) }

    /// Get the zero matrix.
    #[inline(always)]
    pub fn zero() -> Self
    { M33([V3::zero(); 3]) }

    /// Construct a matrix from a function on `(row, col)`.
    #[inline(always)]
    pub fn from_fn(mut f: impl FnMut(usize, usize) -> f64) -> Self
    { M33([V3::from_fn(|c| f(0, c)), V3::from_fn(|c| f(1, c)), V3::from_fn(|c| f(2, c))]) }

    /// Construct a diagonal matrix.
    #[inline]
    pub fn diag(d: &[f64; 3]) -> Self
    { M33::from_fn(|r, c| if r == c { d[r] } else { 0.0 }) }

    /// Get the transpose.
    #[inline]
    pub fn t(&self) -> M33
    { M33::from_fn(|r, c| self[c][r]) }

    /// Get the determinant.
    #[inline]
    pub fn det(&self) -> f64
    { self[0].dot(&self[1].cross(&self[2])) }

    /// Get the inverse.
    ///
    /// Panics if the matrix is singular.
    pub fn inv(&self) -> M33 {
        let det = self.det();
        assert!(det != 0.0, "matrix is singular");

        // rows of the inverse transpose are the cross products of pairs of rows
        let cof = M33([
            self[1].cross(&self[2]),
            self[2].cross(&self[0]),
            self[0].cross(&self[1]),
        ]);
        cof.t() / det
    }

    /// Sum of the diagonal.
    #[inline]
    pub fn trace(&self) -> f64
    { self[0][0] + self[1][1] + self[2][2] }

    /// Flatten in row-major order.
    #[inline]
    pub fn flat(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for r in 0..3 {
            out[3 * r..3 * r + 3].copy_from_slice(&self[r].0);
        }
        out
    }

    /// Inverse of `flat`.
    #[inline]
    pub fn from_flat(flat: &[f64]) -> M33 {
        assert_eq!(flat.len(), 9);
        M33::from_fn(|r, c| flat[3 * r + c])
    }

    #[inline(always)]
    pub fn into_array(self) -> [[f64; 3]; 3]
    { [self[0].0, self[1].0, self[2].0] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse() {
        let m = M33::from([[2.0, 1.0, 0.0], [0.5, 3.0, 0.0], [1.0, -1.0, 4.0]]);
        let prod = &m * &inv(&m);
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((prod[r][c] - expected).abs() < 1e-12, "{:?}", prod);
            }
        }
    }

    #[test]
    fn flat_round_trip() {
        let m = M33::from([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(m.flat()[5], 6.0);
        assert_eq!(M33::from_flat(&m.flat()), m);
    }
}
