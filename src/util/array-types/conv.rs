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

use crate::types::V3;

/// Zero-cost reinterpretation of sequences of arrays as sequences of `V3`.
///
/// Sound because `V3` is `repr(transparent)` over `[f64; 3]`.
pub trait Envee {
    type En: ?Sized;

    /// Borrow a sequence of arrays as `V3`s.
    fn envee_ref(&self) -> &Self::En;

    /// Mutably borrow a sequence of arrays as `V3`s.
    fn envee_mut(&mut self) -> &mut Self::En;
}

/// The inverse of `Envee`.
pub trait Unvee {
    type Un: ?Sized;

    /// Borrow a sequence of `V3`s as arrays.
    fn unvee_ref(&self) -> &Self::Un;

    /// Mutably borrow a sequence of `V3`s as arrays.
    fn unvee_mut(&mut self) -> &mut Self::Un;
}

impl Envee for [[f64; 3]] {
    type En = [V3];

    #[inline(always)]
    fn envee_ref(&self) -> &[V3]
    { unsafe { std::slice::from_raw_parts(self.as_ptr() as *const V3, self.len()) } }

    #[inline(always)]
    fn envee_mut(&mut self) -> &mut [V3]
    { unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr() as *mut V3, self.len()) } }
}

impl Unvee for [V3] {
    type Un = [[f64; 3]];

    #[inline(always)]
    fn unvee_ref(&self) -> &[[f64; 3]]
    { unsafe { std::slice::from_raw_parts(self.as_ptr() as *const [f64; 3], self.len()) } }

    #[inline(always)]
    fn unvee_mut(&mut self) -> &mut [[f64; 3]]
    { unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr() as *mut [f64; 3], self.len()) } }
}

/// Collect a flat `3N` buffer into owned vectors.
pub fn v3_vec_from_flat(flat: &[f64]) -> Vec<V3> {
    assert_eq!(flat.len() % 3, 0, "flat coordinate buffer length not divisible by 3");
    flat.chunks(3).map(|c| V3([c[0], c[1], c[2]])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envee_views_share_memory() {
        let mut arrs = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        arrs.envee_mut()[1][0] = 10.0;
        assert_eq!(arrs[1], [10.0, 5.0, 6.0]);
        assert_eq!(arrs.envee_ref()[0], V3([1.0, 2.0, 3.0]));

        let vs = v3_vec_from_flat(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(vs.unvee_ref()[1], [3.0, 4.0, 5.0]);
    }
}
