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

use std::ops::{Deref, DerefMut};
use std::fmt;

use cvgraph_assert_close::CheckClose;

#[cfg(feature = "serde-support")]
use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------

/// A 3-dimensional vector with operations for linear algebra.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct V3(pub [f64; 3]);

/// A square dense 3x3 matrix, stored as rows.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct M33(pub [V3; 3]);

// ---------------------------------------------------------------------------
// Both types behave generally like their backing array type.

macro_rules! impl_array_like {
    ($Cn:ident, $T:ty, $n:expr) => {
        impl Deref for $Cn {
            type Target = [$T; $n];

            #[inline(always)]
            fn deref(&self) -> &Self::Target
            { &self.0 }
        }

        impl DerefMut for $Cn {
            #[inline(always)]
            fn deref_mut(&mut self) -> &mut Self::Target
            { &mut self.0 }
        }

        impl<'a> IntoIterator for &'a $Cn {
            type Item = &'a $T;
            type IntoIter = std::slice::Iter<'a, $T>;

            #[inline(always)]
            fn into_iter(self) -> Self::IntoIter
            { self.0.iter() }
        }

        // forward the debug impl without a surrounding "V3(...)" so that
        // debug output of positions can be pasted directly into python.
        impl fmt::Debug for $Cn {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
            { fmt::Debug::fmt(&self.0, f) }
        }
    };
}

impl_array_like!(V3, f64, 3);
impl_array_like!(M33, V3, 3);

impl From<[f64; 3]> for V3 {
    #[inline(always)]
    fn from(arr: [f64; 3]) -> Self { V3(arr) }
}

impl From<[[f64; 3]; 3]> for M33 {
    #[inline(always)]
    fn from(arr: [[f64; 3]; 3]) -> Self { M33([V3(arr[0]), V3(arr[1]), V3(arr[2])]) }
}

impl CheckClose for V3 {
    fn for_each_pair(&self, other: &V3, f: &mut dyn FnMut(f64, f64))
    { self.0.for_each_pair(&other.0, f) }
}

impl CheckClose for M33 {
    fn for_each_pair(&self, other: &M33, f: &mut dyn FnMut(f64, f64))
    { self.0.for_each_pair(&other.0, f) }
}
