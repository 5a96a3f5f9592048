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

use std::ops::{Add, Sub, AddAssign, SubAssign, Neg};
use std::ops::{Mul, Div, MulAssign, DivAssign};

use crate::types::{V3, M33};

// ---------------------------------------------------------------------------
// elementwise ops, generated for every combination of owned and borrowed operands

macro_rules! impl_binop {
    ($Ty:ident, $Trait:ident, $method:ident, $op:tt) => {
        impl_binop!(@one [] $Ty; $Ty, $Ty, $Trait, $method, $op);
        impl_binop!(@one ['a] $Ty; &'a $Ty, $Ty, $Trait, $method, $op);
        impl_binop!(@one ['b] $Ty; $Ty, &'b $Ty, $Trait, $method, $op);
        impl_binop!(@one ['a, 'b] $Ty; &'a $Ty, &'b $Ty, $Trait, $method, $op);
    };
    (@one [$($lt:tt),*] $Out:ident; $A:ty, $B:ty, $Trait:ident, $method:ident, $op:tt) => {
        impl<$($lt),*> $Trait<$B> for $A {
            type Output = $Out;

            #[inline]
            fn $method(self, other: $B) -> Self::Output {
                let mut out = *self.as_owned();
                out.zip_in_place(other.as_owned(), |a, b| a $op b);
                out
            }
        }
    };
}

macro_rules! impl_scalar_op {
    ($Ty:ident, $Trait:ident, $method:ident, $op:tt) => {
        impl_scalar_op!(@one [] $Ty; $Ty, $Trait, $method, $op);
        impl_scalar_op!(@one ['a] $Ty; &'a $Ty, $Trait, $method, $op);
    };
    (@one [$($lt:tt),*] $Out:ident; $A:ty, $Trait:ident, $method:ident, $op:tt) => {
        impl<$($lt),*> $Trait<f64> for $A {
            type Output = $Out;

            #[inline]
            fn $method(self, scalar: f64) -> Self::Output {
                let mut out = *self.as_owned();
                out.map_in_place(|a| a $op scalar);
                out
            }
        }
    };
}

macro_rules! impl_assign_ops {
    ($Ty:ident) => {
        impl AddAssign<$Ty> for $Ty {
            #[inline] fn add_assign(&mut self, other: $Ty) { *self = *self + other; }
        }
        impl<'a> AddAssign<&'a $Ty> for $Ty {
            #[inline] fn add_assign(&mut self, other: &'a $Ty) { *self = *self + other; }
        }
        impl SubAssign<$Ty> for $Ty {
            #[inline] fn sub_assign(&mut self, other: $Ty) { *self = *self - other; }
        }
        impl<'a> SubAssign<&'a $Ty> for $Ty {
            #[inline] fn sub_assign(&mut self, other: &'a $Ty) { *self = *self - other; }
        }
        impl MulAssign<f64> for $Ty {
            #[inline] fn mul_assign(&mut self, scalar: f64) { *self = *self * scalar; }
        }
        impl DivAssign<f64> for $Ty {
            #[inline] fn div_assign(&mut self, scalar: f64) { *self = *self / scalar; }
        }
        impl Neg for $Ty {
            type Output = $Ty;
            #[inline] fn neg(self) -> $Ty { self * -1.0 }
        }
        impl<'a> Neg for &'a $Ty {
            type Output = $Ty;
            #[inline] fn neg(self) -> $Ty { *self * -1.0 }
        }
        impl Mul<$Ty> for f64 {
            type Output = $Ty;
            #[inline] fn mul(self, x: $Ty) -> $Ty { x * self }
        }
        impl<'a> Mul<&'a $Ty> for f64 {
            type Output = $Ty;
            #[inline] fn mul(self, x: &'a $Ty) -> $Ty { *x * self }
        }
    };
}

/// Helper for the macros above; lets `&V3` and `V3` share an implementation.
trait ElementwiseOutput {
    type Output: Elementwise;
    fn as_owned(&self) -> &Self::Output;
}

trait Elementwise: Copy {
    fn zip_in_place(&mut self, other: &Self, f: impl FnMut(f64, f64) -> f64);
    fn map_in_place(&mut self, f: impl FnMut(f64) -> f64);
}

impl Elementwise for V3 {
    #[inline(always)]
    fn zip_in_place(&mut self, other: &Self, mut f: impl FnMut(f64, f64) -> f64) {
        for k in 0..3 {
            self.0[k] = f(self.0[k], other.0[k]);
        }
    }

    #[inline(always)]
    fn map_in_place(&mut self, mut f: impl FnMut(f64) -> f64) {
        for x in &mut self.0 {
            *x = f(*x);
        }
    }
}

impl Elementwise for M33 {
    #[inline(always)]
    fn zip_in_place(&mut self, other: &Self, mut f: impl FnMut(f64, f64) -> f64) {
        for r in 0..3 {
            self.0[r].zip_in_place(&other.0[r], &mut f);
        }
    }

    #[inline(always)]
    fn map_in_place(&mut self, mut f: impl FnMut(f64) -> f64) {
        for row in &mut self.0 {
            row.map_in_place(&mut f);
        }
    }
}

macro_rules! impl_elementwise_output {
    ($Ty:ident) => {
        impl ElementwiseOutput for $Ty {
            type Output = $Ty;
            #[inline(always)] fn as_owned(&self) -> &$Ty { self }
        }
        impl<'a> ElementwiseOutput for &'a $Ty {
            type Output = $Ty;
            #[inline(always)] fn as_owned(&self) -> &$Ty { *self }
        }
    };
}

impl_elementwise_output!(V3);
impl_elementwise_output!(M33);

impl_binop!(V3, Add, add, +);
impl_binop!(V3, Sub, sub, -);
impl_scalar_op!(V3, Mul, mul, *);
impl_scalar_op!(V3, Div, div, /);
impl_assign_ops!(V3);

impl_binop!(M33, Add, add, +);
impl_binop!(M33, Sub, sub, -);
impl_scalar_op!(M33, Mul, mul, *);
impl_scalar_op!(M33, Div, div, /);
impl_assign_ops!(M33);

// ---------------------------------------------------------------------------
// matrix products

// row-vector times matrix. (this is how fractional coordinates are
// turned into cartesian ones, since lattice vectors are rows)
impl<'a> Mul<&'a M33> for V3 {
    type Output = V3;

    #[inline]
    fn mul(self, m: &'a M33) -> V3 {
        V3::from_fn(|c| (0..3).map(|k| self[k] * m[k][c]).sum())
    }
}

// matrix times column-vector.
impl<'a> Mul<V3> for &'a M33 {
    type Output = V3;

    #[inline]
    fn mul(self, v: V3) -> V3 {
        V3::from_fn(|r| V3::dot(&self[r], &v))
    }
}

impl<'a, 'b> Mul<&'b M33> for &'a M33 {
    type Output = M33;

    #[inline]
    fn mul(self, other: &'b M33) -> M33 {
        M33::from_fn(|r, c| (0..3).map(|k| self[r][k] * other[k][c]).sum())
    }
}
