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

//! Approximate equality assertions for floating point data.
//!
//! The main entry point is `assert_close!`, which accepts optional `rel=` and
//! `abs=` tolerances before the two operands:
//!
//! ```
//! # #[macro_use] extern crate cvgraph_assert_close;
//! # fn main() {
//! assert_close!(1.0, 1.0 + 1e-12);
//! assert_close!(abs=1e-6, [0.0, 1.0], [1e-9, 1.0]);
//! # }
//! ```

#[macro_use]
extern crate failure;

use std::fmt;

pub const DEFAULT_NONZERO_TOL: f64 = 1e-9;

#[macro_export]
macro_rules! assert_close {
    ($($t:tt)*) => {
        $crate::__assert_close_impl!{@parse [$($t)*] [rel=$crate::DEFAULT_NONZERO_TOL] [abs=0.0]}
    };
}

#[macro_export]
macro_rules! debug_assert_close {
    ($($t:tt)*) => {{
        #[cfg(debug_assertions)] {
            $crate::assert_close!{$($t)*}
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __assert_close_impl {
    (@parse [rel=$tol:expr, $($rest:tt)*] [rel=$_old:expr] $abs:tt) => {
        $crate::__assert_close_impl!{@parse [$($rest)*] [rel=$tol] $abs}
    };
    (@parse [abs=$tol:expr, $($rest:tt)*] $rel:tt [abs=$_old:expr]) => {
        $crate::__assert_close_impl!{@parse [$($rest)*] $rel [abs=$tol]}
    };
    (@parse [$a:expr, $b:expr $(,)*] $rel:tt $abs:tt) => {
        $crate::__assert_close_impl!{@go $rel $abs [$a, $b] ["not nearly equal!"]}
    };
    (@parse [$a:expr, $b:expr, $($fmt:tt)+] $rel:tt $abs:tt) => {
        $crate::__assert_close_impl!{@go $rel $abs [$a, $b] [$($fmt)+]}
    };
    (@go [rel=$rel:expr] [abs=$abs:expr] [$a:expr, $b:expr] [$($fmt:tt)+]) => {{
        let (a, b) = (&$a, &$b);
        let tol = $crate::Tolerances { rel: $rel, abs: $abs };
        if let Err(e) = $crate::CheckClose::check_close(a, b, tol) {
            panic!(
                "{} (tolerances: rel={}, abs={})\n left: {:?}\nright: {:?}\n{}",
                format!($($fmt)+), tol.rel, tol.abs, a, b, e,
            );
        }
    }};
}

/// Scalar closeness test with the semantics of python's `math.isclose`.
#[inline]
pub fn is_close(a: f64, b: f64, tol: Tolerances) -> bool {
    assert!(tol.rel >= 0.0);
    assert!(tol.abs >= 0.0);

    // also catches equal infinities
    if a == b { return true; }
    if a.is_infinite() || b.is_infinite() { return false; }

    // false for NaN
    (a - b).abs() < f64::max(tol.abs, tol.rel * f64::max(a.abs(), b.abs()))
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

/// The first pair of elements that failed a closeness check.
#[derive(Debug, Fail)]
pub struct CheckCloseError {
    pub values: (f64, f64),
    /// Flat position of the failing element, for sequence types.
    pub index: Option<usize>,
    pub tol: Tolerances,
}

impl fmt::Display for CheckCloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (left, right) = self.values;
        match self.index {
            Some(index) => writeln!(f, "failed at flat index {}:", index)?,
            None => writeln!(f, "failed at:")?,
        }
        write!(f, "  left: {:?}\n right: {:?}\n   tol: {:?}", left, right, self.tol)
    }
}

/// Types whose data can be compared elementwise with tolerances.
///
/// Implementors only need to provide `for_each_pair`; it must visit
/// corresponding scalars of `self` and `other` in the same order.
pub trait CheckClose<Rhs: ?Sized = Self> {
    fn for_each_pair(&self, other: &Rhs, f: &mut dyn FnMut(f64, f64));

    /// Test that all values of self and other are close.
    fn check_close(&self, other: &Rhs, tol: Tolerances) -> Result<(), CheckCloseError> {
        let mut index = 0;
        let mut first_failure = None;
        self.for_each_pair(other, &mut |a, b| {
            if first_failure.is_none() && !is_close(a, b, tol) {
                first_failure = Some(CheckCloseError { values: (a, b), index: Some(index), tol });
            }
            index += 1;
        });
        match first_failure {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl CheckClose for f64 {
    #[inline]
    fn for_each_pair(&self, other: &f64, f: &mut dyn FnMut(f64, f64))
    { f(*self, *other) }

    #[inline]
    fn check_close(&self, other: &f64, tol: Tolerances) -> Result<(), CheckCloseError> {
        match is_close(*self, *other, tol) {
            true => Ok(()),
            false => Err(CheckCloseError { values: (*self, *other), index: None, tol }),
        }
    }
}

impl<'a, A: ?Sized + CheckClose<B>, B: ?Sized> CheckClose<&'a B> for &'a A {
    fn for_each_pair(&self, other: &&'a B, f: &mut dyn FnMut(f64, f64))
    { (**self).for_each_pair(*other, f) }
}

impl<T: CheckClose> CheckClose for [T] {
    fn for_each_pair(&self, other: &[T], f: &mut dyn FnMut(f64, f64)) {
        assert_eq!(self.len(), other.len(), "length mismatch in check_close");
        for (a, b) in self.iter().zip(other) {
            a.for_each_pair(b, f);
        }
    }
}

impl<T: CheckClose> CheckClose for Vec<T> {
    fn for_each_pair(&self, other: &Vec<T>, f: &mut dyn FnMut(f64, f64))
    { self[..].for_each_pair(&other[..], f) }
}

impl<T: CheckClose> CheckClose<[T]> for Vec<T> {
    fn for_each_pair(&self, other: &[T], f: &mut dyn FnMut(f64, f64))
    { self[..].for_each_pair(other, f) }
}

impl<T: CheckClose, const N: usize> CheckClose for [T; N] {
    fn for_each_pair(&self, other: &[T; N], f: &mut dyn FnMut(f64, f64))
    { self[..].for_each_pair(&other[..], f) }
}

impl<A: CheckClose, B: CheckClose> CheckClose for (A, B) {
    fn for_each_pair(&self, other: &(A, B), f: &mut dyn FnMut(f64, f64)) {
        self.0.for_each_pair(&other.0, f);
        self.1.for_each_pair(&other.1, f);
    }
}
