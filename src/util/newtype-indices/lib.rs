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

//! Newtyped `usize` indices, and vectors that can only be indexed by them.
//!
//! The engine deals with several parallel index spaces (values, nodes, chains,
//! derivative blocks) and mixing them up is an easy mistake to make.

mod index_vec;

pub use crate::index_vec::IndexVec;

use std::fmt::Debug;
use std::hash::Hash;

/// A newtyped `usize` wrapper.
pub trait Idx: Copy + 'static + Eq + Debug + Ord + Hash + Send + Sync {
    fn new(idx: usize) -> Self;
    fn index(self) -> usize;
}

impl Idx for usize {
    #[inline]
    fn new(idx: usize) -> Self { idx }
    #[inline]
    fn index(self) -> usize { self }
}

/// Define a new index type.
///
/// ```
/// # #[macro_use] extern crate cvgraph_newtype_indices;
/// newtype_index!{
///     /// Identifies a node.
///     NodeId
/// }
/// # fn main() {
/// use cvgraph_newtype_indices::Idx;
/// assert_eq!(NodeId::new(3).index(), 3);
/// assert_eq!(format!("{}", NodeId::new(3)), "3");
/// # }
/// ```
#[macro_export]
macro_rules! newtype_index {
    ($(#[$meta:meta])* $type:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $type(usize);

        impl $crate::Idx for $type {
            #[inline]
            fn new(value: usize) -> Self { $type(value) }

            #[inline]
            fn index(self) -> usize { self.0 }
        }

        impl ::std::fmt::Display for $type {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}
