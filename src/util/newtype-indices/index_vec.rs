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

use crate::Idx;

use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A `Vec` that uses newtype indices.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IndexVec<I: Idx, V> {
    pub raw: Vec<V>,
    _marker: PhantomData<fn(&I)>,
}

impl<I: Idx, V> IndexVec<I, V> {
    #[inline]
    pub fn new() -> Self
    { Self::from_raw(Vec::new()) }

    #[inline]
    pub fn from_raw(raw: Vec<V>) -> Self
    { IndexVec { raw, _marker: PhantomData } }

    #[inline]
    pub fn from_elem_n(elem: V, n: usize) -> Self
    where V: Clone,
    { Self::from_raw(vec![elem; n]) }

    /// Push a value and get its index.
    #[inline]
    pub fn push(&mut self, value: V) -> I {
        let index = I::new(self.raw.len());
        self.raw.push(value);
        index
    }

    #[inline] pub fn len(&self) -> usize { self.raw.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.raw.is_empty() }

    /// Index that the next `push` will return.
    #[inline]
    pub fn next_index(&self) -> I
    { I::new(self.len()) }

    #[inline]
    pub fn get(&self, index: I) -> Option<&V>
    { self.raw.get(index.index()) }

    #[inline]
    pub fn get_mut(&mut self, index: I) -> Option<&mut V>
    { self.raw.get_mut(index.index()) }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, V>
    { self.raw.iter() }

    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, V>
    { self.raw.iter_mut() }

    #[inline]
    pub fn indices(&self) -> impl ExactSizeIterator<Item=I> + DoubleEndedIterator + Clone + 'static
    { (0..self.len()).map(I::new) }

    #[inline]
    pub fn iter_enumerated(&self) -> impl ExactSizeIterator<Item=(I, &V)> + DoubleEndedIterator
    { self.raw.iter().enumerate().map(|(i, v)| (I::new(i), v)) }

    #[inline]
    pub fn iter_enumerated_mut(&mut self) -> impl ExactSizeIterator<Item=(I, &mut V)> + DoubleEndedIterator
    { self.raw.iter_mut().enumerate().map(|(i, v)| (I::new(i), v)) }

    #[inline]
    pub fn into_iter_enumerated(self) -> impl ExactSizeIterator<Item=(I, V)> + DoubleEndedIterator
    { self.raw.into_iter().enumerate().map(|(i, v)| (I::new(i), v)) }

    /// Borrow two distinct elements mutably at once.
    ///
    /// Panics if the indices are equal.
    pub fn pick2_mut(&mut self, a: I, b: I) -> (&mut V, &mut V) {
        let (ai, bi) = (a.index(), b.index());
        assert_ne!(ai, bi, "pick2_mut with identical indices");
        if ai < bi {
            let (lo, hi) = self.raw.split_at_mut(bi);
            (&mut lo[ai], &mut hi[0])
        } else {
            let (lo, hi) = self.raw.split_at_mut(ai);
            (&mut hi[0], &mut lo[bi])
        }
    }

    pub fn map<W>(self, f: impl FnMut(V) -> W) -> IndexVec<I, W>
    { IndexVec::from_raw(self.raw.into_iter().map(f).collect()) }
}

impl<I: Idx, V> Default for IndexVec<I, V> {
    fn default() -> Self { Self::new() }
}

impl<I: Idx, V: fmt::Debug> fmt::Debug for IndexVec<I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    { fmt::Debug::fmt(&self.raw, f) }
}

impl<I: Idx, V> Index<I> for IndexVec<I, V> {
    type Output = V;

    #[inline]
    fn index(&self, index: I) -> &V
    { &self.raw[index.index()] }
}

impl<I: Idx, V> IndexMut<I> for IndexVec<I, V> {
    #[inline]
    fn index_mut(&mut self, index: I) -> &mut V
    { &mut self.raw[index.index()] }
}

impl<I: Idx, V> FromIterator<V> for IndexVec<I, V> {
    fn from_iter<T: IntoIterator<Item=V>>(iter: T) -> Self
    { Self::from_raw(iter.into_iter().collect()) }
}

impl<I: Idx, V> Extend<V> for IndexVec<I, V> {
    fn extend<T: IntoIterator<Item=V>>(&mut self, iter: T)
    { self.raw.extend(iter) }
}

impl<I: Idx, V> IntoIterator for IndexVec<I, V> {
    type Item = V;
    type IntoIter = std::vec::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter
    { self.raw.into_iter() }
}

impl<'a, I: Idx, V> IntoIterator for &'a IndexVec<I, V> {
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter
    { self.raw.iter() }
}
