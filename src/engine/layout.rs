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

use crate::ValueId;

/// A contiguous range of derivative indices owned by one upstream value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBlock {
    pub value: ValueId,
    pub start: usize,
    pub len: usize,
}

/// Numbering of the derivatives computed by a chain.
///
/// When the chain touches atoms, the first block is the positions put slot
/// (`3 * natoms` indices) and the second is the box (9 indices, row-major).
/// Every other block is a stored argument read by some member of the chain.
#[derive(Debug, Clone, Default)]
pub struct DerivativeLayout {
    blocks: Vec<LayoutBlock>,
    total: usize,
    atoms: Option<usize>,
    box_: Option<usize>,
}

impl DerivativeLayout {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn add_atoms(&mut self, positions: ValueId, box_: ValueId, natoms: usize) {
        assert!(self.blocks.is_empty(), "(BUG) atom blocks must come first");
        self.atoms = Some(self.push(positions, 3 * natoms));
        self.box_ = Some(self.push(box_, 9));
    }

    pub(crate) fn add_block(&mut self, value: ValueId, len: usize) {
        if self.block_start(value).is_none() {
            self.push(value, len);
        }
    }

    fn push(&mut self, value: ValueId, len: usize) -> usize {
        let start = self.total;
        self.blocks.push(LayoutBlock { value, start, len });
        self.total += len;
        start
    }

    #[inline] pub fn total(&self) -> usize { self.total }
    #[inline] pub fn blocks(&self) -> &[LayoutBlock] { &self.blocks }
    #[inline] pub fn uses_atoms(&self) -> bool { self.atoms.is_some() }

    pub fn block_start(&self, value: ValueId) -> Option<usize> {
        self.blocks.iter().find(|b| b.value == value).map(|b| b.start)
    }

    #[inline]
    pub fn atom_index(&self, atom: usize, k: usize) -> usize {
        match self.atoms {
            Some(start) => start + 3 * atom + k,
            None => panic!("(BUG) atom derivative in a chain without atoms"),
        }
    }

    #[inline]
    pub fn box_index(&self, a: usize, b: usize) -> usize {
        match self.box_ {
            Some(start) => start + 3 * a + b,
            None => panic!("(BUG) box derivative in a chain without atoms"),
        }
    }
}
