//! Insert-capable sequences over small alphabets.
//!
//! The static rank / select structures from Simple-SDS are immutable. The
//! mutable state of a BOSS graph needs the same queries on structures that
//! also support insertion at arbitrary positions. The implementations here
//! store the elements in bounded blocks with per-block symbol counts:
//! queries scan the block directory, insertions touch one block and split
//! it when it overflows.
//!
//! The query semantics match Simple-SDS: `rank(c, i)` counts occurrences
//! in `[0, i)` and `select(c, k)` returns the position of the occurrence
//! of rank `k`, starting from `0`.

use std::iter::FusedIterator;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

// Blocks are split when they grow past this many elements.
const MAX_BLOCK_LEN: usize = 1024;

#[derive(Clone, Debug)]
struct Block {
    data: Vec<u8>,
    counts: Vec<u32>,
}

impl Block {
    fn new(sigma: usize) -> Self {
        Block {
            data: Vec::with_capacity(MAX_BLOCK_LEN / 2),
            counts: vec![0; sigma],
        }
    }
}

//-----------------------------------------------------------------------------

/// A mutable sequence over alphabet `[0, sigma)` with rank / select support.
///
/// # Examples
///
/// ```
/// use metadbg::dynamic::DynSequence;
///
/// let mut seq = DynSequence::new(4);
/// seq.insert(0, 2);
/// seq.insert(0, 1);
/// seq.insert(2, 3);
/// assert_eq!(seq.len(), 3);
/// assert_eq!(seq.get(1), 2);
/// assert_eq!(seq.rank(2, 3), 1);
/// assert_eq!(seq.select(3, 0), Some(2));
/// ```
#[derive(Clone, Debug)]
pub struct DynSequence {
    sigma: usize,
    len: usize,
    blocks: Vec<Block>,
}

impl DynSequence {
    /// Creates an empty sequence over alphabet `[0, sigma)`.
    ///
    /// # Panics
    ///
    /// Panics if `sigma == 0` or `sigma > 255`.
    pub fn new(sigma: usize) -> Self {
        assert!(sigma > 0 && sigma <= 255, "DynSequence: Invalid alphabet size {}", sigma);
        DynSequence {
            sigma,
            len: 0,
            blocks: vec![Block::new(sigma)],
        }
    }

    /// Creates a sequence from a slice of symbols.
    ///
    /// # Panics
    ///
    /// Panics if a symbol is not in `[0, sigma)`.
    pub fn from_symbols(symbols: &[u8], sigma: usize) -> Self {
        let mut result = Self::new(sigma);
        result.len = symbols.len();
        result.blocks.clear();
        for chunk in symbols.chunks(MAX_BLOCK_LEN / 2) {
            let mut block = Block::new(sigma);
            for symbol in chunk {
                assert!((*symbol as usize) < sigma, "DynSequence: Invalid symbol {}", symbol);
                block.counts[*symbol as usize] += 1;
            }
            block.data.extend_from_slice(chunk);
            result.blocks.push(block);
        }
        if result.blocks.is_empty() {
            result.blocks.push(Block::new(sigma));
        }
        result
    }

    /// Returns the alphabet size.
    #[inline]
    pub fn sigma(&self) -> usize {
        self.sigma
    }

    /// Returns the length of the sequence.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the sequence is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Returns (block index, offset within the block) for a position.
    // Position `self.len()` maps past the end of the last block.
    fn locate(&self, i: usize) -> (usize, usize) {
        let mut offset = i;
        for (id, block) in self.blocks.iter().enumerate() {
            if offset < block.data.len() {
                return (id, offset);
            }
            offset -= block.data.len();
        }
        (self.blocks.len() - 1, self.blocks.last().unwrap().data.len())
    }

    /// Returns the symbol at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn get(&self, i: usize) -> u8 {
        assert!(i < self.len, "DynSequence: Index {} out of bounds ({})", i, self.len);
        let (id, offset) = self.locate(i);
        self.blocks[id].data[offset]
    }

    /// Replaces the symbol at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()` or the symbol is not in the alphabet.
    pub fn set(&mut self, i: usize, symbol: u8) {
        assert!(i < self.len, "DynSequence: Index {} out of bounds ({})", i, self.len);
        assert!((symbol as usize) < self.sigma, "DynSequence: Invalid symbol {}", symbol);
        let (id, offset) = self.locate(i);
        let block = &mut self.blocks[id];
        let old = block.data[offset];
        block.counts[old as usize] -= 1;
        block.counts[symbol as usize] += 1;
        block.data[offset] = symbol;
    }

    /// Inserts a symbol before position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i > self.len()` or the symbol is not in the alphabet.
    pub fn insert(&mut self, i: usize, symbol: u8) {
        assert!(i <= self.len, "DynSequence: Index {} out of bounds ({})", i, self.len);
        assert!((symbol as usize) < self.sigma, "DynSequence: Invalid symbol {}", symbol);
        let (id, offset) = self.locate(i);
        let block = &mut self.blocks[id];
        block.data.insert(offset, symbol);
        block.counts[symbol as usize] += 1;
        self.len += 1;
        if block.data.len() > MAX_BLOCK_LEN {
            self.split(id);
        }
    }

    // Splits a block in half.
    fn split(&mut self, id: usize) {
        let mut right = Block::new(self.sigma);
        {
            let left = &mut self.blocks[id];
            let mid = left.data.len() / 2;
            right.data.extend_from_slice(&left.data[mid..]);
            left.data.truncate(mid);
            for symbol in right.data.iter() {
                left.counts[*symbol as usize] -= 1;
                right.counts[*symbol as usize] += 1;
            }
        }
        self.blocks.insert(id + 1, right);
    }

    /// Returns the number of occurrences of `symbol` in `[0, i)`.
    ///
    /// # Panics
    ///
    /// Panics if `i > self.len()` or the symbol is not in the alphabet.
    pub fn rank(&self, symbol: u8, i: usize) -> usize {
        assert!(i <= self.len, "DynSequence: Index {} out of bounds ({})", i, self.len);
        assert!((symbol as usize) < self.sigma, "DynSequence: Invalid symbol {}", symbol);
        let mut result = 0;
        let mut offset = i;
        for block in self.blocks.iter() {
            if offset >= block.data.len() {
                result += block.counts[symbol as usize] as usize;
                offset -= block.data.len();
            } else {
                result += block.data[..offset].iter().filter(|s| **s == symbol).count();
                break;
            }
        }
        result
    }

    /// Returns the position of the occurrence of `symbol` with rank `k`, or
    /// `None` if there are not enough occurrences.
    ///
    /// # Panics
    ///
    /// Panics if the symbol is not in the alphabet.
    pub fn select(&self, symbol: u8, k: usize) -> Option<usize> {
        assert!((symbol as usize) < self.sigma, "DynSequence: Invalid symbol {}", symbol);
        let mut remaining = k;
        let mut position = 0;
        for block in self.blocks.iter() {
            let in_block = block.counts[symbol as usize] as usize;
            if remaining >= in_block {
                remaining -= in_block;
                position += block.data.len();
            } else {
                for (offset, s) in block.data.iter().enumerate() {
                    if *s == symbol {
                        if remaining == 0 {
                            return Some(position + offset);
                        }
                        remaining -= 1;
                    }
                }
                unreachable!();
            }
        }
        None
    }

    /// Returns an iterator over the sequence.
    pub fn iter(&self) -> SymbolIter<'_> {
        SymbolIter {
            parent: self,
            block: 0,
            offset: 0,
        }
    }

    /// Extracts the sequence into a plain vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.len);
        for block in self.blocks.iter() {
            result.extend_from_slice(&block.data);
        }
        result
    }
}

//-----------------------------------------------------------------------------

/// A read-only iterator over [`DynSequence`].
#[derive(Clone, Debug)]
pub struct SymbolIter<'a> {
    parent: &'a DynSequence,
    block: usize,
    offset: usize,
}

impl<'a> Iterator for SymbolIter<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        while self.block < self.parent.blocks.len() {
            let data = &self.parent.blocks[self.block].data;
            if self.offset < data.len() {
                let result = data[self.offset];
                self.offset += 1;
                return Some(result);
            }
            self.block += 1;
            self.offset = 0;
        }
        None
    }
}

impl<'a> FusedIterator for SymbolIter<'a> {}

//-----------------------------------------------------------------------------

/// A mutable bit vector with rank / select support.
///
/// This is a thin wrapper over a binary [`DynSequence`].
///
/// # Examples
///
/// ```
/// use metadbg::dynamic::DynBitVector;
///
/// let mut bv = DynBitVector::new();
/// bv.insert(0, true);
/// bv.insert(1, false);
/// bv.insert(2, true);
/// assert_eq!(bv.rank1(3), 2);
/// assert_eq!(bv.select1(1), Some(2));
/// ```
#[derive(Clone, Debug)]
pub struct DynBitVector {
    bits: DynSequence,
}

impl DynBitVector {
    /// Creates an empty bit vector.
    pub fn new() -> Self {
        DynBitVector {
            bits: DynSequence::new(2),
        }
    }

    /// Creates a bit vector from boolean values.
    pub fn from_bits(bits: &[bool]) -> Self {
        let symbols: Vec<u8> = bits.iter().map(|b| *b as u8).collect();
        DynBitVector {
            bits: DynSequence::from_symbols(&symbols, 2),
        }
    }

    /// Returns the length of the bit vector.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if the bit vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.rank1(self.len())
    }

    /// Returns the bit at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.bits.get(i) != 0
    }

    /// Replaces the bit at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        self.bits.set(i, value as u8);
    }

    /// Inserts a bit before position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i > self.len()`.
    #[inline]
    pub fn insert(&mut self, i: usize, value: bool) {
        self.bits.insert(i, value as u8);
    }

    /// Returns the number of set bits in `[0, i)`.
    ///
    /// # Panics
    ///
    /// Panics if `i > self.len()`.
    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        self.bits.rank(1, i)
    }

    /// Returns the position of the set bit of rank `k`, or `None` if there
    /// are not enough set bits.
    #[inline]
    pub fn select1(&self, k: usize) -> Option<usize> {
        self.bits.select(1, k)
    }

    /// Extracts the bits into a plain vector.
    pub fn to_bits(&self) -> Vec<bool> {
        self.bits.iter().map(|s| s != 0).collect()
    }
}

impl Default for DynBitVector {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------
