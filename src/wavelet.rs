//! A static wavelet tree over a small alphabet.
//!
//! The tree is a balanced decomposition of rank / select bit vectors. A node
//! at depth `d` routes each symbol by bit `levels - 1 - d`: zero goes to the
//! left subtree, one to the right. With the alphabets used here (at most 10
//! symbols), the tree has at most four levels.
//!
//! The query semantics match Simple-SDS: `rank(c, i)` counts occurrences in
//! `[0, i)` and `select(c, k)` returns the position of the occurrence of
//! rank `k`, starting from `0`.

use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank, Select, SelectZero};
use simple_sds::raw_vector::{RawVector, PushRaw};
use simple_sds::serialize::Serialize;
use simple_sds::bits;

use std::io::{Error, ErrorKind};
use std::io;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A balanced wavelet tree over alphabet `[0, sigma)`.
///
/// # Examples
///
/// ```
/// use metadbg::wavelet::WaveletTree;
///
/// let symbols = vec![3u8, 1, 4, 1, 5, 2, 1];
/// let wt = WaveletTree::from_symbols(&symbols, 6);
/// assert_eq!(wt.len(), 7);
/// assert_eq!(wt.get(4), 5);
/// assert_eq!(wt.rank(1, 4), 2);
/// assert_eq!(wt.select(1, 2), Some(6));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveletTree {
    len: usize,
    sigma: usize,
    levels: usize,
    // Internal nodes in heap order; node `h` has children `2h + 1` and
    // `2h + 2`. Nodes covering no symbols are empty bit vectors.
    nodes: Vec<BitVector>,
}

impl WaveletTree {
    /// Builds a wavelet tree from a slice of symbols.
    ///
    /// # Panics
    ///
    /// Panics if `sigma == 0` or a symbol is not in `[0, sigma)`.
    pub fn from_symbols(symbols: &[u8], sigma: usize) -> Self {
        assert!(sigma > 0, "WaveletTree: Empty alphabet");
        let levels = bits::bit_len(sigma.max(2) as u64 - 1);
        let node_count = (1usize << levels) - 1;

        let mut raw_nodes: Vec<RawVector> = (0..node_count).map(|_| RawVector::new()).collect();
        Self::fill(&mut raw_nodes, 0, 0, levels, symbols.to_vec(), sigma);

        let mut nodes: Vec<BitVector> = Vec::with_capacity(node_count);
        for raw in raw_nodes {
            let mut bv = BitVector::from(raw);
            bv.enable_rank();
            bv.enable_select();
            bv.enable_select_zero();
            nodes.push(bv);
        }

        WaveletTree {
            len: symbols.len(),
            sigma,
            levels,
            nodes,
        }
    }

    fn fill(nodes: &mut Vec<RawVector>, h: usize, depth: usize, levels: usize, symbols: Vec<u8>, sigma: usize) {
        if depth == levels {
            return;
        }
        let shift = levels - 1 - depth;
        let mut left: Vec<u8> = Vec::new();
        let mut right: Vec<u8> = Vec::new();
        let mut raw = RawVector::with_capacity(symbols.len());
        for symbol in symbols {
            assert!((symbol as usize) < sigma, "WaveletTree: Invalid symbol {}", symbol);
            let bit = (symbol >> shift) & 1 != 0;
            raw.push_bit(bit);
            if bit { right.push(symbol); } else { left.push(symbol); }
        }
        nodes[h] = raw;
        Self::fill(nodes, 2 * h + 1, depth + 1, levels, left, sigma);
        Self::fill(nodes, 2 * h + 2, depth + 1, levels, right, sigma);
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

    /// Returns the alphabet size.
    #[inline]
    pub fn sigma(&self) -> usize {
        self.sigma
    }

    /// Returns the symbol at position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn get(&self, i: usize) -> u8 {
        assert!(i < self.len, "WaveletTree: Index {} out of bounds ({})", i, self.len);
        let mut h = 0;
        let mut pos = i;
        let mut symbol = 0u8;
        for _ in 0..self.levels {
            let bv = &self.nodes[h];
            symbol <<= 1;
            if bv.get(pos) {
                symbol |= 1;
                pos = bv.rank(pos);
                h = 2 * h + 2;
            } else {
                pos -= bv.rank(pos);
                h = 2 * h + 1;
            }
        }
        symbol
    }

    /// Returns the number of occurrences of `symbol` in `[0, i)`.
    ///
    /// # Panics
    ///
    /// Panics if `i > self.len()` or the symbol is not in the alphabet.
    pub fn rank(&self, symbol: u8, i: usize) -> usize {
        assert!(i <= self.len, "WaveletTree: Index {} out of bounds ({})", i, self.len);
        assert!((symbol as usize) < self.sigma, "WaveletTree: Invalid symbol {}", symbol);
        let mut h = 0;
        let mut pos = i;
        for depth in 0..self.levels {
            if pos == 0 {
                return 0;
            }
            let bv = &self.nodes[h];
            let bit = (symbol >> (self.levels - 1 - depth)) & 1 != 0;
            if bit {
                pos = bv.rank(pos);
                h = 2 * h + 2;
            } else {
                pos -= bv.rank(pos);
                h = 2 * h + 1;
            }
        }
        pos
    }

    /// Returns the position of the occurrence of `symbol` with rank `k`, or
    /// `None` if there are not enough occurrences.
    ///
    /// # Panics
    ///
    /// Panics if the symbol is not in the alphabet.
    pub fn select(&self, symbol: u8, k: usize) -> Option<usize> {
        assert!((symbol as usize) < self.sigma, "WaveletTree: Invalid symbol {}", symbol);
        self.select_from(0, 0, symbol, k)
    }

    fn select_from(&self, h: usize, depth: usize, symbol: u8, k: usize) -> Option<usize> {
        if depth == self.levels {
            return Some(k);
        }
        let bit = (symbol >> (self.levels - 1 - depth)) & 1 != 0;
        let child = 2 * h + 1 + (bit as usize);
        let within_child = self.select_from(child, depth + 1, symbol, k)?;
        let bv = &self.nodes[h];
        if bit {
            bv.select(within_child)
        } else {
            bv.select_zero(within_child)
        }
    }

    /// Returns an iterator over the sequence.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Extracts the sequence into a plain vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.iter().collect()
    }
}

impl Serialize for WaveletTree {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let params: Vec<u64> = vec![self.len as u64, self.sigma as u64, self.levels as u64];
        params.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        for node in self.nodes.iter() {
            node.serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let params = Vec::<u64>::load(reader)?;
        if params.len() != 3 {
            return Err(Error::new(ErrorKind::InvalidData, "WaveletTree: Invalid header"));
        }
        let (len, sigma, levels) = (params[0] as usize, params[1] as usize, params[2] as usize);
        if sigma == 0 || levels != bits::bit_len(sigma.max(2) as u64 - 1) {
            return Err(Error::new(ErrorKind::InvalidData, "WaveletTree: Invalid alphabet"));
        }
        let node_count = (1usize << levels) - 1;
        let mut nodes: Vec<BitVector> = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let mut bv = BitVector::load(reader)?;
            bv.enable_rank();
            bv.enable_select();
            bv.enable_select_zero();
            nodes.push(bv);
        }
        if nodes[0].len() != len {
            return Err(Error::new(ErrorKind::InvalidData, "WaveletTree: Root length mismatch"));
        }
        Ok(WaveletTree {
            len,
            sigma,
            levels,
            nodes,
        })
    }

    fn size_in_elements(&self) -> usize {
        let mut result = 4; // Header.
        for node in self.nodes.iter() {
            result += node.size_in_elements();
        }
        result
    }
}

//-----------------------------------------------------------------------------
