//! The BOSS representation of a de Bruijn graph.
//!
//! Edges are `(k+1)`-mers over the extended DNA alphabet, stored in
//! colexicographic order of their source nodes with ties broken by the edge
//! symbol. Three structures describe the graph:
//!
//! * `W`: the last symbol of every edge, with values in `[SIGMA, 2 * SIGMA)`
//!   marking edges whose target node has an earlier incoming edge with the
//!   same symbol;
//! * `last`: one bit per edge, set at the last outgoing edge of each node;
//! * `F`: for every symbol `c`, the number of edges whose source node ends
//!   with a symbol smaller than `c`.
//!
//! All navigation reduces to rank / select queries on `W` and `last`.
//!
//! The graph exists in two states. [`DynBoss`] supports insertion and is
//! backed by the mutable structures from [`crate::dynamic`]; [`Boss`] is
//! immutable and backed by a wavelet tree and a rank / select bit vector.
//! The states are connected by the one-way conversions
//! [`DynBoss::into_static`] and [`Boss::into_dynamic`].
//!
//! # Examples
//!
//! ```
//! use metadbg::boss::DynBoss;
//!
//! let mut graph = DynBoss::new(3).unwrap();
//! graph.add_sequence("AAACGT").unwrap();
//! let graph = graph.into_static();
//!
//! assert_eq!(graph.num_edges(), 7); // 3 real edges and 4 dummy edges
//! let edge = graph.kmer_to_edge("AACG");
//! assert_ne!(edge, 0);
//! assert_eq!(graph.get_node_sequence(edge), "AAC");
//! ```

use crate::dynamic::{DynBitVector, DynSequence};
use crate::headers::{Header, BossPayload};
use crate::support;
use crate::wavelet::WaveletTree;
use crate::{Error, MAX_K, NPOS, SIGMA, W_SIGMA};

use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank, Select};
use simple_sds::raw_vector::{RawVector, PushRaw};
use simple_sds::serialize::Serialize;

use std::io;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// The cumulative symbol counts of a BOSS graph.
pub type FArray = [usize; SIGMA + 1];

// Rank / select primitives shared by the static and the dynamic state.
//
// Edges are 1-based; the underlying arrays are 0-based, so edge `i` lives at
// array position `i - 1`. All ranks count edges in `[1, i]` and all selects
// take 0-based ranks and return edge indexes.
pub(crate) trait BossTable {
    fn k(&self) -> usize;
    fn f(&self) -> &FArray;
    fn num_edges(&self) -> usize;
    fn w_value(&self, i: usize) -> u8;
    fn w_rank(&self, value: u8, i: usize) -> usize;
    fn w_select(&self, value: u8, rank: usize) -> Option<usize>;
    fn last_value(&self, i: usize) -> bool;
    fn last_rank(&self, i: usize) -> usize;
    fn last_select(&self, rank: usize) -> Option<usize>;

    /// Returns the number of nodes.
    fn num_nodes(&self) -> usize {
        self.last_rank(self.num_edges())
    }

    /// Returns the symbol of edge `i` without the duplication flag.
    fn edge_class(&self, i: usize) -> u8 {
        self.w_value(i) % SIGMA as u8
    }

    /// Returns the 1-based ordinal of the node owning edge `i`.
    fn node_rank(&self, i: usize) -> usize {
        self.last_rank(i - 1) + 1
    }

    /// Returns the last edge of the node with the given ordinal, clamped to
    /// the number of edges.
    fn node_end_of(&self, ordinal: usize) -> usize {
        match self.last_select(ordinal - 1) {
            Some(edge) => edge,
            None => self.num_edges(),
        }
    }

    /// Returns the first edge of the node with the given ordinal.
    fn node_begin_of(&self, ordinal: usize) -> usize {
        if ordinal == 1 { 1 } else { self.node_end_of(ordinal - 1) + 1 }
    }

    /// Returns the edge range of the node owning edge `i`.
    fn node_range_of(&self, i: usize) -> (usize, usize) {
        let ordinal = self.node_rank(i);
        (self.node_begin_of(ordinal), self.node_end_of(ordinal))
    }

    /// Returns the last symbol of the source node of edge `i`.
    fn node_last_symbol(&self, i: usize) -> u8 {
        debug_assert!(i >= 1 && i <= self.num_edges());
        let f = self.f();
        for d in (0..SIGMA).rev() {
            if f[d] < i {
                return d as u8;
            }
        }
        0
    }

    /// Returns the last edge of the target node of edge `i`, or [`NPOS`] for
    /// a sink edge.
    fn fwd(&self, i: usize) -> usize {
        let c = self.edge_class(i);
        if c == 0 {
            return NPOS;
        }
        let ordinal = self.last_rank(self.f()[c as usize]) + self.w_rank(c, i);
        self.node_end_of(ordinal)
    }

    /// Returns the first incoming edge of the source node of edge `i`, or
    /// [`NPOS`] if the node has no incoming edges.
    fn bwd(&self, i: usize) -> usize {
        let d = self.node_last_symbol(i);
        if d == 0 {
            return NPOS;
        }
        let rank_in_class = self.node_rank(i) - self.last_rank(self.f()[d as usize]);
        match self.w_select(d, rank_in_class - 1) {
            Some(edge) => edge,
            None => NPOS,
        }
    }

    /// Locates the nodes whose label ends with `chars`.
    ///
    /// Returns the edge range of the matching nodes, or the 1-based ordinal
    /// at which such a node would be inserted. An empty pattern matches
    /// every node. A leading sentinel run matches the all-sentinel root.
    fn node_interval(&self, chars: &[u8]) -> Result<(usize, usize), usize> {
        if chars.is_empty() {
            return Ok((1, self.num_edges()));
        }
        let f = self.f();

        let mut start = 0;
        while start < chars.len() && chars[start] == 0 {
            start += 1;
        }
        let first = if start == 0 { chars[0] as usize } else { 0 };
        let mut lo = f[first] + 1;
        let mut hi = f[first + 1];
        let mut ordinal = self.last_rank(f[first]) + 1;

        let begin = if start == 0 { 1 } else { start };
        for t in begin..chars.len() {
            let c = chars[t];
            debug_assert!(c != 0, "Sentinels are only valid as a node prefix");
            let o_lo = self.last_rank(f[c as usize]) + self.w_rank(c, lo - 1) + 1;
            let o_hi = self.last_rank(f[c as usize]) + self.w_rank(c, hi);
            ordinal = o_lo;
            lo = self.node_begin_of(o_lo);
            hi = if o_hi < o_lo { lo - 1 } else { self.node_end_of(o_hi) };
        }

        if lo <= hi { Ok((lo, hi)) } else { Err(ordinal) }
    }

    /// Returns the edge with the given `(k+1)`-mer, or [`NPOS`].
    fn edge_index(&self, kmer: &[u8]) -> usize {
        debug_assert_eq!(kmer.len(), self.k() + 1);
        if let Ok((lo, hi)) = self.node_interval(&kmer[..self.k()]) {
            for edge in lo..=hi {
                if self.edge_class(edge) == kmer[self.k()] {
                    return edge;
                }
            }
        }
        NPOS
    }

    /// Reconstructs the source node of edge `i`, with sentinels padding
    /// dummy nodes on the left.
    fn node_symbols(&self, i: usize) -> Vec<u8> {
        let mut result = vec![0u8; self.k()];
        let mut edge = i;
        for t in (0..self.k()).rev() {
            let d = self.node_last_symbol(edge);
            result[t] = d;
            if d == 0 {
                break;
            }
            edge = self.bwd(edge);
            debug_assert_ne!(edge, NPOS);
        }
        result
    }

    /// Follows the outgoing edge labeled with `symbol`, returning the last
    /// edge of the target node or [`NPOS`].
    fn traverse_symbol(&self, i: usize, symbol: u8) -> usize {
        if symbol == 0 || symbol as usize >= SIGMA {
            return NPOS;
        }
        let (lo, hi) = self.node_range_of(i);
        for edge in lo..=hi {
            if self.edge_class(edge) == symbol {
                return self.fwd(edge);
            }
        }
        NPOS
    }

    /// Returns the number of outgoing edges of the source node of edge `i`,
    /// including a possible sink edge.
    fn outdegree(&self, i: usize) -> usize {
        let (lo, hi) = self.node_range_of(i);
        hi - lo + 1
    }

    /// Returns the number of incoming edges of the source node of edge `i`.
    fn indegree(&self, i: usize) -> usize {
        let d = self.node_last_symbol(i);
        if d == 0 {
            return 0;
        }
        let rank_in_class = self.node_rank(i) - self.last_rank(self.f()[d as usize]);
        let first = match self.w_select(d, rank_in_class - 1) {
            Some(edge) => edge,
            None => return 0,
        };
        let bound = match self.w_select(d, rank_in_class) {
            Some(edge) => edge,
            None => self.num_edges() + 1,
        };
        1 + self.w_rank(d + SIGMA as u8, bound - 1) - self.w_rank(d + SIGMA as u8, first)
    }
}

//-----------------------------------------------------------------------------

/// An immutable BOSS graph with compact rank / select structures.
///
/// See the module documentation for the representation and an example.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Boss {
    k: usize,
    canonical: bool,
    f: FArray,
    w: WaveletTree,
    last: BitVector,
}

impl BossTable for Boss {
    #[inline]
    fn k(&self) -> usize {
        self.k
    }

    #[inline]
    fn f(&self) -> &FArray {
        &self.f
    }

    #[inline]
    fn num_edges(&self) -> usize {
        self.w.len()
    }

    #[inline]
    fn w_value(&self, i: usize) -> u8 {
        self.w.get(i - 1)
    }

    #[inline]
    fn w_rank(&self, value: u8, i: usize) -> usize {
        self.w.rank(value, i)
    }

    #[inline]
    fn w_select(&self, value: u8, rank: usize) -> Option<usize> {
        self.w.select(value, rank).map(|pos| pos + 1)
    }

    #[inline]
    fn last_value(&self, i: usize) -> bool {
        self.last.get(i - 1)
    }

    #[inline]
    fn last_rank(&self, i: usize) -> usize {
        self.last.rank(i)
    }

    #[inline]
    fn last_select(&self, rank: usize) -> Option<usize> {
        self.last.select(rank).map(|pos| pos + 1)
    }
}

/// Statistics and low-level access.
impl Boss {
    // Builds a graph from raw parts. The caller is responsible for the
    // invariants.
    pub(crate) fn from_parts(k: usize, canonical: bool, w: &[u8], last_bits: &[bool], f: FArray) -> Self {
        debug_assert_eq!(w.len(), last_bits.len());
        debug_assert_eq!(f[SIGMA], w.len());
        let w = WaveletTree::from_symbols(w, W_SIGMA);
        let mut raw = RawVector::with_capacity(last_bits.len());
        for bit in last_bits {
            raw.push_bit(*bit);
        }
        let mut last = BitVector::from(raw);
        last.enable_rank();
        last.enable_select();
        Boss { k, canonical, f, w, last }
    }

    /// Returns the node length of the graph.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns `true` if the graph stores both strands of every k-mer.
    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// Returns the number of edges, including dummy edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.w.len()
    }

    /// Returns the number of nodes, including dummy nodes.
    pub fn num_nodes(&self) -> usize {
        BossTable::num_nodes(self)
    }

    /// Returns the cumulative symbol counts.
    #[inline]
    pub fn f_array(&self) -> &FArray {
        &self.f
    }

    /// Returns the symbol of edge `i` without the duplication flag.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn edge_symbol(&self, i: usize) -> u8 {
        self.edge_class(i)
    }

    /// Returns the packed `(k+1)`-mer key of edge `i`.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn edge_key(&self, i: usize) -> u128 {
        support::pack_edge(&self.node_symbols(i), self.edge_class(i))
    }
}

/// Navigation.
impl Boss {
    /// Returns the edge with the given `(k+1)`-mer string, or [`NPOS`] if
    /// the string is absent or contains symbols outside the alphabet.
    pub fn kmer_to_edge(&self, kmer: &str) -> usize {
        if kmer.len() != self.k + 1 {
            return NPOS;
        }
        let mut symbols = Vec::with_capacity(kmer.len());
        for c in kmer.bytes() {
            match support::encode_char(c) {
                Some(symbol) => symbols.push(symbol),
                None => return NPOS,
            }
        }
        // Sentinels may only pad the node on the left or mark a sink edge.
        let run = symbols[..self.k].iter().take_while(|s| **s == 0).count();
        if symbols[run..self.k].contains(&0) {
            return NPOS;
        }
        self.edge_index(&symbols)
    }

    /// Returns the source node of edge `i` as a string, with `$` padding
    /// dummy nodes.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not a valid edge index.
    pub fn get_node_sequence(&self, i: usize) -> String {
        assert!(i >= 1 && i <= self.num_edges(), "Boss: Invalid edge index {}", i);
        support::decode_sequence(&self.node_symbols(i))
    }

    /// Returns the `(k+1)`-mer of edge `i` as a string.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not a valid edge index.
    pub fn edge_sequence(&self, i: usize) -> String {
        assert!(i >= 1 && i <= self.num_edges(), "Boss: Invalid edge index {}", i);
        let mut symbols = self.node_symbols(i);
        symbols.push(self.edge_class(i));
        support::decode_sequence(&symbols)
    }

    /// Follows the outgoing edge labeled with character `c`, returning the
    /// last edge of the target node or [`NPOS`].
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn traverse(&self, i: usize, c: u8) -> usize {
        match support::encode_char(c) {
            Some(symbol) => self.traverse_symbol(i, symbol),
            None => NPOS,
        }
    }

    /// Returns the last edge of the target node of edge `i`, or [`NPOS`]
    /// for a sink edge.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn next_edge(&self, i: usize) -> usize {
        self.fwd(i)
    }

    /// Returns the first incoming edge of the source node of edge `i`, or
    /// [`NPOS`] if the node has no incoming edges.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn prev_edge(&self, i: usize) -> usize {
        self.bwd(i)
    }

    /// Calls `callback(edge, c)` for every real outgoing edge of the source
    /// node of edge `i`, where `edge` is the last edge of the target node
    /// and `c` is the edge character.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn call_outgoing<F: FnMut(usize, u8)>(&self, i: usize, mut callback: F) {
        let (lo, hi) = self.node_range_of(i);
        for edge in lo..=hi {
            let symbol = self.edge_class(edge);
            if symbol != 0 {
                callback(self.fwd(edge), support::decode_symbol(symbol));
            }
        }
    }

    /// Calls `callback(edge, c)` for every incoming edge of the source node
    /// of edge `i`, where `c` is the first character of the predecessor
    /// node.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn call_incoming<F: FnMut(usize, u8)>(&self, i: usize, mut callback: F) {
        let d = self.node_last_symbol(i);
        if d == 0 {
            return;
        }
        let rank_in_class = self.node_rank(i) - self.last_rank(self.f[d as usize]);
        let first = match self.w_select(d, rank_in_class - 1) {
            Some(edge) => edge,
            None => return,
        };
        let bound = match self.w_select(d, rank_in_class) {
            Some(edge) => edge,
            None => self.num_edges() + 1,
        };
        callback(first, support::decode_symbol(self.node_symbols(first)[0]));
        for edge in first + 1..bound {
            if self.w_value(edge) == d + SIGMA as u8 {
                callback(edge, support::decode_symbol(self.node_symbols(edge)[0]));
            }
        }
    }

    /// Returns the number of outgoing edges of the source node of edge `i`,
    /// including a possible sink edge.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn node_outdegree(&self, i: usize) -> usize {
        self.outdegree(i)
    }

    /// Returns the number of incoming edges of the source node of edge `i`.
    ///
    /// # Panics
    ///
    /// May panic if `i` is not a valid edge index.
    pub fn node_indegree(&self, i: usize) -> usize {
        self.indegree(i)
    }

    /// Maps every window of `len` characters to the last edge of the last
    /// matching node, or [`NPOS`] when the window does not match or contains
    /// characters outside the alphabet.
    ///
    /// With `len == self.k()`, consecutive results form traversal chains:
    /// `traverse(result[t], sequence[t + k]) == result[t + 1]` whenever both
    /// are present.
    ///
    /// # Panics
    ///
    /// Panics if `len == 0` or `len > self.k()`.
    pub fn align(&self, sequence: &str, len: usize) -> Vec<usize> {
        assert!(len >= 1 && len <= self.k, "Boss: Invalid match length {}", len);
        let bytes = sequence.as_bytes();
        if bytes.len() < len {
            return Vec::new();
        }
        let symbols: Vec<Option<u8>> = bytes.iter().map(|c| support::encode_char(*c)).collect();

        let mut result = Vec::with_capacity(bytes.len() - len + 1);
        let mut window: Vec<u8> = Vec::with_capacity(len);
        for t in 0..=bytes.len() - len {
            window.clear();
            let mut valid = true;
            for symbol in &symbols[t..t + len] {
                match symbol {
                    Some(s) if *s > 0 => window.push(*s),
                    _ => { valid = false; break; }
                }
            }
            if !valid {
                result.push(NPOS);
                continue;
            }
            match self.node_interval(&window) {
                Ok((_, hi)) => result.push(hi),
                Err(_) => result.push(NPOS),
            }
        }
        result
    }

    /// Maps every k-mer of the sequence to the last edge of its node, or
    /// [`NPOS`] when absent.
    pub fn map_to_edges(&self, sequence: &str) -> Vec<usize> {
        self.align(sequence, self.k)
    }

    /// Calls `callback(edge, kmer)` for every edge in lexicographic order.
    pub fn call_kmers<F: FnMut(usize, &str)>(&self, mut callback: F) {
        for edge in 1..=self.num_edges() {
            callback(edge, &self.edge_sequence(edge));
        }
    }
}

/// State transitions.
impl Boss {
    /// Rebuilds the graph in the mutable state.
    pub fn into_dynamic(self) -> DynBoss {
        DynBoss {
            k: self.k,
            canonical: self.canonical,
            f: self.f,
            w: DynSequence::from_symbols(&self.w.to_vec(), W_SIGMA),
            last: DynBitVector::from_bits(&(1..=self.last.len()).map(|i| self.last.get(i - 1)).collect::<Vec<bool>>()),
        }
    }
}

impl Serialize for Boss {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let mut header = Header::<BossPayload>::new();
        header.payload_mut().k = self.k;
        header.payload_mut().edges = self.num_edges();
        if self.canonical {
            header.set(BossPayload::FLAG_CANONICAL);
        }
        header.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let f: Vec<u64> = self.f.iter().map(|x| *x as u64).collect();
        f.serialize(writer)?;
        self.w.serialize(writer)?;
        self.last.serialize(writer)?;
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let header = Header::<BossPayload>::load(reader)?;
        if let Err(msg) = header.validate() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
        }
        let payload = *header.payload();
        if payload.k < 2 || payload.k > MAX_K {
            return Err(io::Error::new(io::ErrorKind::InvalidData, format!("Boss: Invalid node length {}", payload.k)));
        }

        let f_vec = Vec::<u64>::load(reader)?;
        if f_vec.len() != SIGMA + 1 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Boss: Invalid symbol counts"));
        }
        let mut f: FArray = [0; SIGMA + 1];
        for (d, value) in f_vec.iter().enumerate() {
            f[d] = *value as usize;
        }

        let w = WaveletTree::load(reader)?;
        let mut last = BitVector::load(reader)?;
        last.enable_rank();
        last.enable_select();

        if w.len() != payload.edges || last.len() != payload.edges || f[SIGMA] != payload.edges {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Boss: Edge count mismatch"));
        }

        Ok(Boss {
            k: payload.k,
            canonical: header.is_set(BossPayload::FLAG_CANONICAL),
            f,
            w,
            last,
        })
    }

    fn size_in_elements(&self) -> usize {
        let header = Header::<BossPayload>::new();
        header.size_in_elements()
            + (SIGMA + 2)
            + self.w.size_in_elements()
            + self.last.size_in_elements()
    }
}

//-----------------------------------------------------------------------------

/// A mutable BOSS graph supporting edge insertion.
///
/// A new graph consists of the single sentinel edge from the all-`$` root.
/// Insertions keep the table closed: whenever an edge reaches a node with no
/// outgoing edges, the node is materialized with a sink edge, and a sink
/// edge is dropped again when its node gains a real outgoing edge. This
/// makes the content identical to what the chunked constructor produces for
/// the same input, regardless of insertion order.
///
/// See the module documentation for an example.
#[derive(Clone, Debug)]
pub struct DynBoss {
    k: usize,
    canonical: bool,
    f: FArray,
    w: DynSequence,
    last: DynBitVector,
}

impl BossTable for DynBoss {
    #[inline]
    fn k(&self) -> usize {
        self.k
    }

    #[inline]
    fn f(&self) -> &FArray {
        &self.f
    }

    #[inline]
    fn num_edges(&self) -> usize {
        self.w.len()
    }

    #[inline]
    fn w_value(&self, i: usize) -> u8 {
        self.w.get(i - 1)
    }

    #[inline]
    fn w_rank(&self, value: u8, i: usize) -> usize {
        self.w.rank(value, i)
    }

    #[inline]
    fn w_select(&self, value: u8, rank: usize) -> Option<usize> {
        self.w.select(value, rank).map(|pos| pos + 1)
    }

    #[inline]
    fn last_value(&self, i: usize) -> bool {
        self.last.get(i - 1)
    }

    #[inline]
    fn last_rank(&self, i: usize) -> usize {
        self.last.rank1(i)
    }

    #[inline]
    fn last_select(&self, rank: usize) -> Option<usize> {
        self.last.select1(rank).map(|pos| pos + 1)
    }
}

impl DynBoss {
    /// Creates an empty graph with the given node length.
    pub fn new(k: usize) -> Result<Self, Error> {
        Self::with_mode(k, false)
    }

    /// Creates an empty graph, optionally in canonical mode.
    ///
    /// In canonical mode, [`DynBoss::add_sequence`] also inserts the reverse
    /// complement of every sequence.
    pub fn with_mode(k: usize, canonical: bool) -> Result<Self, Error> {
        if k < 2 || k > MAX_K {
            return Err(Error::UnsupportedK(k));
        }
        let mut f: FArray = [1; SIGMA + 1];
        f[0] = 0;
        Ok(DynBoss {
            k,
            canonical,
            f,
            w: DynSequence::from_symbols(&[0], W_SIGMA),
            last: DynBitVector::from_bits(&[true]),
        })
    }

    /// Returns the node length of the graph.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns `true` if the graph stores both strands of every k-mer.
    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// Returns the number of edges, including dummy edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.w.len()
    }

    /// Returns the number of nodes, including dummy nodes.
    pub fn num_nodes(&self) -> usize {
        BossTable::num_nodes(self)
    }

    // Inserts the edge `(node, symbol)` and returns `(edge, inserted)`.
    //
    // The table stays closed: if the edge is the first one reaching its
    // target, the target node is materialized with a sink edge in the same
    // call. All searches run before the first mutation, so they always see
    // a consistent table.
    pub(crate) fn insert_edge(&mut self, node: &[u8], symbol: u8) -> (usize, bool) {
        debug_assert_eq!(node.len(), self.k);
        debug_assert!((symbol as usize) < SIGMA);
        let row = self.node_interval(node);

        // The position of the new edge, and whether it replaces a sink edge.
        let (position, replace) = match row {
            Ok((lo, hi)) => {
                for edge in lo..=hi {
                    if self.edge_class(edge) == symbol {
                        return (edge, false);
                    }
                }
                if symbol == 0 {
                    // A sink edge is redundant once the node has real edges.
                    return (NPOS, false);
                }
                if hi == lo && self.edge_class(lo) == 0 {
                    (lo, true)
                } else {
                    let mut position = lo;
                    while position <= hi && self.edge_class(position) < symbol {
                        position += 1;
                    }
                    (position, false)
                }
            }
            Err(ordinal) => (self.node_begin_of(ordinal), false),
        };

        // The existing unflagged edge with the same target, if any. Edges
        // reaching the target come from the nodes that share our node's
        // proper suffix.
        let mut existing = NPOS;
        if symbol != 0 {
            if let Ok((lo, hi)) = self.node_interval(&node[1..]) {
                let rank = self.w_rank(symbol, lo - 1);
                if let Some(edge) = self.w_select(symbol, rank) {
                    if edge <= hi {
                        existing = edge;
                    }
                }
            }
        }
        let mut value = symbol;
        if existing != NPOS {
            if existing < position {
                value += SIGMA as u8;
            } else {
                // The new edge comes from a colex-smaller node and takes
                // over as the unflagged edge of the target.
                self.w.set(existing - 1, symbol + SIGMA as u8);
            }
        }

        // Mutate the table.
        let node_class = node[self.k - 1] as usize;
        if replace {
            self.w.set(position - 1, value);
        } else {
            match row {
                Ok((_, hi)) => {
                    self.w.insert(position - 1, value);
                    if position <= hi {
                        self.last.insert(position - 1, false);
                    } else {
                        self.last.insert(position - 1, true);
                        self.last.set(hi - 1, false);
                    }
                }
                Err(_) => {
                    self.w.insert(position - 1, value);
                    self.last.insert(position - 1, true);
                }
            }
            for d in node_class + 1..=SIGMA {
                self.f[d] += 1;
            }
        }

        // Materialize the target node if this is its first incoming edge.
        let mut result = position;
        if symbol != 0 && existing == NPOS && !node.iter().all(|s| *s == symbol) {
            let ordinal = self.last_rank(self.f[symbol as usize]) + self.w_rank(symbol, position);
            let target = self.node_begin_of(ordinal);
            self.w.insert(target - 1, 0);
            self.last.insert(target - 1, true);
            for d in symbol as usize + 1..=SIGMA {
                self.f[d] += 1;
            }
            if target <= result {
                result += 1;
            }
        }

        (result, true)
    }

    /// Inserts all `(k+1)`-mers of the sequence, with the dummy edges needed
    /// to keep every node reachable. Returns the number of inserted edges.
    ///
    /// Sequences shorter than `k + 1` are skipped. In canonical mode, the
    /// reverse complement is inserted as well.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSequence`] if the sequence contains
    /// characters outside the alphabet; the graph is not modified.
    pub fn add_sequence(&mut self, sequence: &str) -> Result<usize, Error> {
        let encoded = support::encode_sequence(sequence)?;
        let mut inserted = self.add_symbols(&encoded);
        if self.canonical {
            inserted += self.add_symbols(&support::reverse_complement(&encoded));
        }
        Ok(inserted)
    }

    // Inserts the edges of an encoded sequence.
    fn add_symbols(&mut self, encoded: &[u8]) -> usize {
        if encoded.len() < self.k + 1 {
            return 0;
        }
        let mut padded = vec![0u8; self.k];
        padded.extend_from_slice(encoded);
        padded.push(0);

        let mut inserted = 0;
        for t in 0..padded.len() - self.k {
            let (node, rest) = padded[t..].split_at(self.k);
            if self.insert_edge(node, rest[0]).1 {
                inserted += 1;
            }
        }
        inserted
    }

    /// Inserts every edge of another graph into this one. Returns the
    /// number of inserted edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KMismatch`] if the node lengths differ; the graph
    /// is not modified.
    pub fn merge(&mut self, other: &Boss) -> Result<usize, Error> {
        if self.k != other.k() {
            return Err(Error::KMismatch(self.k, other.k()));
        }
        // Traverse the source graph from the all-sentinel root. An edge can
        // only be inserted once its source node exists, and a node comes
        // into existence when its first incoming edge is inserted; the
        // traversal order guarantees both. Every node is reachable from the
        // root through the dummy chain of the sequence that introduced it.
        let mut inserted = 0;
        let mut visited = vec![false; other.num_nodes() + 1];
        let mut stack: Vec<usize> = vec![1];
        while let Some(ordinal) = stack.pop() {
            if visited[ordinal] {
                continue;
            }
            visited[ordinal] = true;
            let lo = other.node_begin_of(ordinal);
            let hi = other.node_end_of(ordinal);
            let node = other.node_symbols(lo);
            let root = node.iter().all(|s| *s == 0);
            for edge in lo..=hi {
                let symbol = other.edge_class(edge);
                if symbol == 0 {
                    if !root && self.insert_edge(&node, symbol).1 {
                        inserted += 1;
                    }
                    continue;
                }
                if self.insert_edge(&node, symbol).1 {
                    inserted += 1;
                }
                stack.push(other.node_rank(other.fwd(edge)));
            }
        }
        debug_assert!(visited.iter().skip(1).all(|v| *v), "Merge: Unreachable source nodes");
        Ok(inserted)
    }

    /// Builds the compact rank / select structures and freezes the graph.
    pub fn into_static(self) -> Boss {
        Boss::from_parts(self.k, self.canonical, &self.w.to_vec(), &self.last.to_bits(), self.f)
    }
}

//-----------------------------------------------------------------------------
