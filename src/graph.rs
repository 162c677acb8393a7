//! De Bruijn graph variants behind a common interface.
//!
//! The capability set of a de Bruijn graph is expressed as the
//! [`DeBruijnGraph`] trait: k-mer lookup, sequence mapping, traversal, and
//! neighborhood enumeration over abstract node identifiers. Four variants
//! implement it:
//!
//! * [`SuccinctDbg`]: a [`Boss`] graph, with edge indexes as node
//!   identifiers;
//! * [`HashDbg`]: a small ordered-map graph for query batches;
//! * [`MaskedDbg`]: a runtime-filtered view over a shared graph;
//! * [`CanonicalDbg`]: a view that looks k-mers up in both orientations.
//!
//! The wrappers hold shared read-only references, so stacking them does
//! not copy the underlying graph.

use crate::boss::{Boss, BossTable};
use crate::support::{self, Bitmap};
use crate::{Error, MAX_K, NPOS, SIGMA};

use std::collections::BTreeMap;
use std::sync::Arc;


//-----------------------------------------------------------------------------

/// The capability set shared by all de Bruijn graph variants.
///
/// Nodes are identified by nonzero indexes up to [`DeBruijnGraph::max_index`];
/// [`NPOS`] marks a missing node. All sequence arguments at the trait level
/// are encoded symbols.
pub trait DeBruijnGraph: Send + Sync {
    /// Returns the node length of the graph.
    fn k(&self) -> usize;

    /// Returns the number of nodes in the graph.
    fn num_nodes(&self) -> usize;

    /// Returns the largest node identifier.
    fn max_index(&self) -> usize;

    /// Returns `true` if the graph stores both strands of every k-mer.
    fn is_canonical(&self) -> bool;

    /// Returns the node with the given encoded k-mer, or [`NPOS`].
    fn map_kmer(&self, kmer: &[u8]) -> usize;

    /// Follows the outgoing edge labeled with the symbol, or returns
    /// [`NPOS`].
    fn traverse(&self, node: usize, symbol: u8) -> usize;

    /// Calls `callback(target, symbol)` for every outgoing edge.
    fn call_outgoing(&self, node: usize, callback: &mut dyn FnMut(usize, u8));

    /// Calls `callback(source, symbol)` for every incoming edge, where the
    /// symbol is the first symbol of the source node.
    fn call_incoming(&self, node: usize, callback: &mut dyn FnMut(usize, u8));

    /// Calls `callback` for every node of the graph.
    fn call_nodes(&self, callback: &mut dyn FnMut(usize));

    /// Returns the encoded k-mer of the node.
    ///
    /// # Panics
    ///
    /// May panic if the node does not exist.
    fn node_symbols(&self, node: usize) -> Vec<u8>;

    /// Returns `true` if the graph contains the encoded k-mer.
    fn contains(&self, kmer: &[u8]) -> bool {
        self.map_kmer(kmer) != NPOS
    }

    /// Returns the k-mer of the node as a string.
    fn node_sequence(&self, node: usize) -> String {
        support::decode_sequence(&self.node_symbols(node))
    }

    /// Calls `callback` with the node of every k-mer of the sequence in
    /// order, with [`NPOS`] for k-mers that are absent or contain
    /// characters outside the alphabet.
    fn map_to_nodes(&self, sequence: &str, callback: &mut dyn FnMut(usize)) {
        let bytes = sequence.as_bytes();
        if bytes.len() < self.k() {
            return;
        }
        let symbols: Vec<Option<u8>> = bytes.iter().map(|c| support::encode_char(*c)).collect();
        let mut window: Vec<u8> = Vec::with_capacity(self.k());
        for t in 0..=bytes.len() - self.k() {
            window.clear();
            let mut valid = true;
            for symbol in &symbols[t..t + self.k()] {
                match symbol {
                    Some(s) if *s > 0 => window.push(*s),
                    _ => { valid = false; break; }
                }
            }
            callback(if valid { self.map_kmer(&window) } else { NPOS });
        }
    }
}

//-----------------------------------------------------------------------------

/// A [`Boss`] graph exposed through the common interface.
///
/// Node identifiers are edge indexes; a node is represented by the last of
/// its outgoing edges.
#[derive(Clone, Debug)]
pub struct SuccinctDbg {
    boss: Arc<Boss>,
}

impl SuccinctDbg {
    /// Creates a view over a shared graph.
    pub fn new(boss: Arc<Boss>) -> Self {
        SuccinctDbg { boss }
    }

    /// Returns a reference to the underlying graph.
    #[inline]
    pub fn boss(&self) -> &Boss {
        &self.boss
    }
}

impl DeBruijnGraph for SuccinctDbg {
    fn k(&self) -> usize {
        self.boss.k()
    }

    fn num_nodes(&self) -> usize {
        self.boss.num_nodes()
    }

    fn max_index(&self) -> usize {
        self.boss.num_edges()
    }

    fn is_canonical(&self) -> bool {
        self.boss.is_canonical()
    }

    fn map_kmer(&self, kmer: &[u8]) -> usize {
        debug_assert_eq!(kmer.len(), self.k());
        match self.boss.node_interval(kmer) {
            Ok((_, hi)) => hi,
            Err(_) => NPOS,
        }
    }

    fn traverse(&self, node: usize, symbol: u8) -> usize {
        self.boss.traverse_symbol(node, symbol)
    }

    fn call_outgoing(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        let (lo, hi) = self.boss.node_range_of(node);
        for edge in lo..=hi {
            let symbol = self.boss.edge_class(edge);
            if symbol != 0 {
                callback(self.boss.next_edge(edge), symbol);
            }
        }
    }

    fn call_incoming(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        self.boss.call_incoming(node, |edge, c| {
            if let Some(symbol) = support::encode_char(c) {
                // Report the source by its representative edge.
                let (_, hi) = self.boss.node_range_of(edge);
                callback(hi, symbol);
            }
        });
    }

    fn call_nodes(&self, callback: &mut dyn FnMut(usize)) {
        for edge in 1..=self.boss.num_edges() {
            if self.boss.last_value(edge) {
                callback(edge);
            }
        }
    }

    fn node_symbols(&self, node: usize) -> Vec<u8> {
        BossTable::node_symbols(self.boss.as_ref(), node)
    }
}

//-----------------------------------------------------------------------------

/// A small de Bruijn graph over an ordered k-mer map.
///
/// The graph assigns dense identifiers in insertion order and keeps
/// per-node multiplicities. In canonical mode every k-mer is stored in its
/// canonical form and looked up in both orientations.
///
/// # Examples
///
/// ```
/// use metadbg::graph::{DeBruijnGraph, HashDbg};
///
/// let mut graph = HashDbg::new(3, false).unwrap();
/// graph.add_sequence("GATTACA").unwrap();
/// assert_eq!(graph.num_nodes(), 5);
/// let mut contigs: Vec<String> = Vec::new();
/// graph.call_sequences(|sequence, _| contigs.push(sequence));
/// assert_eq!(contigs, vec!["GATTACA"]);
/// ```
#[derive(Clone, Debug)]
pub struct HashDbg {
    k: usize,
    canonical: bool,
    ids: BTreeMap<Vec<u8>, usize>,
    nodes: Vec<Vec<u8>>,
    counts: Vec<u32>,
}

impl HashDbg {
    /// Creates an empty graph.
    pub fn new(k: usize, canonical: bool) -> Result<Self, Error> {
        if k < 2 || k > MAX_K {
            return Err(Error::UnsupportedK(k));
        }
        Ok(HashDbg {
            k,
            canonical,
            ids: BTreeMap::new(),
            nodes: Vec::new(),
            counts: Vec::new(),
        })
    }

    // The form in which a k-mer is stored.
    fn stored_form(&self, kmer: &[u8]) -> Vec<u8> {
        if self.canonical {
            let rc = support::reverse_complement(kmer);
            if rc.as_slice() < kmer {
                return rc;
            }
        }
        kmer.to_vec()
    }

    /// Inserts all k-mers of the sequence and returns the number of new
    /// nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSequence`] if the sequence contains
    /// characters outside the alphabet; the graph is not modified.
    pub fn add_sequence(&mut self, sequence: &str) -> Result<usize, Error> {
        let encoded = support::encode_sequence(sequence)?;
        if encoded.len() < self.k {
            return Ok(0);
        }
        let mut inserted = 0;
        for window in encoded.windows(self.k) {
            let stored = self.stored_form(window);
            match self.ids.get(&stored) {
                Some(id) => {
                    self.counts[*id - 1] += 1;
                }
                None => {
                    let id = self.nodes.len() + 1;
                    self.ids.insert(stored.clone(), id);
                    self.nodes.push(stored);
                    self.counts.push(1);
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }

    /// Returns the multiplicity of the node.
    ///
    /// # Panics
    ///
    /// May panic if the node does not exist.
    #[inline]
    pub fn count(&self, node: usize) -> u32 {
        self.counts[node - 1]
    }

    /// Calls `callback(sequence, path)` for every unitig of the graph: a
    /// maximal path whose internal nodes have a single incoming and a
    /// single outgoing edge. Every node belongs to exactly one unitig, and
    /// the unitigs are reported in the identifier order of their first
    /// nodes.
    pub fn call_sequences<F: FnMut(String, Vec<usize>)>(&self, mut callback: F) {
        let mut visited = vec![false; self.nodes.len() + 1];
        for seed in 1..=self.nodes.len() {
            if visited[seed] {
                continue;
            }

            // Walk back to the start of the unitig.
            let mut begin = seed;
            loop {
                let mut incoming: Vec<usize> = Vec::new();
                self.call_incoming(begin, &mut |source, _| incoming.push(source));
                if incoming.len() != 1 || visited[incoming[0]] || incoming[0] == seed {
                    break;
                }
                let mut outgoing = 0;
                self.call_outgoing(incoming[0], &mut |_, _| outgoing += 1);
                if outgoing != 1 {
                    break;
                }
                begin = incoming[0];
            }

            // Walk forward as long as the path stays unbranched.
            let mut path = vec![begin];
            visited[begin] = true;
            let mut symbols = self.node_symbols(begin);
            let mut current = begin;
            loop {
                let mut outgoing: Vec<(usize, u8)> = Vec::new();
                self.call_outgoing(current, &mut |target, symbol| outgoing.push((target, symbol)));
                if outgoing.len() != 1 {
                    break;
                }
                let (target, symbol) = outgoing[0];
                let mut incoming = 0;
                self.call_incoming(target, &mut |_, _| incoming += 1);
                if incoming != 1 || visited[target] {
                    break;
                }
                visited[target] = true;
                path.push(target);
                symbols.push(symbol);
                current = target;
            }

            callback(support::decode_sequence(&symbols), path);
        }
    }
}

impl DeBruijnGraph for HashDbg {
    fn k(&self) -> usize {
        self.k
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn max_index(&self) -> usize {
        self.nodes.len()
    }

    fn is_canonical(&self) -> bool {
        self.canonical
    }

    fn map_kmer(&self, kmer: &[u8]) -> usize {
        debug_assert_eq!(kmer.len(), self.k);
        match self.ids.get(&self.stored_form(kmer)) {
            Some(id) => *id,
            None => NPOS,
        }
    }

    fn traverse(&self, node: usize, symbol: u8) -> usize {
        if symbol == 0 || symbol as usize >= SIGMA {
            return NPOS;
        }
        let mut kmer = self.nodes[node - 1][1..].to_vec();
        kmer.push(symbol);
        self.map_kmer(&kmer)
    }

    fn call_outgoing(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        for symbol in 1..SIGMA as u8 {
            let target = self.traverse(node, symbol);
            if target != NPOS {
                callback(target, symbol);
            }
        }
    }

    fn call_incoming(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        for symbol in 1..SIGMA as u8 {
            let mut kmer = vec![symbol];
            kmer.extend_from_slice(&self.nodes[node - 1][..self.k - 1]);
            let source = self.map_kmer(&kmer);
            if source != NPOS {
                callback(source, symbol);
            }
        }
    }

    fn call_nodes(&self, callback: &mut dyn FnMut(usize)) {
        for node in 1..=self.nodes.len() {
            callback(node);
        }
    }

    fn node_symbols(&self, node: usize) -> Vec<u8> {
        self.nodes[node - 1].clone()
    }
}

//-----------------------------------------------------------------------------

/// A runtime-filtered view over a shared graph.
///
/// The view owns a mask with one bit per node identifier; every navigation
/// result is filtered through it. The node count and the identifiers stay
/// those of the underlying graph, so indexes remain stable across mask
/// updates.
pub struct MaskedDbg {
    graph: Arc<dyn DeBruijnGraph>,
    mask: Bitmap,
}

impl MaskedDbg {
    /// Creates a masked view.
    ///
    /// # Panics
    ///
    /// Panics if the mask length is not `max_index + 1` or the reserved
    /// index is set.
    pub fn new(graph: Arc<dyn DeBruijnGraph>, mask: Bitmap) -> Self {
        assert_eq!(mask.len(), graph.max_index() + 1, "MaskedDbg: Mask length mismatch");
        assert!(!mask.get(NPOS), "MaskedDbg: The reserved index is set");
        MaskedDbg { graph, mask }
    }

    /// Returns `true` if the node is in the view.
    #[inline]
    pub fn in_graph(&self, node: usize) -> bool {
        node != NPOS && self.mask.get(node)
    }

    /// Returns the number of nodes in the view.
    pub fn num_masked_nodes(&self) -> usize {
        self.mask.count_ones()
    }

    // Filters a node through the mask.
    #[inline]
    fn filter(&self, node: usize) -> usize {
        if self.in_graph(node) { node } else { NPOS }
    }
}

impl DeBruijnGraph for MaskedDbg {
    fn k(&self) -> usize {
        self.graph.k()
    }

    fn num_nodes(&self) -> usize {
        // The underlying count: identifiers must remain stable.
        self.graph.num_nodes()
    }

    fn max_index(&self) -> usize {
        self.graph.max_index()
    }

    fn is_canonical(&self) -> bool {
        self.graph.is_canonical()
    }

    fn map_kmer(&self, kmer: &[u8]) -> usize {
        self.filter(self.graph.map_kmer(kmer))
    }

    fn traverse(&self, node: usize, symbol: u8) -> usize {
        self.filter(self.graph.traverse(node, symbol))
    }

    fn call_outgoing(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        self.graph.call_outgoing(node, &mut |target, symbol| {
            if self.in_graph(target) {
                callback(target, symbol);
            }
        });
    }

    fn call_incoming(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        self.graph.call_incoming(node, &mut |source, symbol| {
            if self.in_graph(source) {
                callback(source, symbol);
            }
        });
    }

    fn call_nodes(&self, callback: &mut dyn FnMut(usize)) {
        self.mask.call_ones(|node| callback(node));
    }

    fn node_symbols(&self, node: usize) -> Vec<u8> {
        self.graph.node_symbols(node)
    }
}

//-----------------------------------------------------------------------------

/// A view that canonicalizes all lookups.
///
/// Every k-mer is looked up as itself and as its reverse complement. The
/// view is only valid over a graph built in canonical mode.
pub struct CanonicalDbg {
    graph: Arc<dyn DeBruijnGraph>,
}

impl CanonicalDbg {
    /// Creates a canonical view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCanonical`] if the underlying graph was not
    /// built in canonical mode.
    pub fn new(graph: Arc<dyn DeBruijnGraph>) -> Result<Self, Error> {
        if !graph.is_canonical() {
            return Err(Error::NotCanonical);
        }
        Ok(CanonicalDbg { graph })
    }
}

impl DeBruijnGraph for CanonicalDbg {
    fn k(&self) -> usize {
        self.graph.k()
    }

    fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    fn max_index(&self) -> usize {
        self.graph.max_index()
    }

    fn is_canonical(&self) -> bool {
        true
    }

    fn map_kmer(&self, kmer: &[u8]) -> usize {
        let node = self.graph.map_kmer(kmer);
        if node != NPOS {
            return node;
        }
        self.graph.map_kmer(&support::reverse_complement(kmer))
    }

    fn traverse(&self, node: usize, symbol: u8) -> usize {
        let target = self.graph.traverse(node, symbol);
        if target != NPOS {
            return target;
        }
        let mut kmer = self.graph.node_symbols(node)[1..].to_vec();
        kmer.push(symbol);
        self.map_kmer(&kmer)
    }

    fn call_outgoing(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        for symbol in 1..SIGMA as u8 {
            let target = self.traverse(node, symbol);
            if target != NPOS {
                callback(target, symbol);
            }
        }
    }

    fn call_incoming(&self, node: usize, callback: &mut dyn FnMut(usize, u8)) {
        for symbol in 1..SIGMA as u8 {
            let mut kmer = vec![symbol];
            kmer.extend_from_slice(&self.graph.node_symbols(node)[..self.k() - 1]);
            let source = self.map_kmer(&kmer);
            if source != NPOS {
                callback(source, symbol);
            }
        }
    }

    fn call_nodes(&self, callback: &mut dyn FnMut(usize)) {
        self.graph.call_nodes(callback);
    }

    fn node_symbols(&self, node: usize) -> Vec<u8> {
        self.graph.node_symbols(node)
    }
}

//-----------------------------------------------------------------------------
