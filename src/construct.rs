//! Chunked parallel construction of BOSS graphs.
//!
//! The constructor never holds the whole uncompressed graph in memory.
//! The node suffix space is partitioned into buckets of a fixed length;
//! each pass extracts the packed `(k+1)`-mers of one bucket from every
//! sequence in parallel, sorts and deduplicates them, and emits the
//! corresponding slice of the `(W, last)` tables as a [`Chunk`]. Bucket
//! order is the edge order of the graph, so concatenating the chunks and
//! deriving the cumulative symbol counts yields the finished graph.
//!
//! Passes over different buckets are sequential to bound peak memory;
//! parallelism lives inside a pass. The chunk emitted for a bucket is
//! byte-identical regardless of the thread count and the input order.
//!
//! Independent processes can build disjoint `(part, parts_total)` subsets
//! of the buckets, serialize them, and finish with [`merge_chunks`].
//!
//! # Examples
//!
//! ```
//! use metadbg::construct;
//!
//! let sequences = vec!["AAACGT".to_string(), "CGTCA".to_string()];
//! let graph = construct::build_boss(&sequences, 3, false, 4, 2, None).unwrap();
//! assert_ne!(graph.kmer_to_edge("AACG"), 0);
//! ```

use crate::boss::{Boss, FArray};
use crate::headers::{Header, ChunkPayload};
use crate::support;
use crate::{Error, MAX_K, SIGMA};

use simple_sds::raw_vector::{RawVector, AccessRaw, PushRaw};
use simple_sds::serialize::Serialize;

use rayon::prelude::*;

use std::io;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

// Default number of bytes a construction pass may buffer.
const DEFAULT_MEM_CAP: usize = 4 * 1024 * 1024 * 1024;

/// Returns the bucket suffix length for the requested number of splits.
///
/// The length is the smallest `l` with enough real-symbol suffixes for
/// `nsplits` buckets, capped by `k - 1`.
pub fn suffix_length(nsplits: usize, k: usize) -> usize {
    let mut length = 0;
    let mut buckets = 1;
    while buckets < nsplits && length < k - 1 {
        length += 1;
        buckets *= SIGMA - 1;
    }
    length
}

/// Returns the packed node suffixes of the given length in bucket order.
///
/// A suffix is a run of sentinels followed by real symbols, packed with
/// the node's last symbol as the most significant digit. Ascending packed
/// order is the colexicographic order of the nodes, which makes it the
/// concatenation order of the chunks.
pub fn valid_suffixes(length: usize) -> Vec<u128> {
    let mut result = Vec::new();
    let mut digits = vec![0u8; length];
    enumerate_suffixes(&mut digits, 0, &mut result);
    result
}

// Digit 0 is the node's last symbol; once a digit is a sentinel, all the
// following digits (earlier node positions) must be sentinels too.
fn enumerate_suffixes(digits: &mut Vec<u8>, position: usize, result: &mut Vec<u128>) {
    if position == digits.len() {
        let mut packed: u128 = 0;
        for digit in digits.iter() {
            packed = (packed << 3) | (*digit as u128);
        }
        result.push(packed);
        return;
    }
    let sentinel_run = position > 0 && digits[position - 1] == 0;
    let symbols: std::ops::Range<u8> = if sentinel_run { 0..1 } else { 0..SIGMA as u8 };
    for symbol in symbols {
        digits[position] = symbol;
        enumerate_suffixes(digits, position + 1, result);
    }
}

//-----------------------------------------------------------------------------

/// A slice of the BOSS tables for one suffix bucket.
///
/// The slice stores the `W` values and `last` bits of the bucket's edges
/// together with per-symbol edge counts, from which the cumulative counts
/// of the finished graph are derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    k: usize,
    w: Vec<u8>,
    last: Vec<bool>,
    counts: [usize; SIGMA],
}

impl Chunk {
    /// Creates an empty chunk.
    pub fn new(k: usize) -> Self {
        Chunk {
            k,
            w: Vec::new(),
            last: Vec::new(),
            counts: [0; SIGMA],
        }
    }

    /// Builds a chunk from sorted, deduplicated packed edge keys.
    ///
    /// Flags are resolved within the chunk: edges reaching the same target
    /// share the node suffix and the symbol, which places them in the same
    /// bucket. A sink edge whose node has real outgoing edges is dropped,
    /// matching the replacement rule of dynamic insertion.
    pub fn from_keys(k: usize, keys: &[u128]) -> Self {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        let mut result = Chunk::new(k);
        let mut last_target: [Option<u128>; SIGMA] = [None; SIGMA];
        let mut prev_node: Option<u128> = None;

        for (i, key) in keys.iter().enumerate() {
            let node = support::key_node(*key);
            let symbol = support::key_symbol(*key);
            if symbol == 0 && i + 1 < keys.len() && support::key_node(keys[i + 1]) == node {
                // Redundant sink edge.
                continue;
            }
            let suffix = support::key_node_suffix(*key);
            let mut value = symbol;
            if symbol != 0 {
                if last_target[symbol as usize] == Some(suffix) {
                    value += SIGMA as u8;
                } else {
                    last_target[symbol as usize] = Some(suffix);
                }
            }
            if prev_node == Some(node) {
                let bit = result.last.len() - 1;
                result.last[bit] = false;
            }
            prev_node = Some(node);
            result.w.push(value);
            result.last.push(true);
            result.counts[support::key_node_last(*key, k) as usize] += 1;
        }
        result
    }

    /// Returns the node length.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of edges in the chunk.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.w.len()
    }

    /// Returns `true` if the chunk is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    /// Appends another chunk, which must cover later buckets.
    pub fn append(&mut self, other: &Chunk) {
        debug_assert_eq!(self.k, other.k);
        self.w.extend_from_slice(&other.w);
        self.last.extend_from_slice(&other.last);
        for d in 0..SIGMA {
            self.counts[d] += other.counts[d];
        }
    }
}

impl Serialize for Chunk {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let mut header = Header::<ChunkPayload>::new();
        header.payload_mut().k = self.k;
        header.payload_mut().edges = self.num_edges();
        header.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.w.serialize(writer)?;
        let mut last = RawVector::with_capacity(self.last.len());
        for bit in self.last.iter() {
            last.push_bit(*bit);
        }
        last.serialize(writer)?;
        let counts: Vec<u64> = self.counts.iter().map(|x| *x as u64).collect();
        counts.serialize(writer)?;
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let header = Header::<ChunkPayload>::load(reader)?;
        if let Err(msg) = header.validate() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg));
        }
        let payload = *header.payload();

        let w = Vec::<u8>::load(reader)?;
        let raw = RawVector::load(reader)?;
        let counts_vec = Vec::<u64>::load(reader)?;
        if w.len() != payload.edges || raw.len() != payload.edges || counts_vec.len() != SIGMA {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Chunk: Length mismatch"));
        }
        let last: Vec<bool> = (0..raw.len()).map(|i| raw.bit(i)).collect();
        let mut counts = [0usize; SIGMA];
        for (d, value) in counts_vec.iter().enumerate() {
            counts[d] = *value as usize;
        }
        if counts.iter().sum::<usize>() != payload.edges {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Chunk: Count mismatch"));
        }

        Ok(Chunk {
            k: payload.k,
            w,
            last,
            counts,
        })
    }

    fn size_in_elements(&self) -> usize {
        let header = Header::<ChunkPayload>::new();
        let mut last = RawVector::with_capacity(self.last.len());
        for bit in self.last.iter() {
            last.push_bit(*bit);
        }
        header.size_in_elements() + self.w.size_in_elements() + last.size_in_elements() + (SIGMA + 1)
    }
}

/// Returns the file name for one chunk of an external build.
pub fn chunk_file_name<P: AsRef<Path>>(base: P, part: usize, parts_total: usize) -> PathBuf {
    let mut name = base.as_ref().as_os_str().to_os_string();
    name.push(format!(".dbg.{}_{}", part, parts_total));
    PathBuf::from(name)
}

//-----------------------------------------------------------------------------

/// Concatenates chunks in bucket order into a finished graph.
///
/// An empty chunk set yields the graph consisting of the sentinel edge.
pub fn merge_chunks(k: usize, canonical: bool, chunks: &[Chunk]) -> Result<Boss, Error> {
    if k < 2 || k > MAX_K {
        return Err(Error::UnsupportedK(k));
    }
    let mut combined = Chunk::new(k);
    for chunk in chunks {
        if chunk.k != k {
            return Err(Error::KMismatch(k, chunk.k));
        }
        combined.append(chunk);
    }
    if combined.is_empty() {
        let mut f: FArray = [1; SIGMA + 1];
        f[0] = 0;
        return Ok(Boss::from_parts(k, canonical, &[0], &[true], f));
    }

    let mut f: FArray = [0; SIGMA + 1];
    for d in 0..SIGMA {
        f[d + 1] = f[d] + combined.counts[d];
    }
    Ok(Boss::from_parts(k, canonical, &combined.w, &combined.last, f))
}

//-----------------------------------------------------------------------------

// Sequences encoded for extraction, with reverse complements in canonical
// mode.
fn encode_input<S: AsRef<str>>(sequences: &[S], k: usize, canonical: bool) -> Result<Vec<Vec<u8>>, Error> {
    let mut result = Vec::with_capacity(if canonical { 2 * sequences.len() } else { sequences.len() });
    for sequence in sequences {
        let encoded = support::encode_sequence(sequence.as_ref())?;
        if encoded.len() < k + 1 {
            continue;
        }
        if canonical {
            result.push(support::reverse_complement(&encoded));
        }
        result.push(encoded);
    }
    Ok(result)
}

// Extracts the sorted, deduplicated packed keys of one bucket.
//
// The memory cap bounds the per-worker buffers: a full buffer is sorted
// and deduplicated early, which also keeps the merge cheap.
fn collect_bucket(encoded: &[Vec<u8>], k: usize, suffix: u128, suffix_len: usize, flush_limit: usize) -> Vec<u128> {
    let suffix_shift = 3 * (k - suffix_len) as u32;
    let key_bits = 3 * (k + 1) as u32;

    let mut keys = encoded
        .par_iter()
        .fold(Vec::<u128>::new, |mut buffer, sequence| {
            let mut padded = vec![0u8; k];
            padded.extend_from_slice(sequence);
            padded.push(0);

            // Slide the packed node over the sequence.
            let mut node: u128 = 0;
            for t in 0..k {
                node |= (padded[t] as u128) << (3 * t);
            }
            for t in 0..padded.len() - k {
                if node >> suffix_shift == suffix {
                    buffer.push((node << 3) | (padded[t + k] as u128));
                }
                node = (node >> 3) | ((padded[t + k] as u128) << (3 * (k - 1)));
            }
            if buffer.len() >= flush_limit {
                support::sort_unique(&mut buffer, key_bits);
            }
            buffer
        })
        .reduce(Vec::new, |mut left, mut right| {
            if left.len() < right.len() {
                std::mem::swap(&mut left, &mut right);
            }
            left.extend_from_slice(&right);
            left
        });

    support::sort_unique(&mut keys, key_bits);
    keys
}

/// Builds the chunks for a contiguous subset of the suffix buckets.
///
/// `part` selects one of `parts_total` contiguous ranges of buckets;
/// `(0, 1)` builds everything. The bucket passes run sequentially, with
/// parallel extraction inside each pass.
pub fn build_chunks<S: AsRef<str> + Sync>(
    sequences: &[S],
    k: usize,
    canonical: bool,
    nsplits: usize,
    num_threads: usize,
    mem_cap: Option<usize>,
    part: usize,
    parts_total: usize,
) -> Result<Vec<Chunk>, Error> {
    if k < 2 || k > MAX_K {
        return Err(Error::UnsupportedK(k));
    }
    assert!(parts_total > 0 && part < parts_total, "Invalid part {} of {}", part, parts_total);
    let encoded = encode_input(sequences, k, canonical)?;

    let suffix_len = suffix_length(nsplits.max(1), k);
    let suffixes = valid_suffixes(suffix_len);
    let per_part = suffixes.len().div_ceil(parts_total);
    let range = (part * per_part).min(suffixes.len())..((part + 1) * per_part).min(suffixes.len());

    let threads = num_threads.max(1);
    let flush_limit = (mem_cap.unwrap_or(DEFAULT_MEM_CAP) / (16 * threads)).max(1024);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;

    let mut chunks = Vec::with_capacity(range.len());
    for suffix in &suffixes[range] {
        log::info!("Extracting bucket {:o} with suffix length {}", suffix, suffix_len);
        let keys = pool.install(|| collect_bucket(&encoded, k, *suffix, suffix_len, flush_limit));
        chunks.push(Chunk::from_keys(k, &keys));
    }
    Ok(chunks)
}

/// Builds a finished graph from the sequences with the chunked pipeline.
pub fn build_boss<S: AsRef<str> + Sync>(
    sequences: &[S],
    k: usize,
    canonical: bool,
    nsplits: usize,
    num_threads: usize,
    mem_cap: Option<usize>,
) -> Result<Boss, Error> {
    let chunks = build_chunks(sequences, k, canonical, nsplits, num_threads, mem_cap, 0, 1)?;
    merge_chunks(k, canonical, &chunks)
}

//-----------------------------------------------------------------------------
