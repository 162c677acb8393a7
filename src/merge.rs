//! Merging BOSS graphs and dumping them in other representations.
//!
//! Two merge strategies produce byte-identical results:
//!
//! * [`traversal_merge`] inserts the edges of every source graph into a
//!   mutable target, which is practical when the graphs are small;
//! * [`blocked_merge`] partitions the edge space into blocks, merges the
//!   per-block sorted edge streams of all sources, and concatenates the
//!   resulting chunks. Blocks are independent, so they can be processed
//!   in parallel or by separate processes.

use crate::boss::Boss;
use crate::construct::{self, Chunk};
use crate::support;
use crate::{Error, NPOS};

use rayon::prelude::*;

use std::io::Write;
use std::io;


//-----------------------------------------------------------------------------

// Checks that the node lengths match and returns (k, canonical).
fn common_mode(graphs: &[&Boss]) -> Result<(usize, bool), Error> {
    assert!(!graphs.is_empty(), "Cannot merge zero graphs");
    let k = graphs[0].k();
    for graph in graphs.iter() {
        if graph.k() != k {
            return Err(Error::KMismatch(k, graph.k()));
        }
    }
    Ok((k, graphs.iter().all(|g| g.is_canonical())))
}

/// Merges the graphs by inserting every edge into a mutable target.
///
/// # Errors
///
/// Returns [`Error::KMismatch`] if the node lengths differ.
pub fn traversal_merge(graphs: &[&Boss]) -> Result<Boss, Error> {
    let (k, canonical) = common_mode(graphs)?;
    let mut target = crate::boss::DynBoss::with_mode(k, canonical)?;
    for graph in graphs {
        target.merge(graph)?;
    }
    Ok(target.into_static())
}

//-----------------------------------------------------------------------------

// The packed edge keys of one graph, split into suffix buckets.
//
// The graph enumerates its edges in key order, so each bucket is a sorted
// stream. The sentinel edge of an empty graph is dropped.
fn bucket_streams(graph: &Boss, suffixes: &[u128], suffix_len: usize) -> Vec<Vec<u128>> {
    let suffix_shift = 3 * (graph.k() - suffix_len) as u32 + 3;
    let mut streams: Vec<Vec<u128>> = vec![Vec::new(); suffixes.len()];
    let mut bucket = 0;
    for edge in 1..=graph.num_edges() {
        let key = graph.edge_key(edge);
        if key == 0 {
            continue;
        }
        let suffix = key >> suffix_shift;
        while suffixes[bucket] != suffix {
            bucket += 1;
        }
        streams[bucket].push(key);
    }
    streams
}

// Merges sorted streams into a sorted stream without duplicates.
fn merge_streams(streams: &[&[u128]]) -> Vec<u128> {
    let mut cursors: Vec<usize> = vec![0; streams.len()];
    let mut result: Vec<u128> = Vec::with_capacity(streams.iter().map(|s| s.len()).max().unwrap_or(0));
    loop {
        let mut smallest: Option<u128> = None;
        for (stream, cursor) in streams.iter().zip(cursors.iter()) {
            if *cursor < stream.len() {
                let key = stream[*cursor];
                smallest = Some(smallest.map_or(key, |s: u128| s.min(key)));
            }
        }
        let key = match smallest {
            Some(key) => key,
            None => break,
        };
        result.push(key);
        for (stream, cursor) in streams.iter().zip(cursors.iter_mut()) {
            if *cursor < stream.len() && stream[*cursor] == key {
                *cursor += 1;
            }
        }
    }
    result
}

/// Merges one block of the combined edge space and returns its chunk.
///
/// The blocks partition the suffix buckets into `parts_total` contiguous
/// ranges; concatenating the chunks of all blocks in order with
/// [`construct::merge_chunks`] finishes the merge.
///
/// # Errors
///
/// Returns [`Error::KMismatch`] if the node lengths differ.
pub fn merge_part(graphs: &[&Boss], part: usize, parts_total: usize) -> Result<Chunk, Error> {
    let (k, _) = common_mode(graphs)?;
    assert!(parts_total > 0 && part < parts_total, "Invalid part {} of {}", part, parts_total);

    let suffix_len = construct::suffix_length(parts_total, k);
    let suffixes = construct::valid_suffixes(suffix_len);
    let per_part = suffixes.len().div_ceil(parts_total);
    let range = (part * per_part).min(suffixes.len())..((part + 1) * per_part).min(suffixes.len());

    let streams: Vec<Vec<Vec<u128>>> = graphs
        .iter()
        .map(|graph| bucket_streams(graph, &suffixes, suffix_len))
        .collect();

    let mut result = Chunk::new(k);
    for bucket in range {
        let bucket_inputs: Vec<&[u128]> = streams.iter().map(|s| s[bucket].as_slice()).collect();
        let merged = merge_streams(&bucket_inputs);
        result.append(&Chunk::from_keys(k, &merged));
    }
    Ok(result)
}

/// Merges the graphs block by block, processing blocks in parallel.
///
/// The result is byte-identical to [`traversal_merge`] on the same input.
///
/// # Errors
///
/// Returns [`Error::KMismatch`] if the node lengths differ.
pub fn blocked_merge(graphs: &[&Boss], parts_total: usize, num_threads: usize) -> Result<Boss, Error> {
    let (k, canonical) = common_mode(graphs)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let chunks = pool.install(|| {
        (0..parts_total.max(1))
            .into_par_iter()
            .map(|part| merge_part(graphs, part, parts_total.max(1)))
            .collect::<Result<Vec<Chunk>, Error>>()
    })?;
    construct::merge_chunks(k, canonical, &chunks)
}

//-----------------------------------------------------------------------------

/// Streams the adjacency list of the graph in edge order.
///
/// Every line holds the source edge index, the target edge index (`0` for
/// sink edges), and the edge symbol.
pub fn write_adjacency_list<W: Write>(graph: &Boss, writer: &mut W) -> io::Result<()> {
    for edge in 1..=graph.num_edges() {
        let target = graph.next_edge(edge);
        let symbol = support::decode_symbol(graph.edge_symbol(edge));
        if target == NPOS {
            writeln!(writer, "{}\t0\t{}", edge, symbol as char)?;
        } else {
            writeln!(writer, "{}\t{}\t{}", edge, target, symbol as char)?;
        }
    }
    Ok(())
}

//-----------------------------------------------------------------------------
