//! Label queries against annotated graphs, with a batched fast path.
//!
//! An [`AnnotatedDbg`] pairs a shared read-only graph with an annotation
//! matrix whose row `i` describes node `i + 1`. Direct queries map a
//! sequence to nodes and aggregate the label sets of the corresponding
//! rows.
//!
//! When many sequences are queried against one large graph, per-sequence
//! annotation lookups are dominated by random access into the matrix. The
//! batched path amortizes them:
//!
//! 1. index the k-mers of a batch of sequences in a small [`HashDbg`];
//! 2. extract contigs from the small graph and map each contig against
//!    the large graph once;
//! 3. if a discovery fraction is set, mask out k-mers that only occur in
//!    sequences with too few hits;
//! 4. slice the annotation matrix down to the mapped rows, deduplicating
//!    equal rows into a [`UniqueRows`] matrix.
//!
//! Per-sequence queries then run against the small replica and return the
//! same label sets as the direct path.

use crate::annotation::{Annotation, BinaryMatrix, UniqueRows};
use crate::graph::{DeBruijnGraph, HashDbg, MaskedDbg};
use crate::pool::ThreadPool;
use crate::support::Bitmap;
use crate::{Error, NPOS};

use rayon::prelude::*;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};


//-----------------------------------------------------------------------------

/// The row marker for nodes that are absent from the full graph.
pub const NO_ROW: u64 = u64::MAX;

// Rows fetched from the full annotation per batch.
const ROW_BATCH_SIZE: usize = 100_000;

//-----------------------------------------------------------------------------

/// An annotated de Bruijn graph.
///
/// The graph is shared read-only; the annotation is owned. Row `i` of the
/// annotation corresponds to node `i + 1` of the graph.
pub struct AnnotatedDbg {
    graph: Arc<dyn DeBruijnGraph>,
    annotation: Annotation,
}

impl AnnotatedDbg {
    /// Pairs a graph with its annotation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the annotation does not have one
    /// row per node identifier.
    pub fn new(graph: Arc<dyn DeBruijnGraph>, annotation: Annotation) -> Result<Self, Error> {
        if annotation.num_rows() != graph.max_index() {
            return Err(Error::InvalidInput(format!(
                "the annotation has {} rows but the graph has {} node identifiers",
                annotation.num_rows(), graph.max_index()
            )));
        }
        Ok(AnnotatedDbg { graph, annotation })
    }

    /// Returns a reference to the graph.
    #[inline]
    pub fn graph(&self) -> &Arc<dyn DeBruijnGraph> {
        &self.graph
    }

    /// Returns a reference to the annotation.
    #[inline]
    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    /// Returns the annotation row of the node.
    #[inline]
    pub fn node_to_row(node: usize) -> u64 {
        debug_assert_ne!(node, NPOS);
        (node - 1) as u64
    }

    // Returns the per-label k-mer counts of the sequence and the number of
    // k-mers required for a label to count as discovered.
    fn label_counts(&self, sequence: &str, discovery_fraction: f64) -> (HashMap<u64, usize>, usize) {
        let mut nodes: Vec<usize> = Vec::new();
        self.graph.map_to_nodes(sequence, &mut |node| nodes.push(node));
        let num_kmers = nodes.len();

        let rows: Vec<u64> = nodes
            .iter()
            .filter(|node| **node != NPOS)
            .map(|node| Self::node_to_row(*node))
            .collect();
        let mut counts: HashMap<u64, usize> = HashMap::new();
        for row in self.annotation.matrix().get_rows(&rows) {
            for column in row {
                *counts.entry(column).or_insert(0) += 1;
            }
        }

        let min_count = ((discovery_fraction * num_kmers as f64).ceil() as usize).max(1);
        (counts, min_count)
    }

    /// Returns the labels whose k-mers cover at least `discovery_fraction`
    /// of the k-mers of the sequence, in column order.
    pub fn get_labels(&self, sequence: &str, discovery_fraction: f64) -> Vec<String> {
        let (counts, min_count) = self.label_counts(sequence, discovery_fraction);
        let mut columns: Vec<u64> = counts
            .iter()
            .filter(|(_, count)| **count >= min_count)
            .map(|(column, _)| *column)
            .collect();
        columns.sort_unstable();
        columns
            .iter()
            .map(|column| self.annotation.label_encoder().decode(*column as usize).to_string())
            .collect()
    }

    /// Returns up to `num_top` labels with the highest k-mer counts,
    /// sorted by descending count with ties in column order.
    pub fn get_top_labels(&self, sequence: &str, num_top: usize, discovery_fraction: f64) -> Vec<(String, usize)> {
        let (counts, min_count) = self.label_counts(sequence, discovery_fraction);
        let mut result: Vec<(u64, usize)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .collect();
        result.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        result.truncate(num_top);
        result
            .into_iter()
            .map(|(column, count)| (self.annotation.label_encoder().decode(column as usize).to_string(), count))
            .collect()
    }
}

//-----------------------------------------------------------------------------

/// Extracts an annotation submatrix with the given rows of the full
/// matrix.
///
/// `index_in_full[i]` is the full-matrix row that becomes row `i` of the
/// submatrix, or [`NO_ROW`] for an empty row. Equal rows are deduplicated
/// into a [`UniqueRows`] matrix; row `0` of the result is always the empty
/// row.
///
/// # Errors
///
/// Returns [`Error::BatchTooLarge`] if the number of unique rows does not
/// fit into 32 bits; the caller may retry with a smaller batch.
pub fn slice_annotation(
    annotation: &Annotation,
    index_in_full: &[u64],
    num_threads: usize,
) -> Result<Annotation, Error> {
    let mut from_full_to_small: Vec<(u64, usize)> = index_in_full
        .iter()
        .enumerate()
        .filter(|(_, row)| **row != NO_ROW)
        .map(|(small, row)| (*row, small))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    pool.install(|| from_full_to_small.par_sort_unstable());

    // Fetch the rows in batches; deduplicate them in order.
    let batches: Vec<Vec<Vec<u64>>> = pool.install(|| {
        from_full_to_small
            .par_chunks(ROW_BATCH_SIZE)
            .map(|batch| {
                let rows: Vec<u64> = batch.iter().map(|(row, _)| *row).collect();
                annotation.matrix().get_rows(&rows)
            })
            .collect()
    });

    let mut unique_rows: Vec<Vec<u64>> = vec![Vec::new()];
    let mut codes: HashMap<Vec<u64>, u32> = HashMap::new();
    codes.insert(Vec::new(), 0);
    let mut row_codes: Vec<u32> = vec![0; index_in_full.len()];

    let mut position = 0;
    for batch in batches {
        for row in batch {
            let small = from_full_to_small[position].1;
            position += 1;
            let code = match codes.get(&row) {
                Some(code) => *code,
                None => {
                    if unique_rows.len() >= u32::MAX as usize {
                        return Err(Error::BatchTooLarge(unique_rows.len()));
                    }
                    let code = unique_rows.len() as u32;
                    codes.insert(row.clone(), code);
                    unique_rows.push(row);
                    code
                }
            };
            row_codes[small] = code;
        }
    }

    let matrix = UniqueRows::new(unique_rows, row_codes, annotation.num_labels());
    Ok(Annotation::new(
        BinaryMatrix::UniqueRows(matrix),
        annotation.label_encoder().clone(),
    ))
}

//-----------------------------------------------------------------------------

// The maximal substrings without characters outside the alphabet.
fn valid_runs(sequence: &str) -> Vec<&str> {
    sequence
        .split(|c: char| !matches!(c, 'A' | 'C' | 'G' | 'T' | 'a' | 'c' | 'g' | 't'))
        .filter(|run| !run.is_empty())
        .collect()
}

/// Builds a compact annotated replica for a batch of query sequences.
///
/// See the module documentation for the algorithm. Per-sequence label
/// queries against the replica return the same results as against
/// `anno_graph`.
///
/// # Errors
///
/// Returns [`Error::BatchTooLarge`] if the annotation slice overflows;
/// the caller may retry with a smaller batch.
pub fn construct_query_graph(
    anno_graph: &AnnotatedDbg,
    sequences: &[String],
    discovery_fraction: f64,
    num_threads: usize,
) -> Result<AnnotatedDbg, Error> {
    let full = anno_graph.graph();

    // Index the k-mers of the batch.
    let mut small = HashDbg::new(full.k(), full.is_canonical())?;
    for sequence in sequences {
        for run in valid_runs(sequence) {
            small.add_sequence(run)?;
        }
    }

    // Extract contigs and map each of them against the full graph once.
    let mut contigs: Vec<(String, Vec<usize>)> = Vec::new();
    small.call_sequences(|sequence, path| contigs.push((sequence, path)));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let mapped: Vec<Vec<usize>> = pool.install(|| {
        contigs
            .par_iter()
            .map(|(sequence, _)| {
                let mut nodes: Vec<usize> = Vec::new();
                full.map_to_nodes(sequence, &mut |node| nodes.push(node));
                nodes
            })
            .collect()
    });

    let mut index_in_full: Vec<usize> = vec![NPOS; small.max_index() + 1];
    for ((_, path), nodes) in contigs.iter().zip(mapped.iter()) {
        debug_assert_eq!(path.len(), nodes.len());
        for (small_node, full_node) in path.iter().zip(nodes.iter()) {
            index_in_full[*small_node] = *full_node;
        }
    }

    // Filter out the k-mers of sequences with too few hits.
    let small = Arc::new(small);
    let graph: Arc<dyn DeBruijnGraph> = if discovery_fraction > 0.0 {
        let mut mask = Bitmap::new(small.max_index() + 1);
        for sequence in sequences {
            let mut discovered: Vec<usize> = Vec::new();
            let mut num_kmers = 0;
            small.map_to_nodes(sequence, &mut |node| {
                num_kmers += 1;
                if node != NPOS && index_in_full[node] != NPOS {
                    discovered.push(node);
                }
            });
            let min_kmers = ((discovery_fraction * num_kmers as f64).ceil() as usize).max(1);
            if discovered.len() >= min_kmers {
                for node in discovered {
                    mask.set(node, true);
                }
            }
        }
        for node in 1..index_in_full.len() {
            if !mask.get(node) {
                index_in_full[node] = NPOS;
            }
        }
        Arc::new(MaskedDbg::new(small, mask))
    } else {
        small
    };

    // Slice the annotation down to the mapped rows.
    let rows: Vec<u64> = index_in_full[1..]
        .iter()
        .map(|node| if *node == NPOS { NO_ROW } else { AnnotatedDbg::node_to_row(*node) })
        .collect();
    let annotation = slice_annotation(anno_graph.annotation(), &rows, num_threads)?;

    AnnotatedDbg::new(graph, annotation)
}

//-----------------------------------------------------------------------------

/// Options for a [`QueryExecutor`].
#[derive(Clone, Debug)]
pub struct QueryConfig {
    /// The fraction of k-mers a label must cover.
    pub discovery_fraction: f64,
    /// Report the top labels with counts instead of all discovered labels.
    pub num_top_labels: Option<usize>,
    /// Use the batched query path.
    pub batched: bool,
    /// The number of query bytes per batch.
    pub batch_size: usize,
    /// The number of worker threads.
    pub num_threads: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            discovery_fraction: 0.0,
            num_top_labels: None,
            batched: false,
            batch_size: 64 * 1024 * 1024,
            num_threads: 1,
        }
    }
}

/// Runs label queries for a stream of sequences over a worker pool.
///
/// Results are reported in the order of the input sequences, regardless
/// of worker scheduling: every task writes into a slot indexed by the
/// input ordinal.
pub struct QueryExecutor {
    anno_graph: Arc<AnnotatedDbg>,
    config: QueryConfig,
    pool: ThreadPool,
}

impl QueryExecutor {
    /// Creates an executor over an annotated graph.
    pub fn new(anno_graph: Arc<AnnotatedDbg>, config: QueryConfig) -> Self {
        let pool = ThreadPool::new(config.num_threads.max(1), usize::MAX);
        QueryExecutor { anno_graph, config, pool }
    }

    // Runs one query against the given annotated graph.
    fn labels_for(anno_graph: &AnnotatedDbg, sequence: &str, config: &QueryConfig) -> Vec<String> {
        match config.num_top_labels {
            Some(num_top) => anno_graph
                .get_top_labels(sequence, num_top, config.discovery_fraction)
                .into_iter()
                .map(|(label, count)| format!("{}:{}", label, count))
                .collect(),
            None => anno_graph.get_labels(sequence, config.discovery_fraction),
        }
    }

    // Queries a slice of sequences against the given graph, filling the
    // result slots starting at `first_ordinal`.
    fn query_against(
        &mut self,
        anno_graph: Arc<AnnotatedDbg>,
        sequences: &[String],
        first_ordinal: usize,
        results: &Arc<Mutex<Vec<Option<Vec<String>>>>>,
    ) {
        let config = self.config.clone();
        for (offset, sequence) in sequences.iter().enumerate() {
            let anno_graph = anno_graph.clone();
            let sequence = sequence.clone();
            let results = results.clone();
            let config = config.clone();
            self.pool.enqueue(move || {
                let labels = Self::labels_for(&anno_graph, &sequence, &config);
                results.lock().unwrap()[first_ordinal + offset] = Some(labels);
            });
        }
        self.pool.join();
    }

    // Queries one batch, retrying with smaller batches on overflow.
    fn query_batch(
        &mut self,
        sequences: &[String],
        first_ordinal: usize,
        results: &Arc<Mutex<Vec<Option<Vec<String>>>>>,
    ) -> Result<(), Error> {
        match construct_query_graph(
            &self.anno_graph,
            sequences,
            self.config.discovery_fraction,
            self.config.num_threads,
        ) {
            Ok(replica) => {
                self.query_against(Arc::new(replica), sequences, first_ordinal, results);
                Ok(())
            }
            Err(Error::BatchTooLarge(_)) if sequences.len() > 1 => {
                let mid = sequences.len() / 2;
                self.query_batch(&sequences[..mid], first_ordinal, results)?;
                self.query_batch(&sequences[mid..], first_ordinal + mid, results)
            }
            Err(e) => Err(e),
        }
    }

    /// Queries the sequences and calls `callback(ordinal, labels)` for
    /// every sequence in input order.
    pub fn query_sequences<F: FnMut(usize, Vec<String>)>(
        &mut self,
        sequences: &[String],
        mut callback: F,
    ) -> Result<(), Error> {
        let results: Arc<Mutex<Vec<Option<Vec<String>>>>> =
            Arc::new(Mutex::new(vec![None; sequences.len()]));

        if self.config.batched {
            let mut begin = 0;
            while begin < sequences.len() {
                let mut end = begin;
                let mut bytes = 0;
                while end < sequences.len() && (end == begin || bytes <= self.config.batch_size) {
                    bytes += sequences[end].len();
                    end += 1;
                }
                self.query_batch(&sequences[begin..end], begin, &results)?;
                begin = end;
            }
        } else {
            self.query_against(self.anno_graph.clone(), sequences, 0, &results);
        }

        let mut results = results.lock().unwrap();
        for (ordinal, labels) in results.iter_mut().enumerate() {
            callback(ordinal, labels.take().expect("A query result is missing"));
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
