//! Label annotations over graph edges, stored as compressed binary
//! matrices.
//!
//! An annotation is a sparse binary relation between rows (edges of a
//! graph) and columns (labels). The main representation is the multi-BRWT:
//! a tree of rank / select bit vectors in which every node stores, for the
//! rows it covers, whether any column of its subtree is set, and every
//! leaf owns exactly one column. Queries descend the tree with rank
//! queries and ascend with select queries.
//!
//! [`UniqueRows`] is a complementary representation for query-time slices:
//! rows with the same label sets are stored once and addressed through
//! 32-bit codes.
//!
//! # Examples
//!
//! ```
//! use metadbg::annotation::Brwt;
//!
//! // The 3x3 identity matrix, one column per label.
//! let columns = vec![vec![0], vec![1], vec![2]];
//! let matrix = Brwt::from_columns(columns, 3, 2);
//! assert!(matrix.get(1, 1));
//! assert!(!matrix.get(1, 2));
//! assert_eq!(matrix.get_row(2), vec![2]);
//! assert_eq!(matrix.slice_rows(&[0, 1, 2]), vec![0, u64::MAX, 1, u64::MAX, 2, u64::MAX]);
//! ```

use crate::headers::{Header, AnnotationPayload};

use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank, Select};
use simple_sds::raw_vector::{RawVector, AccessRaw};
use simple_sds::serialize::Serialize;

use rayon::prelude::*;

use std::collections::BTreeMap;
use std::io::{Error, ErrorKind};
use std::io;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// The delimiter between row or column sets in slice results.
pub const DELIMITER: u64 = u64::MAX;

// Builds a rank / select bit vector with the given set positions.
fn bit_vector_from_positions(len: usize, positions: &[u64]) -> BitVector {
    let mut raw = RawVector::with_len(len, false);
    for position in positions {
        raw.set_bit(*position as usize, true);
    }
    let mut result = BitVector::from(raw);
    result.enable_rank();
    result.enable_select();
    result
}

// Reads up to 64 bits starting at the given offset as an integer.
fn load_word(bv: &BitVector, offset: usize) -> u64 {
    let limit = (offset + 64).min(bv.len());
    let mut word = 0u64;
    for i in (offset..limit).rev() {
        word = (word << 1) | (bv.get(i) as u64);
    }
    word
}

// Returns 0 if the bit is unset, and the inclusive rank of the position
// otherwise. This avoids a rank query for unset positions.
fn conditional_rank1(bv: &BitVector, i: usize) -> usize {
    if bv.get(i) { bv.rank(i) + 1 } else { 0 }
}

//-----------------------------------------------------------------------------

/// A bidirectional mapping between label strings and column indexes.
///
/// Labels are opaque strings; new labels get the next free column index.
///
/// # Examples
///
/// ```
/// use metadbg::annotation::LabelEncoder;
///
/// let mut encoder = LabelEncoder::new();
/// assert_eq!(encoder.insert("liver"), 0);
/// assert_eq!(encoder.insert("kidney"), 1);
/// assert_eq!(encoder.insert("liver"), 0);
/// assert_eq!(encoder.encode("kidney"), Some(1));
/// assert_eq!(encoder.decode(0), "liver");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelEncoder {
    labels: Vec<String>,
    ids: BTreeMap<String, usize>,
}

impl LabelEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        LabelEncoder::default()
    }

    /// Returns the number of labels.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if the encoder is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the column index of the label, inserting it if necessary.
    pub fn insert(&mut self, label: &str) -> usize {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.ids.insert(label.to_string(), id);
        id
    }

    /// Returns the column index of the label, or `None` if it is unknown.
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    /// Returns the label of the given column.
    ///
    /// # Panics
    ///
    /// May panic if `id >= self.len()`.
    pub fn decode(&self, id: usize) -> &str {
        &self.labels[id]
    }

    /// Returns an iterator over the labels in column order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.as_str())
    }
}

impl Serialize for LabelEncoder {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.labels.len().serialize(writer)?;
        for label in self.labels.iter() {
            label.as_bytes().to_vec().serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let count = usize::load(reader)?;
        let mut result = LabelEncoder::new();
        for _ in 0..count {
            let bytes = Vec::<u8>::load(reader)?;
            let label = String::from_utf8(bytes)
                .map_err(|_| Error::new(ErrorKind::InvalidData, "LabelEncoder: Invalid UTF-8 in a label"))?;
            result.insert(&label);
        }
        if result.len() != count {
            return Err(Error::new(ErrorKind::InvalidData, "LabelEncoder: Duplicate labels"));
        }
        Ok(result)
    }

    fn size_in_elements(&self) -> usize {
        let mut result = 1;
        for label in self.labels.iter() {
            result += label.as_bytes().to_vec().size_in_elements();
        }
        result
    }
}

//-----------------------------------------------------------------------------

/// The column partition of an internal BRWT node.
///
/// The partition assigns every column owned by the node to a child and a
/// rank within that child, with a reverse mapping from `(child, rank)` to
/// the column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangePartition {
    groups: Vec<Vec<u64>>,
    assignments: Vec<(u32, u32)>,
}

impl RangePartition {
    /// Creates a partition from the column groups of the children.
    ///
    /// # Panics
    ///
    /// Panics if the groups are not a partition of `0..num_columns`.
    pub fn from_groups(groups: Vec<Vec<u64>>) -> Self {
        let num_columns: usize = groups.iter().map(|g| g.len()).sum();
        let mut assignments: Vec<(u32, u32)> = vec![(u32::MAX, u32::MAX); num_columns];
        for (child, group) in groups.iter().enumerate() {
            for (rank, column) in group.iter().enumerate() {
                let slot = &mut assignments[*column as usize];
                assert!(*slot == (u32::MAX, u32::MAX), "RangePartition: Column {} assigned twice", column);
                *slot = (child as u32, rank as u32);
            }
        }
        RangePartition { groups, assignments }
    }

    // The identity partition for a leaf owning one column.
    fn identity() -> Self {
        Self::from_groups(vec![vec![0]])
    }

    /// Returns the number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.assignments.len()
    }

    /// Returns the number of groups.
    #[inline]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Returns the child owning the column.
    #[inline]
    pub fn group(&self, column: u64) -> usize {
        self.assignments[column as usize].0 as usize
    }

    /// Returns the rank of the column within its child.
    #[inline]
    pub fn rank(&self, column: u64) -> u64 {
        self.assignments[column as usize].1 as u64
    }

    /// Returns the column with the given rank in the given child.
    ///
    /// # Panics
    ///
    /// May panic if the child or the rank does not exist.
    #[inline]
    pub fn get(&self, child: usize, rank: u64) -> u64 {
        self.groups[child][rank as usize]
    }
}

impl Serialize for RangePartition {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.groups.len().serialize(writer)?;
        for group in self.groups.iter() {
            group.serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let count = usize::load(reader)?;
        let mut groups: Vec<Vec<u64>> = Vec::with_capacity(count);
        for _ in 0..count {
            groups.push(Vec::<u64>::load(reader)?);
        }
        let num_columns: usize = groups.iter().map(|g| g.len()).sum();
        if groups.iter().flatten().any(|c| *c as usize >= num_columns) {
            return Err(Error::new(ErrorKind::InvalidData, "RangePartition: Column out of range"));
        }
        Ok(Self::from_groups(groups))
    }

    fn size_in_elements(&self) -> usize {
        1 + self.groups.iter().map(|g| g.size_in_elements()).sum::<usize>()
    }
}

//-----------------------------------------------------------------------------

/// A multi-BRWT binary matrix.
///
/// See the module documentation for the structure and an example.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Brwt {
    nonzero_rows: BitVector,
    assignments: RangePartition,
    children: Vec<Brwt>,
}

impl Brwt {
    /// Builds a matrix from its columns, each given as a sorted list of set
    /// row indexes.
    ///
    /// `arity` bounds the number of children per node; the columns are
    /// grouped into contiguous ranges of roughly equal size at every level.
    ///
    /// # Panics
    ///
    /// Panics if there are no columns, `arity < 2`, or a row index is out
    /// of range.
    pub fn from_columns(columns: Vec<Vec<u64>>, num_rows: usize, arity: usize) -> Self {
        assert!(!columns.is_empty(), "Brwt: Cannot build a matrix without columns");
        assert!(arity >= 2, "Brwt: Arity must be at least 2");
        debug_assert!(columns.iter().all(|c| c.windows(2).all(|w| w[0] < w[1])));

        if columns.len() == 1 {
            return Brwt {
                nonzero_rows: bit_vector_from_positions(num_rows, &columns[0]),
                assignments: RangePartition::identity(),
                children: Vec::new(),
            };
        }

        // The union of the subtree columns.
        let mut union = RawVector::with_len(num_rows, false);
        for column in columns.iter() {
            for row in column.iter() {
                union.set_bit(*row as usize, true);
            }
        }
        let mut nonzero_rows = BitVector::from(union);
        nonzero_rows.enable_rank();
        nonzero_rows.enable_select();
        let union_size = nonzero_rows.count_ones();

        // Split the columns into contiguous groups and reindex the rows of
        // every group into the coordinates of the union.
        let group_size = columns.len().div_ceil(arity);
        let mut groups: Vec<Vec<u64>> = Vec::new();
        let mut children: Vec<Brwt> = Vec::new();
        for (child, chunk) in columns.chunks(group_size).enumerate() {
            let begin = child * group_size;
            groups.push((begin..begin + chunk.len()).map(|c| c as u64).collect());
            let remapped: Vec<Vec<u64>> = chunk
                .iter()
                .map(|column| column.iter().map(|row| nonzero_rows.rank(*row as usize) as u64).collect())
                .collect();
            children.push(Brwt::from_columns(remapped, union_size, arity));
        }

        Brwt {
            nonzero_rows,
            assignments: RangePartition::from_groups(groups),
            children,
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.nonzero_rows.len()
    }

    /// Returns the number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.assignments.num_columns()
    }

    /// Returns the bit at the given row and column.
    ///
    /// # Panics
    ///
    /// May panic if the row or the column is out of range.
    pub fn get(&self, row: u64, column: u64) -> bool {
        debug_assert!((row as usize) < self.num_rows());
        debug_assert!((column as usize) < self.num_columns());
        if !self.nonzero_rows.get(row as usize) {
            return false;
        }
        if self.children.is_empty() {
            return true;
        }
        let child = self.assignments.group(column);
        self.children[child].get(self.nonzero_rows.rank(row as usize) as u64, self.assignments.rank(column))
    }

    /// Returns the set columns of the row in ascending order.
    ///
    /// # Panics
    ///
    /// May panic if the row is out of range.
    pub fn get_row(&self, row: u64) -> Vec<u64> {
        debug_assert!((row as usize) < self.num_rows());
        if !self.nonzero_rows.get(row as usize) {
            return Vec::new();
        }
        if self.children.is_empty() {
            return vec![0];
        }
        let child_row = self.nonzero_rows.rank(row as usize) as u64;
        let mut result: Vec<u64> = Vec::new();
        for (child, node) in self.children.iter().enumerate() {
            for column in node.get_row(child_row) {
                result.push(self.assignments.get(child, column));
            }
        }
        result
    }

    /// Returns the set columns of every row, in the order of `row_ids`.
    pub fn get_rows(&self, row_ids: &[u64]) -> Vec<Vec<u64>> {
        let slice = self.slice_rows(row_ids);
        let mut result: Vec<Vec<u64>> = Vec::with_capacity(row_ids.len());
        let mut current: Vec<u64> = Vec::new();
        for value in slice {
            if value == DELIMITER {
                result.push(std::mem::take(&mut current));
            } else {
                current.push(value);
            }
        }
        debug_assert_eq!(result.len(), row_ids.len());
        result
    }

    /// Returns the concatenated column sets of the rows, each terminated by
    /// [`DELIMITER`], in the order of `row_ids`.
    ///
    /// When several of the upcoming rows fall into the same 64-bit word of
    /// the index vector, the word is fetched once and decoded in place
    /// instead of issuing per-row rank queries.
    pub fn slice_rows(&self, row_ids: &[u64]) -> Vec<u64> {
        let mut slice: Vec<u64> = Vec::with_capacity(row_ids.len() * 2);

        if self.children.is_empty() {
            for row in row_ids {
                debug_assert!((*row as usize) < self.num_rows());
                if self.nonzero_rows.get(*row as usize) {
                    slice.push(0);
                }
                slice.push(DELIMITER);
            }
            return slice;
        }

        // Map the requested rows into the children's coordinates.
        let mut child_row_ids: Vec<u64> = Vec::with_capacity(row_ids.len());
        let mut skip_row: Vec<bool> = vec![true; row_ids.len()];
        let mut i = 0;
        while i < row_ids.len() {
            let offset = row_ids[i] as usize;
            if i + 4 < row_ids.len()
                && (row_ids[i + 4] as usize) < offset + 64
                && row_ids[i + 4] >= row_ids[i]
                && offset + 64 <= self.num_rows()
            {
                // The next rows share a word: one rank query plus popcounts.
                let word = load_word(&self.nonzero_rows, offset);
                let mut rank = None;
                while i < row_ids.len() && (row_ids[i] as usize) < offset + 64 && row_ids[i] as usize >= offset {
                    let bit = row_ids[i] as usize - offset;
                    if word & (1u64 << bit) != 0 {
                        let base = *rank.get_or_insert_with(|| self.nonzero_rows.rank(offset));
                        let below = (word & ((1u64 << bit) - 1)).count_ones() as usize;
                        child_row_ids.push((base + below) as u64);
                        skip_row[i] = false;
                    }
                    i += 1;
                }
            } else {
                let rank = conditional_rank1(&self.nonzero_rows, offset);
                if rank > 0 {
                    child_row_ids.push((rank - 1) as u64);
                    skip_row[i] = false;
                }
                i += 1;
            }
        }

        if child_row_ids.is_empty() {
            return vec![DELIMITER; row_ids.len()];
        }

        // Query the children and transform their columns to our own.
        let mut child_slices: Vec<Vec<u64>> = Vec::with_capacity(self.children.len());
        for (child, node) in self.children.iter().enumerate() {
            let mut child_slice = node.slice_rows(&child_row_ids);
            for value in child_slice.iter_mut() {
                if *value != DELIMITER {
                    *value = self.assignments.get(child, *value);
                }
            }
            child_slices.push(child_slice);
        }

        // Merge the per-child row sets.
        let mut cursors: Vec<usize> = vec![0; child_slices.len()];
        for skip in skip_row {
            if !skip {
                for (child_slice, cursor) in child_slices.iter().zip(cursors.iter_mut()) {
                    while child_slice[*cursor] != DELIMITER {
                        slice.push(child_slice[*cursor]);
                        *cursor += 1;
                    }
                    *cursor += 1;
                }
            }
            slice.push(DELIMITER);
        }
        slice
    }

    /// Returns the set rows of the column in ascending order.
    ///
    /// # Panics
    ///
    /// May panic if the column is out of range.
    pub fn get_column(&self, column: u64) -> Vec<u64> {
        debug_assert!((column as usize) < self.num_columns());
        let num_nonzero = self.nonzero_rows.count_ones();
        if num_nonzero == 0 {
            return Vec::new();
        }
        if self.children.is_empty() {
            return self.nonzero_rows.one_iter().map(|(_, row)| row as u64).collect();
        }

        let child = self.assignments.group(column);
        let mut rows = self.children[child].get_column(self.assignments.rank(column));
        if num_nonzero == self.num_rows() {
            return rows;
        }
        for row in rows.iter_mut() {
            *row = self.nonzero_rows.select(*row as usize).unwrap() as u64;
        }
        rows
    }

    /// Returns the concatenated row sets of the columns, each terminated by
    /// [`DELIMITER`], in the order of `column_ids`.
    ///
    /// Children are queried as independent parallel tasks, and the results
    /// are remapped to the parent's rows with a parallel loop.
    pub fn slice_columns(&self, column_ids: &[u64]) -> Vec<u64> {
        let mut slice: Vec<u64> = Vec::new();
        if column_ids.is_empty() {
            return slice;
        }
        if column_ids.len() == 1 {
            slice = self.get_column(column_ids[0]);
            slice.push(DELIMITER);
            return slice;
        }

        let num_nonzero = self.nonzero_rows.count_ones();
        if num_nonzero == 0 {
            return vec![DELIMITER; column_ids.len()];
        }

        if self.children.is_empty() {
            // All queried columns are the single index column.
            let mut one_column: Vec<u64> = self.nonzero_rows.one_iter().map(|(_, row)| row as u64).collect();
            one_column.push(DELIMITER);
            let mut result = Vec::with_capacity(one_column.len() * column_ids.len());
            for _ in 0..column_ids.len() {
                result.extend_from_slice(&one_column);
            }
            return result;
        }

        // Group the columns by child, keeping the first-appearance order.
        let mut child_order: Vec<usize> = Vec::new();
        let mut child_columns: Vec<Vec<u64>> = Vec::new();
        let mut task_of_child: Vec<Option<usize>> = vec![None; self.children.len()];
        let mut column_tasks: Vec<usize> = Vec::with_capacity(column_ids.len());
        for column in column_ids {
            debug_assert!((*column as usize) < self.num_columns());
            let child = self.assignments.group(*column);
            let task = match task_of_child[child] {
                Some(task) => task,
                None => {
                    let task = child_order.len();
                    task_of_child[child] = Some(task);
                    child_order.push(child);
                    child_columns.push(Vec::new());
                    task
                }
            };
            child_columns[task].push(self.assignments.rank(*column));
            column_tasks.push(task);
        }

        // Query each involved child as an independent task.
        let remap = num_nonzero != self.num_rows();
        let child_slices: Vec<Vec<u64>> = child_order
            .par_iter()
            .zip(child_columns.par_iter())
            .map(|(child, columns)| {
                let mut child_slice = self.children[*child].slice_columns(columns);
                debug_assert_eq!(child_slice.last(), Some(&DELIMITER));
                if remap {
                    child_slice.par_iter_mut().for_each(|row| {
                        if *row != DELIMITER {
                            *row = self.nonzero_rows.select(*row as usize).unwrap() as u64;
                        }
                    });
                }
                child_slice
            })
            .collect();

        // Reassemble in the order of the query columns.
        let mut cursors: Vec<usize> = vec![0; child_slices.len()];
        for task in column_tasks {
            let child_slice = &child_slices[task];
            let cursor = &mut cursors[task];
            loop {
                let value = child_slice[*cursor];
                *cursor += 1;
                slice.push(value);
                if value == DELIMITER {
                    break;
                }
            }
        }
        debug_assert!(cursors.iter().zip(child_slices.iter()).all(|(c, s)| *c == s.len()));
        slice
    }
}

/// Statistics.
impl Brwt {
    /// Calls `callback` for every node in breadth-first order.
    pub fn bft<F: FnMut(&Brwt)>(&self, mut callback: F) {
        let mut queue: std::collections::VecDeque<&Brwt> = std::collections::VecDeque::new();
        queue.push_back(self);
        while let Some(node) = queue.pop_front() {
            callback(node);
            for child in node.children.iter() {
                queue.push_back(child);
            }
        }
    }

    /// Returns the number of set bits in the matrix.
    pub fn num_relations(&self) -> u64 {
        if self.children.is_empty() {
            return self.nonzero_rows.count_ones() as u64;
        }
        self.children.iter().map(|child| child.num_relations()).sum()
    }

    /// Returns the number of nodes in the tree.
    pub fn num_nodes(&self) -> usize {
        let mut result = 0;
        self.bft(|_| result += 1);
        result
    }

    /// Returns the average number of children of the internal nodes.
    pub fn avg_arity(&self) -> f64 {
        let mut internal = 0usize;
        let mut children = 0usize;
        self.bft(|node| {
            if !node.children.is_empty() {
                internal += 1;
                children += node.children.len();
            }
        });
        if internal == 0 { 0.0 } else { children as f64 / internal as f64 }
    }

    /// Returns the mean density of the index vectors of the internal nodes.
    pub fn shrinking_rate(&self) -> f64 {
        let mut internal = 0usize;
        let mut rate_sum = 0.0;
        self.bft(|node| {
            if !node.children.is_empty() && node.num_rows() > 0 {
                internal += 1;
                rate_sum += node.nonzero_rows.count_ones() as f64 / node.num_rows() as f64;
            }
        });
        if internal == 0 { 0.0 } else { rate_sum / internal as f64 }
    }

    /// Returns the total length of the index vectors.
    pub fn total_column_size(&self) -> u64 {
        let mut result = 0;
        self.bft(|node| result += node.num_rows() as u64);
        result
    }

    /// Returns the total number of set bits in the index vectors.
    pub fn total_num_set_bits(&self) -> u64 {
        let mut result = 0;
        self.bft(|node| result += node.nonzero_rows.count_ones() as u64);
        result
    }
}

impl Serialize for Brwt {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        // A pre-order dump of the tree.
        self.assignments.serialize(writer)?;
        self.nonzero_rows.serialize(writer)?;
        self.children.len().serialize(writer)?;
        for child in self.children.iter() {
            child.serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let assignments = RangePartition::load(reader)?;
        let mut nonzero_rows = BitVector::load(reader)?;
        nonzero_rows.enable_rank();
        nonzero_rows.enable_select();
        let num_children = usize::load(reader)?;
        let mut children: Vec<Brwt> = Vec::with_capacity(num_children);
        for _ in 0..num_children {
            children.push(Brwt::load(reader)?);
        }
        if !children.is_empty() && children.len() != assignments.num_groups() {
            return Err(Error::new(ErrorKind::InvalidData, "Brwt: Child count does not match the partition"));
        }
        Ok(Brwt {
            nonzero_rows,
            assignments,
            children,
        })
    }

    fn size_in_elements(&self) -> usize {
        let mut result = self.assignments.size_in_elements() + self.nonzero_rows.size_in_elements() + 1;
        for child in self.children.iter() {
            result += child.size_in_elements();
        }
        result
    }
}

//-----------------------------------------------------------------------------

/// A binary matrix storing each distinct row once.
///
/// Rows are addressed through 32-bit codes into the list of unique rows,
/// which makes the representation suitable for query-time slices of a
/// larger annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniqueRows {
    num_columns: usize,
    row_codes: Vec<u32>,
    unique_rows: Vec<Vec<u64>>,
}

impl UniqueRows {
    /// Creates a matrix from unique rows and per-row codes.
    ///
    /// # Panics
    ///
    /// Panics if a code is out of range.
    pub fn new(unique_rows: Vec<Vec<u64>>, row_codes: Vec<u32>, num_columns: usize) -> Self {
        assert!(row_codes.iter().all(|code| (*code as usize) < unique_rows.len()),
            "UniqueRows: Row code out of range");
        debug_assert!(unique_rows.iter().flatten().all(|c| (*c as usize) < num_columns));
        UniqueRows {
            num_columns,
            row_codes,
            unique_rows,
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.row_codes.len()
    }

    /// Returns the number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Returns the number of unique rows.
    #[inline]
    pub fn num_unique_rows(&self) -> usize {
        self.unique_rows.len()
    }

    /// Returns the bit at the given row and column.
    pub fn get(&self, row: u64, column: u64) -> bool {
        self.unique_rows[self.row_codes[row as usize] as usize].contains(&column)
    }

    /// Returns the set columns of the row in ascending order.
    pub fn get_row(&self, row: u64) -> Vec<u64> {
        self.unique_rows[self.row_codes[row as usize] as usize].clone()
    }

    /// Returns the set columns of every row, in the order of `row_ids`.
    pub fn get_rows(&self, row_ids: &[u64]) -> Vec<Vec<u64>> {
        row_ids.iter().map(|row| self.get_row(*row)).collect()
    }

    /// Returns the concatenated column sets of the rows, each terminated by
    /// [`DELIMITER`], in the order of `row_ids`.
    pub fn slice_rows(&self, row_ids: &[u64]) -> Vec<u64> {
        let mut slice: Vec<u64> = Vec::with_capacity(row_ids.len() * 2);
        for row in row_ids {
            slice.extend_from_slice(&self.unique_rows[self.row_codes[*row as usize] as usize]);
            slice.push(DELIMITER);
        }
        slice
    }

    /// Returns the set rows of the column in ascending order.
    pub fn get_column(&self, column: u64) -> Vec<u64> {
        let mut result: Vec<u64> = Vec::new();
        for (row, code) in self.row_codes.iter().enumerate() {
            if self.unique_rows[*code as usize].contains(&column) {
                result.push(row as u64);
            }
        }
        result
    }

    /// Returns the number of set bits in the matrix.
    pub fn num_relations(&self) -> u64 {
        self.row_codes.iter().map(|code| self.unique_rows[*code as usize].len() as u64).sum()
    }
}

impl Serialize for UniqueRows {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.num_columns.serialize(writer)?;
        let codes: Vec<u64> = self.row_codes.iter().map(|code| *code as u64).collect();
        codes.serialize(writer)?;
        self.unique_rows.len().serialize(writer)?;
        for row in self.unique_rows.iter() {
            row.serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let num_columns = usize::load(reader)?;
        let codes = Vec::<u64>::load(reader)?;
        let unique_count = usize::load(reader)?;
        let mut unique_rows: Vec<Vec<u64>> = Vec::with_capacity(unique_count);
        for _ in 0..unique_count {
            unique_rows.push(Vec::<u64>::load(reader)?);
        }
        if codes.iter().any(|code| *code as usize >= unique_count) {
            return Err(Error::new(ErrorKind::InvalidData, "UniqueRows: Row code out of range"));
        }
        let row_codes: Vec<u32> = codes.iter().map(|code| *code as u32).collect();
        Ok(UniqueRows::new(unique_rows, row_codes, num_columns))
    }

    fn size_in_elements(&self) -> usize {
        let codes: Vec<u64> = self.row_codes.iter().map(|code| *code as u64).collect();
        2 + codes.size_in_elements() + self.unique_rows.iter().map(|row| row.size_in_elements()).sum::<usize>()
    }
}

//-----------------------------------------------------------------------------

/// The matrix representation behind an [`Annotation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BinaryMatrix {
    /// A multi-BRWT tree.
    Brwt(Brwt),
    /// A deduplicated row store.
    UniqueRows(UniqueRows),
}

impl BinaryMatrix {
    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.num_rows(),
            BinaryMatrix::UniqueRows(matrix) => matrix.num_rows(),
        }
    }

    /// Returns the number of columns.
    pub fn num_columns(&self) -> usize {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.num_columns(),
            BinaryMatrix::UniqueRows(matrix) => matrix.num_columns(),
        }
    }

    /// Returns the bit at the given row and column.
    pub fn get(&self, row: u64, column: u64) -> bool {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.get(row, column),
            BinaryMatrix::UniqueRows(matrix) => matrix.get(row, column),
        }
    }

    /// Returns the set columns of the row in ascending order.
    pub fn get_row(&self, row: u64) -> Vec<u64> {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.get_row(row),
            BinaryMatrix::UniqueRows(matrix) => matrix.get_row(row),
        }
    }

    /// Returns the set columns of every row, in the order of `row_ids`.
    pub fn get_rows(&self, row_ids: &[u64]) -> Vec<Vec<u64>> {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.get_rows(row_ids),
            BinaryMatrix::UniqueRows(matrix) => matrix.get_rows(row_ids),
        }
    }

    /// Returns the concatenated column sets of the rows, each terminated by
    /// [`DELIMITER`].
    pub fn slice_rows(&self, row_ids: &[u64]) -> Vec<u64> {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.slice_rows(row_ids),
            BinaryMatrix::UniqueRows(matrix) => matrix.slice_rows(row_ids),
        }
    }

    /// Returns the set rows of the column in ascending order.
    pub fn get_column(&self, column: u64) -> Vec<u64> {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.get_column(column),
            BinaryMatrix::UniqueRows(matrix) => matrix.get_column(column),
        }
    }

    /// Returns the number of set bits in the matrix.
    pub fn num_relations(&self) -> u64 {
        match self {
            BinaryMatrix::Brwt(matrix) => matrix.num_relations(),
            BinaryMatrix::UniqueRows(matrix) => matrix.num_relations(),
        }
    }
}

//-----------------------------------------------------------------------------

/// A label annotation: a binary matrix together with a label encoder.
///
/// Row `i` of the matrix corresponds to edge `i + 1` of the annotated
/// graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    matrix: BinaryMatrix,
    encoder: LabelEncoder,
}

impl Annotation {
    /// Creates an annotation from a matrix and an encoder.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the encoder.
    pub fn new(matrix: BinaryMatrix, encoder: LabelEncoder) -> Self {
        assert_eq!(matrix.num_columns(), encoder.len(), "Annotation: Column count does not match the labels");
        Annotation { matrix, encoder }
    }

    /// Returns a reference to the matrix.
    #[inline]
    pub fn matrix(&self) -> &BinaryMatrix {
        &self.matrix
    }

    /// Returns a reference to the label encoder.
    #[inline]
    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    /// Returns the number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.matrix.num_rows()
    }

    /// Returns the number of labels.
    #[inline]
    pub fn num_labels(&self) -> usize {
        self.encoder.len()
    }

    /// Returns the labels of the row.
    pub fn labels_of_row(&self, row: u64) -> Vec<&str> {
        self.matrix.get_row(row).iter().map(|column| self.encoder.decode(*column as usize)).collect()
    }
}

impl Serialize for Annotation {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let mut header = Header::<AnnotationPayload>::new();
        header.payload_mut().rows = self.matrix.num_rows();
        header.payload_mut().columns = self.matrix.num_columns();
        if let BinaryMatrix::UniqueRows(_) = self.matrix {
            header.unset(AnnotationPayload::FLAG_BRWT);
            header.set(AnnotationPayload::FLAG_UNIQUE_ROWS);
        }
        header.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.encoder.serialize(writer)?;
        match &self.matrix {
            BinaryMatrix::Brwt(matrix) => matrix.serialize(writer),
            BinaryMatrix::UniqueRows(matrix) => matrix.serialize(writer),
        }
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let header = Header::<AnnotationPayload>::load(reader)?;
        if let Err(msg) = header.validate() {
            return Err(Error::new(ErrorKind::InvalidData, msg));
        }
        let encoder = LabelEncoder::load(reader)?;
        let matrix = if header.is_set(AnnotationPayload::FLAG_BRWT) {
            BinaryMatrix::Brwt(Brwt::load(reader)?)
        } else {
            BinaryMatrix::UniqueRows(UniqueRows::load(reader)?)
        };
        if matrix.num_rows() != header.payload().rows || matrix.num_columns() != header.payload().columns {
            return Err(Error::new(ErrorKind::InvalidData, "Annotation: Matrix shape mismatch"));
        }
        if matrix.num_columns() != encoder.len() {
            return Err(Error::new(ErrorKind::InvalidData, "Annotation: Column count does not match the labels"));
        }
        Ok(Annotation { matrix, encoder })
    }

    fn size_in_elements(&self) -> usize {
        let header = Header::<AnnotationPayload>::new();
        header.size_in_elements()
            + self.encoder.size_in_elements()
            + match &self.matrix {
                BinaryMatrix::Brwt(matrix) => matrix.size_in_elements(),
                BinaryMatrix::UniqueRows(matrix) => matrix.size_in_elements(),
            }
    }
}

//-----------------------------------------------------------------------------

/// A column-wise builder for annotations.
///
/// The builder accumulates `(row, label)` relations and finalizes them
/// into a multi-BRWT matrix in a single pass.
///
/// # Examples
///
/// ```
/// use metadbg::annotation::AnnotationBuilder;
///
/// let mut builder = AnnotationBuilder::new(4);
/// builder.add("liver", 0);
/// builder.add("liver", 2);
/// builder.add("kidney", 2);
/// let annotation = builder.build(2);
/// assert_eq!(annotation.labels_of_row(2), vec!["liver", "kidney"]);
/// assert!(annotation.labels_of_row(1).is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct AnnotationBuilder {
    num_rows: usize,
    encoder: LabelEncoder,
    columns: Vec<Vec<u64>>,
}

impl AnnotationBuilder {
    /// Creates a builder for a matrix with the given number of rows.
    pub fn new(num_rows: usize) -> Self {
        AnnotationBuilder {
            num_rows,
            encoder: LabelEncoder::new(),
            columns: Vec::new(),
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Marks the row with the label.
    ///
    /// # Panics
    ///
    /// Panics if the row is out of range.
    pub fn add(&mut self, label: &str, row: u64) {
        assert!((row as usize) < self.num_rows, "AnnotationBuilder: Row {} out of range", row);
        let column = self.encoder.insert(label);
        if column == self.columns.len() {
            self.columns.push(Vec::new());
        }
        self.columns[column].push(row);
    }

    /// Finalizes the builder into a multi-BRWT annotation.
    ///
    /// # Panics
    ///
    /// Panics if no relations were added or `arity < 2`.
    pub fn build(mut self, arity: usize) -> Annotation {
        for column in self.columns.iter_mut() {
            column.sort_unstable();
            column.dedup();
        }
        let matrix = Brwt::from_columns(self.columns, self.num_rows, arity);
        Annotation::new(BinaryMatrix::Brwt(matrix), self.encoder)
    }
}

//-----------------------------------------------------------------------------
