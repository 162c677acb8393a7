use super::*;

use simple_sds::serialize;

use rand::Rng;
use rand::rngs::ThreadRng;

//-----------------------------------------------------------------------------

// A dense boolean model of a binary matrix.
struct DenseMatrix {
    rows: Vec<Vec<bool>>,
}

impl DenseMatrix {
    fn random(num_rows: usize, num_columns: usize, density: f64, rng: &mut ThreadRng) -> Self {
        let rows = (0..num_rows)
            .map(|_| (0..num_columns).map(|_| rng.gen_bool(density)).collect())
            .collect();
        DenseMatrix { rows }
    }

    fn columns(&self) -> Vec<Vec<u64>> {
        let num_columns = self.rows.first().map_or(0, |row| row.len());
        let mut result: Vec<Vec<u64>> = vec![Vec::new(); num_columns];
        for (row, bits) in self.rows.iter().enumerate() {
            for (column, bit) in bits.iter().enumerate() {
                if *bit {
                    result[column].push(row as u64);
                }
            }
        }
        result
    }

    fn row_set(&self, row: usize) -> Vec<u64> {
        self.rows[row].iter().enumerate().filter(|(_, bit)| **bit).map(|(c, _)| c as u64).collect()
    }

    fn column_set(&self, column: usize) -> Vec<u64> {
        self.rows.iter().enumerate().filter(|(_, bits)| bits[column]).map(|(r, _)| r as u64).collect()
    }

    fn num_relations(&self) -> u64 {
        self.rows.iter().flatten().filter(|bit| **bit).count() as u64
    }
}

fn check_matrix(matrix: &Brwt, truth: &DenseMatrix) {
    let num_rows = truth.rows.len();
    let num_columns = truth.rows[0].len();
    assert_eq!(matrix.num_rows(), num_rows, "Incorrect number of rows");
    assert_eq!(matrix.num_columns(), num_columns, "Incorrect number of columns");
    assert_eq!(matrix.num_relations(), truth.num_relations(), "Incorrect number of relations");

    for row in 0..num_rows {
        for column in 0..num_columns {
            assert_eq!(matrix.get(row as u64, column as u64), truth.rows[row][column],
                "Incorrect bit at ({}, {})", row, column);
        }
        assert_eq!(matrix.get_row(row as u64), truth.row_set(row), "Incorrect row {}", row);
    }
    for column in 0..num_columns {
        assert_eq!(matrix.get_column(column as u64), truth.column_set(column), "Incorrect column {}", column);
    }

    // Slices match the concatenation of the individual sets.
    let row_ids: Vec<u64> = (0..num_rows as u64).collect();
    let mut expected: Vec<u64> = Vec::new();
    for row in 0..num_rows {
        expected.extend(truth.row_set(row));
        expected.push(DELIMITER);
    }
    assert_eq!(matrix.slice_rows(&row_ids), expected, "Incorrect row slice");

    let column_ids: Vec<u64> = (0..num_columns as u64).collect();
    let mut expected: Vec<u64> = Vec::new();
    for column in 0..num_columns {
        expected.extend(truth.column_set(column));
        expected.push(DELIMITER);
    }
    assert_eq!(matrix.slice_columns(&column_ids), expected, "Incorrect column slice");
}

//-----------------------------------------------------------------------------

#[test]
fn identity_matrix() {
    let columns = vec![vec![0], vec![1], vec![2]];
    let matrix = Brwt::from_columns(columns, 3, 2);
    for row in 0..3 {
        for column in 0..3 {
            assert_eq!(matrix.get(row, column), row == column, "Incorrect bit at ({}, {})", row, column);
        }
    }
    assert_eq!(matrix.slice_rows(&[0, 1, 2]), vec![0, DELIMITER, 1, DELIMITER, 2, DELIMITER],
        "Incorrect row slice of the identity matrix");
    assert_eq!(matrix.slice_columns(&[0, 1, 2]), vec![0, DELIMITER, 1, DELIMITER, 2, DELIMITER],
        "Incorrect column slice of the identity matrix");
}

#[test]
fn single_column() {
    let matrix = Brwt::from_columns(vec![vec![1, 3, 4]], 6, 2);
    assert_eq!(matrix.num_columns(), 1, "Incorrect number of columns");
    assert_eq!(matrix.get_column(0), vec![1, 3, 4], "Incorrect column content");
    assert_eq!(matrix.get_row(3), vec![0], "Incorrect row content");
    assert!(matrix.get_row(0).is_empty(), "An empty row is not empty");
}

#[test]
fn empty_rows_and_columns() {
    let columns = vec![vec![], vec![2], vec![]];
    let matrix = Brwt::from_columns(columns, 4, 2);
    assert!(matrix.get_column(0).is_empty(), "An empty column is not empty");
    assert_eq!(matrix.get_column(1), vec![2], "Incorrect non-empty column");
    assert_eq!(matrix.slice_rows(&[0, 2]), vec![DELIMITER, 1, DELIMITER], "Incorrect slice");
    assert_eq!(matrix.slice_columns(&[0, 2]), vec![DELIMITER, DELIMITER],
        "Incorrect slice of empty columns");
}

#[test]
fn random_matrices() {
    let mut rng: ThreadRng = rand::thread_rng();
    for (num_rows, num_columns, density, arity) in
        [(100, 10, 0.1, 2), (321, 17, 0.05, 3), (64, 5, 0.5, 2), (200, 33, 0.02, 8)]
    {
        let truth = DenseMatrix::random(num_rows, num_columns, density, &mut rng);
        let matrix = Brwt::from_columns(truth.columns(), num_rows, arity);
        check_matrix(&matrix, &truth);
    }
}

#[test]
fn repeated_and_unsorted_queries() {
    let mut rng: ThreadRng = rand::thread_rng();
    let truth = DenseMatrix::random(150, 12, 0.1, &mut rng);
    let matrix = Brwt::from_columns(truth.columns(), 150, 2);

    let row_ids: Vec<u64> = vec![140, 3, 3, 77, 0, 149, 3];
    let rows = matrix.get_rows(&row_ids);
    for (i, row) in row_ids.iter().enumerate() {
        assert_eq!(rows[i], truth.row_set(*row as usize), "Incorrect repeated row {}", row);
    }

    let column_ids: Vec<u64> = vec![11, 0, 11, 5, 5];
    let slice = matrix.slice_columns(&column_ids);
    let mut expected: Vec<u64> = Vec::new();
    for column in column_ids.iter() {
        expected.extend(truth.column_set(*column as usize));
        expected.push(DELIMITER);
    }
    assert_eq!(slice, expected, "Incorrect repeated column slice");
}

#[test]
fn dense_row_batches() {
    // Many consecutive row ids in the same machine word exercise the
    // word-fetch path of slice_rows.
    let mut rng: ThreadRng = rand::thread_rng();
    let truth = DenseMatrix::random(256, 8, 0.3, &mut rng);
    let matrix = Brwt::from_columns(truth.columns(), 256, 2);
    check_matrix(&matrix, &truth);
}

#[test]
fn tree_statistics() {
    let mut rng: ThreadRng = rand::thread_rng();
    let truth = DenseMatrix::random(120, 16, 0.1, &mut rng);
    let matrix = Brwt::from_columns(truth.columns(), 120, 2);

    assert_eq!(matrix.num_relations(), truth.num_relations(), "Incorrect relation count");
    assert!(matrix.num_nodes() >= 16, "Too few nodes for 16 columns");
    let arity = matrix.avg_arity();
    assert!(arity > 1.0 && arity <= 2.0, "Average arity {} out of range", arity);
    let rate = matrix.shrinking_rate();
    assert!(rate > 0.0 && rate <= 1.0, "Shrinking rate {} out of range", rate);
    assert!(matrix.total_num_set_bits() >= matrix.num_relations(), "Index bits cannot be fewer than relations");
    assert!(matrix.total_column_size() >= matrix.total_num_set_bits(), "Sizes cannot be smaller than set bits");
}

#[test]
fn serialize_brwt() {
    let mut rng: ThreadRng = rand::thread_rng();
    let truth = DenseMatrix::random(90, 7, 0.15, &mut rng);
    let matrix = Brwt::from_columns(truth.columns(), 90, 3);
    serialize::test(&matrix, "brwt", None, true);
}

//-----------------------------------------------------------------------------

#[test]
fn label_encoder() {
    let mut encoder = LabelEncoder::new();
    assert!(encoder.is_empty(), "A new encoder is not empty");
    assert_eq!(encoder.insert("first"), 0, "Incorrect id for the first label");
    assert_eq!(encoder.insert("second"), 1, "Incorrect id for the second label");
    assert_eq!(encoder.insert("first"), 0, "Reinsertion changed the id");
    assert_eq!(encoder.len(), 2, "Incorrect number of labels");
    assert_eq!(encoder.encode("second"), Some(1), "Incorrect encoding");
    assert_eq!(encoder.encode("third"), None, "Found a nonexistent label");
    assert_eq!(encoder.decode(1), "second", "Incorrect decoding");
    let labels: Vec<&str> = encoder.iter().collect();
    assert_eq!(labels, vec!["first", "second"], "Incorrect iteration order");
    serialize::test(&encoder, "label-encoder", None, true);
}

#[test]
fn unique_rows_matrix() {
    let unique = vec![Vec::new(), vec![0, 2], vec![1]];
    let codes = vec![0u32, 1, 1, 2, 0];
    let matrix = UniqueRows::new(unique, codes, 3);
    assert_eq!(matrix.num_rows(), 5, "Incorrect number of rows");
    assert_eq!(matrix.num_columns(), 3, "Incorrect number of columns");
    assert_eq!(matrix.num_unique_rows(), 3, "Incorrect number of unique rows");
    assert_eq!(matrix.num_relations(), 5, "Incorrect number of relations");

    assert!(matrix.get(1, 2) && matrix.get(3, 1), "Set bits are not set");
    assert!(!matrix.get(0, 0) && !matrix.get(1, 1), "Unset bits are set");
    assert_eq!(matrix.get_row(2), vec![0, 2], "Incorrect shared row");
    assert_eq!(matrix.get_column(0), vec![1, 2], "Incorrect column");
    assert_eq!(matrix.slice_rows(&[3, 0]), vec![1, DELIMITER, DELIMITER], "Incorrect slice");
    serialize::test(&matrix, "unique-rows", None, true);
}

#[test]
fn annotation_builder() {
    let mut builder = AnnotationBuilder::new(10);
    builder.add("liver", 0);
    builder.add("liver", 4);
    builder.add("kidney", 4);
    builder.add("kidney", 4);
    builder.add("brain", 9);
    let annotation = builder.build(2);

    assert_eq!(annotation.num_rows(), 10, "Incorrect number of rows");
    assert_eq!(annotation.num_labels(), 3, "Incorrect number of labels");
    assert_eq!(annotation.labels_of_row(4), vec!["liver", "kidney"], "Incorrect labels for row 4");
    assert!(annotation.labels_of_row(5).is_empty(), "An unlabeled row has labels");
    assert_eq!(annotation.matrix().num_relations(), 3, "Duplicate relations were not removed");

    serialize::test(&annotation, "annotation", None, true);
}

#[test]
fn annotation_with_unique_rows() {
    let matrix = UniqueRows::new(vec![Vec::new(), vec![0]], vec![0, 1, 1], 1);
    let mut encoder = LabelEncoder::new();
    encoder.insert("only");
    let annotation = Annotation::new(BinaryMatrix::UniqueRows(matrix), encoder);
    assert_eq!(annotation.labels_of_row(1), vec!["only"], "Incorrect labels");
    serialize::test(&annotation, "unique-annotation", None, true);
}

//-----------------------------------------------------------------------------
