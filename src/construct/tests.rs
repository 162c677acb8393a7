use super::*;

use crate::boss::DynBoss;

use simple_sds::serialize;

//-----------------------------------------------------------------------------

fn incremental(k: usize, sequences: &[&str]) -> Boss {
    let mut graph = DynBoss::new(k).unwrap();
    for sequence in sequences {
        graph.add_sequence(sequence).unwrap();
    }
    graph.into_static()
}

fn owned(sequences: &[&str]) -> Vec<String> {
    sequences.iter().map(|s| s.to_string()).collect()
}

//-----------------------------------------------------------------------------

#[test]
fn suffix_lengths() {
    assert_eq!(suffix_length(1, 5), 0, "A single split needs no suffix");
    assert_eq!(suffix_length(4, 5), 1, "Four splits fit into one symbol");
    assert_eq!(suffix_length(5, 5), 2, "Five splits need two symbols");
    assert_eq!(suffix_length(1000, 3), 2, "The suffix length is not capped by k - 1");
}

#[test]
fn suffix_enumeration() {
    assert_eq!(valid_suffixes(0), vec![0], "Length zero does not give a single bucket");

    // $ and the four real symbols.
    assert_eq!(valid_suffixes(1).len(), SIGMA, "Incorrect number of buckets for length 1");

    // A sentinel can only continue a sentinel run: $$, $x, and xy.
    let suffixes = valid_suffixes(2);
    assert_eq!(suffixes.len(), 1 + (SIGMA - 1) + (SIGMA - 1) * (SIGMA - 1),
        "Incorrect number of buckets for length 2");
    assert!(suffixes.windows(2).all(|w| w[0] < w[1]), "Buckets are not in colexicographic order");
}

//-----------------------------------------------------------------------------

#[test]
fn chunked_matches_incremental() {
    let sequences = ["AAACGT", "CGTCA", "GATTACA", "TACATT"];
    let expected = incremental(3, &sequences);
    let input = owned(&sequences);
    for nsplits in [1, 2, 4, 16, 64] {
        let graph = build_boss(&input, 3, false, nsplits, 2, None).unwrap();
        assert_eq!(graph, expected, "Chunked build with {} splits differs from incremental build", nsplits);
    }
}

#[test]
fn chunked_is_deterministic() {
    let input = owned(&["GATTACA", "CATTAGA", "TTTTTTTT", "ACGTACGT"]);
    let single = build_boss(&input, 4, false, 8, 1, None).unwrap();
    let multi = build_boss(&input, 4, false, 8, 4, None).unwrap();
    assert_eq!(single, multi, "The thread count changes the result");

    let mut reordered = input.clone();
    reordered.reverse();
    let shuffled = build_boss(&reordered, 4, false, 8, 2, None).unwrap();
    assert_eq!(shuffled, single, "The input order changes the result");
}

#[test]
fn chunked_with_memory_cap() {
    let input = owned(&["GATTACAGATTACA", "ACGTACGTACGT"]);
    let capped = build_boss(&input, 3, false, 4, 2, Some(1)).unwrap();
    let free = build_boss(&input, 3, false, 4, 2, None).unwrap();
    assert_eq!(capped, free, "The memory cap changes the result");
}

#[test]
fn chunked_canonical() {
    let sequences = ["AAACGT", "TTTGCA"];
    let mut graph = DynBoss::with_mode(3, true).unwrap();
    for sequence in &sequences {
        graph.add_sequence(sequence).unwrap();
    }
    let expected = graph.into_static();
    let chunked = build_boss(&owned(&sequences), 3, true, 4, 2, None).unwrap();
    assert_eq!(chunked, expected, "Canonical chunked build differs from incremental build");
    assert!(chunked.is_canonical(), "The canonical flag was lost");
}

#[test]
fn empty_input() {
    let input: Vec<String> = Vec::new();
    let graph = build_boss(&input, 3, false, 4, 2, None).unwrap();
    assert_eq!(graph, DynBoss::new(3).unwrap().into_static(),
        "An empty input does not produce the sentinel graph");

    let short = owned(&["ACG"]);
    let graph = build_boss(&short, 3, false, 4, 2, None).unwrap();
    assert_eq!(graph.num_edges(), 1, "Sequences of length k were not skipped");
}

#[test]
fn invalid_input() {
    let input = owned(&["GATTANICA"]);
    assert!(build_boss(&input, 3, false, 4, 2, None).is_err(),
        "A sequence with invalid characters was accepted");
    assert!(build_boss(&owned(&["ACGT"]), 1, false, 1, 1, None).is_err(),
        "Node length 1 was accepted");
}

//-----------------------------------------------------------------------------

#[test]
fn partial_builds() {
    let input = owned(&["GATTACA", "CATTAGA", "ACGTACGT"]);
    let expected = build_boss(&input, 3, false, 16, 2, None).unwrap();

    // Build the parts independently and concatenate them.
    let parts_total = 3;
    let mut chunks: Vec<Chunk> = Vec::new();
    for part in 0..parts_total {
        let mut combined = Chunk::new(3);
        for chunk in build_chunks(&input, 3, false, 16, 1, None, part, parts_total).unwrap() {
            combined.append(&chunk);
        }
        chunks.push(combined);
    }
    let merged = merge_chunks(3, false, &chunks).unwrap();
    assert_eq!(merged, expected, "Partial builds do not concatenate to the full build");
}

#[test]
fn serialize_chunks() {
    let input = owned(&["GATTACA", "ACGTACGT"]);
    let chunks = build_chunks(&input, 3, false, 4, 2, None, 0, 1).unwrap();
    for (i, chunk) in chunks.iter().enumerate() {
        if !chunk.is_empty() {
            serialize::test(chunk, &format!("chunk-{}", i), None, true);
        }
    }

    // Round trip through chunk files.
    let base = serialize::temp_file_name("chunk-files");
    let mut loaded: Vec<Chunk> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let filename = chunk_file_name(&base, i, chunks.len());
        serialize::serialize_to(chunk, &filename).unwrap();
        loaded.push(serialize::load_from(&filename).unwrap());
        std::fs::remove_file(&filename).unwrap();
    }
    assert_eq!(loaded, chunks, "Chunk files changed the content");
    assert_eq!(merge_chunks(3, false, &loaded).unwrap(),
        build_boss(&input, 3, false, 4, 2, None).unwrap(),
        "Merging reloaded chunks differs from a direct build");
}

#[test]
fn merge_chunks_validates_k() {
    let chunks = vec![Chunk::new(3), Chunk::new(4)];
    assert!(merge_chunks(3, false, &chunks).is_err(), "A chunk with mismatched k was accepted");
}

//-----------------------------------------------------------------------------
