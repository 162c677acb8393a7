use super::*;

use rand::Rng;
use rand::rngs::ThreadRng;

//-----------------------------------------------------------------------------

fn check_sequence(seq: &DynSequence, truth: &[u8]) {
    assert_eq!(seq.len(), truth.len(), "Incorrect sequence length");
    assert_eq!(seq.is_empty(), truth.is_empty(), "Incorrect sequence emptiness");
    assert_eq!(seq.to_vec(), truth, "Incorrect sequence content");

    for (i, symbol) in seq.iter().enumerate() {
        assert_eq!(symbol, truth[i], "Incorrect symbol {} from the iterator", i);
    }

    let mut counts = vec![0usize; seq.sigma()];
    for i in 0..truth.len() {
        assert_eq!(seq.get(i), truth[i], "Incorrect symbol at {}", i);
        for c in 0..seq.sigma() as u8 {
            assert_eq!(seq.rank(c, i), counts[c as usize], "Incorrect rank({}, {})", c, i);
        }
        assert_eq!(seq.select(truth[i], counts[truth[i] as usize]), Some(i),
            "Incorrect select for the occurrence at {}", i);
        counts[truth[i] as usize] += 1;
    }
    for c in 0..seq.sigma() as u8 {
        assert_eq!(seq.rank(c, truth.len()), counts[c as usize], "Incorrect total rank of {}", c);
        assert_eq!(seq.select(c, counts[c as usize]), None, "Found a nonexistent occurrence of {}", c);
    }
}

#[test]
fn empty_sequence() {
    let seq = DynSequence::new(4);
    check_sequence(&seq, &[]);
}

#[test]
fn sequence_from_symbols() {
    let truth = vec![0u8, 3, 1, 1, 2, 0, 3, 3];
    let seq = DynSequence::from_symbols(&truth, 4);
    check_sequence(&seq, &truth);
}

#[test]
fn sequence_insert() {
    let mut seq = DynSequence::new(3);
    let mut truth: Vec<u8> = Vec::new();

    // Front, back, and middle insertions.
    seq.insert(0, 1); truth.insert(0, 1);
    seq.insert(1, 2); truth.insert(1, 2);
    seq.insert(0, 0); truth.insert(0, 0);
    seq.insert(2, 2); truth.insert(2, 2);
    seq.insert(1, 1); truth.insert(1, 1);
    check_sequence(&seq, &truth);
}

#[test]
fn sequence_set() {
    let mut truth = vec![0u8, 3, 1, 1, 2, 0, 3, 3];
    let mut seq = DynSequence::from_symbols(&truth, 4);
    seq.set(1, 0); truth[1] = 0;
    seq.set(7, 1); truth[7] = 1;
    check_sequence(&seq, &truth);
}

#[test]
fn sequence_block_splits() {
    // Enough inserts to force several block splits.
    let mut rng: ThreadRng = rand::thread_rng();
    let mut seq = DynSequence::new(5);
    let mut truth: Vec<u8> = Vec::new();
    for _ in 0..5000 {
        let pos = rng.gen_range(0..=truth.len());
        let symbol = rng.gen_range(0..5) as u8;
        seq.insert(pos, symbol);
        truth.insert(pos, symbol);
    }

    assert_eq!(seq.to_vec(), truth, "Incorrect content after random insertions");
    // Spot-check the queries at random positions.
    for _ in 0..200 {
        let i = rng.gen_range(0..=truth.len());
        let c = rng.gen_range(0..5) as u8;
        let expected = truth[..i].iter().filter(|s| **s == c).count();
        assert_eq!(seq.rank(c, i), expected, "Incorrect rank({}, {}) after splits", c, i);
    }
}

//-----------------------------------------------------------------------------

#[test]
fn empty_bitvector() {
    let bv = DynBitVector::new();
    assert!(bv.is_empty(), "An empty bit vector is not empty");
    assert_eq!(bv.count_ones(), 0, "An empty bit vector contains set bits");
    assert_eq!(bv.select1(0), None, "Found a set bit in an empty bit vector");
}

#[test]
fn bitvector_operations() {
    let truth = vec![true, false, true, true, false, false, true];
    let mut bv = DynBitVector::from_bits(&truth);
    assert_eq!(bv.to_bits(), truth, "Incorrect bit vector content");
    assert_eq!(bv.count_ones(), 4, "Incorrect number of set bits");

    let mut ones = 0;
    for i in 0..truth.len() {
        assert_eq!(bv.get(i), truth[i], "Incorrect bit at {}", i);
        assert_eq!(bv.rank1(i), ones, "Incorrect rank at {}", i);
        if truth[i] {
            assert_eq!(bv.select1(ones), Some(i), "Incorrect select for the set bit at {}", i);
            ones += 1;
        }
    }

    bv.set(0, false);
    bv.insert(3, true);
    assert_eq!(bv.to_bits(), vec![false, false, true, true, true, false, false, true],
        "Incorrect content after mutations");
}

//-----------------------------------------------------------------------------
