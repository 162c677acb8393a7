use super::*;

use crate::SIGMA;

use simple_sds::serialize;

//-----------------------------------------------------------------------------

#[test]
fn alphabet_round_trip() {
    for symbol in 0..SIGMA as u8 {
        assert_eq!(encode_char(decode_symbol(symbol)), Some(symbol), "Incorrect round trip for symbol {}", symbol);
    }
    assert_eq!(encode_char(b'a'), Some(1), "Lower case characters are not accepted");
    assert_eq!(encode_char(b'N'), None, "An ambiguous character was accepted");
}

#[test]
fn complement_symbols() {
    assert_eq!(complement(0), 0, "The sentinel does not map to itself");
    for symbol in 1..SIGMA as u8 {
        assert_eq!(complement(complement(symbol)), symbol, "Complement is not an involution for {}", symbol);
    }
}

#[test]
fn sequences() {
    let encoded = encode_sequence("GATTACA").unwrap();
    assert_eq!(encoded, vec![3, 1, 4, 4, 1, 2, 1], "Incorrect encoding");
    assert_eq!(decode_sequence(&encoded), "GATTACA", "Incorrect decoding");
    assert!(encode_sequence("GATTNACA").is_err(), "A sequence with an invalid character was accepted");
    assert!(encode_sequence("GAT$ACA").is_err(), "A sequence with a sentinel was accepted");
}

#[test]
fn reverse_complements() {
    assert_eq!(reverse_complement_str("AAACGT"), "ACGTTT");
    assert_eq!(reverse_complement_str(&reverse_complement_str("GATTACA")), "GATTACA",
        "Reverse complement is not an involution");
}

//-----------------------------------------------------------------------------

#[test]
fn packed_keys() {
    let node = vec![0u8, 0, 1, 2]; // $$AC
    let key = pack_edge(&node, 3);
    let (unpacked, symbol) = unpack_edge(key, node.len());
    assert_eq!(unpacked, node, "Incorrect unpacked node");
    assert_eq!(symbol, 3, "Incorrect unpacked symbol");
    assert_eq!(key_symbol(key), 3, "Incorrect symbol access");
    assert_eq!(key_node_last(key, node.len()), 2, "Incorrect node last symbol");

    // Same node suffix and symbol imply the same target.
    let other = pack_edge(&[4u8, 0, 1, 2], 3);
    assert_eq!(key_node_suffix(key), key_node_suffix(other), "Suffixes of sibling edges differ");
}

#[test]
fn key_order_is_graph_order() {
    // Colexicographic by node, ties broken by edge symbol.
    let a = pack_edge(&[1u8, 1, 1], 2); // AAA-C
    let b = pack_edge(&[1u8, 1, 1], 3); // AAA-G
    let c = pack_edge(&[2u8, 1, 1], 1); // CAA-A: node colex-greater than AAA
    let d = pack_edge(&[1u8, 1, 2], 1); // AAC-A: last symbol dominates
    assert!(a < b, "Edge symbol does not break ties");
    assert!(b < c, "Third-from-last node symbol ignored");
    assert!(c < d, "Last node symbol does not dominate");
}

#[test]
fn sort_unique_keys() {
    let node_a = vec![1u8, 2, 3];
    let node_b = vec![3u8, 2, 1];
    let mut keys = vec![
        pack_edge(&node_b, 4),
        pack_edge(&node_a, 1),
        pack_edge(&node_b, 4),
        pack_edge(&node_a, 2),
        pack_edge(&node_a, 1),
    ];
    sort_unique(&mut keys, 12);
    assert_eq!(keys.len(), 3, "Duplicates were not removed");
    assert!(keys.windows(2).all(|w| w[0] < w[1]), "Keys are not sorted");
}

//-----------------------------------------------------------------------------

#[test]
fn empty_bitmap() {
    let mask = Bitmap::new(0);
    assert!(mask.is_empty(), "An empty bitmap is not empty");
    assert_eq!(mask.count_ones(), 0, "An empty bitmap contains set bits");
}

#[test]
fn bitmap_operations() {
    let mut mask = Bitmap::new(10);
    mask.set(3, true);
    mask.set(7, true);
    mask.set(9, true);
    mask.set(7, false);
    assert_eq!(mask.len(), 10, "Incorrect length");
    assert_eq!(mask.count_ones(), 2, "Incorrect number of set bits");
    assert!(mask.get(3) && mask.get(9), "Set bits are not set");
    assert!(!mask.get(7), "An unset bit is set");

    let mut ones: Vec<usize> = Vec::new();
    mask.call_ones(|i| ones.push(i));
    assert_eq!(ones, vec![3, 9], "Incorrect set positions");

    let lazy = Bitmap::from_fn(10, |i| i == 3 || i == 9);
    assert_eq!(lazy, mask, "Lazy construction differs from explicit construction");

    serialize::test(&mask, "bitmap", None, true);
}

#[test]
#[should_panic]
fn bitmap_reserved_index() {
    let mut mask = Bitmap::new(4);
    mask.set(0, true);
}

//-----------------------------------------------------------------------------
