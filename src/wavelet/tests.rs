use super::*;

use simple_sds::serialize;

use rand::Rng;
use rand::rngs::ThreadRng;

//-----------------------------------------------------------------------------

fn check_tree(wt: &WaveletTree, truth: &[u8], sigma: usize) {
    assert_eq!(wt.len(), truth.len(), "Incorrect length");
    assert_eq!(wt.is_empty(), truth.is_empty(), "Incorrect emptiness");
    assert_eq!(wt.sigma(), sigma, "Incorrect alphabet size");
    assert_eq!(wt.to_vec(), truth, "Incorrect content");

    let mut counts = vec![0usize; sigma];
    for i in 0..truth.len() {
        assert_eq!(wt.get(i), truth[i], "Incorrect symbol at {}", i);
        for c in 0..sigma as u8 {
            assert_eq!(wt.rank(c, i), counts[c as usize], "Incorrect rank({}, {})", c, i);
        }
        assert_eq!(wt.select(truth[i], counts[truth[i] as usize]), Some(i),
            "Incorrect select for the occurrence at {}", i);
        counts[truth[i] as usize] += 1;
    }
    for c in 0..sigma as u8 {
        assert_eq!(wt.rank(c, truth.len()), counts[c as usize], "Incorrect total rank of {}", c);
        assert_eq!(wt.select(c, counts[c as usize]), None, "Found a nonexistent occurrence of {}", c);
    }
}

//-----------------------------------------------------------------------------

#[test]
fn empty_tree() {
    let wt = WaveletTree::from_symbols(&[], 10);
    check_tree(&wt, &[], 10);
    serialize::test(&wt, "empty-wavelet-tree", None, true);
}

#[test]
fn small_tree() {
    let truth = vec![3u8, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
    let wt = WaveletTree::from_symbols(&truth, 10);
    check_tree(&wt, &truth, 10);
    serialize::test(&wt, "small-wavelet-tree", None, true);
}

#[test]
fn binary_alphabet() {
    let truth = vec![0u8, 1, 1, 0, 1, 0, 0, 0, 1];
    let wt = WaveletTree::from_symbols(&truth, 2);
    check_tree(&wt, &truth, 2);
}

#[test]
fn sparse_alphabet() {
    // Most symbols of the alphabet are absent.
    let truth = vec![7u8; 42];
    let wt = WaveletTree::from_symbols(&truth, 8);
    check_tree(&wt, &truth, 8);
}

#[test]
fn random_tree() {
    let mut rng: ThreadRng = rand::thread_rng();
    let sigma = 10;
    let truth: Vec<u8> = (0..2000).map(|_| rng.gen_range(0..sigma) as u8).collect();
    let wt = WaveletTree::from_symbols(&truth, sigma);
    check_tree(&wt, &truth, sigma);
    serialize::test(&wt, "random-wavelet-tree", None, true);
}

//-----------------------------------------------------------------------------
