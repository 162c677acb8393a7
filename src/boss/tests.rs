use super::*;

use crate::support;

use simple_sds::serialize;

//-----------------------------------------------------------------------------

// Builds a static graph from the sequences with incremental insertion.
fn build_graph(k: usize, sequences: &[&str]) -> Boss {
    let mut graph = DynBoss::new(k).unwrap();
    for sequence in sequences {
        graph.add_sequence(sequence).unwrap();
    }
    graph.into_static()
}

// Returns the W values, last bits, and F counts of the graph.
fn extract(graph: &Boss) -> (Vec<u8>, Vec<bool>, FArray) {
    let mut w: Vec<u8> = Vec::new();
    let mut last: Vec<bool> = Vec::new();
    for edge in 1..=graph.num_edges() {
        w.push(graph.w_value(edge));
        last.push(graph.last_value(edge));
    }
    (w, last, *graph.f_array())
}

fn check_navigation(graph: &Boss) {
    for edge in 1..=graph.num_edges() {
        // The three arrays are consistent.
        assert_eq!(graph.num_edges(), graph.f_array()[SIGMA], "F does not count all edges");

        // Every outgoing edge can be traversed.
        let node = graph.get_node_sequence(edge);
        graph.call_outgoing(edge, |target, c| {
            assert_ne!(target, NPOS, "call_outgoing reported an invalid target from edge {}", edge);
            assert_eq!(graph.traverse(edge, c), target,
                "traverse({}, {}) disagrees with call_outgoing", edge, c as char);
            let target_node = graph.get_node_sequence(target);
            assert_eq!(&target_node[..graph.k() - 1], &node[1..],
                "Edge {} does not overlap its target {}", edge, target);
        });

        // Following the edge symbol is the same as fwd.
        let symbol = graph.edge_symbol(edge);
        if symbol != 0 {
            let c = support::decode_symbol(symbol);
            assert_eq!(graph.traverse(edge, c), graph.next_edge(edge),
                "traverse over the edge symbol disagrees with fwd at {}", edge);
        }

        // Degrees agree with the callbacks.
        let mut outgoing = 0;
        graph.call_outgoing(edge, |_, _| outgoing += 1);
        let sinks = (graph.node_outdegree(edge) - outgoing) as usize;
        assert!(sinks <= 1, "Node of edge {} has multiple sink edges", edge);
        let mut incoming = 0;
        let range = graph.node_range_of(edge);
        graph.call_incoming(edge, |source, c| {
            incoming += 1;
            let target = graph.next_edge(source);
            assert!(target >= range.0 && target <= range.1,
                "Incoming edge {} does not lead back to the node of edge {}", source, edge);
            assert_eq!(graph.get_node_sequence(source).as_bytes()[0], c,
                "Incorrect predecessor character for edge {}", edge);
        });
        assert_eq!(graph.node_indegree(edge), incoming, "Incorrect indegree at edge {}", edge);

        // Every edge k-mer maps back to itself.
        let kmer = graph.edge_sequence(edge);
        if !kmer.contains('$') {
            assert_eq!(graph.kmer_to_edge(&kmer), edge, "Edge {} does not map to itself", edge);
        }
    }
}

// Returns the real (k+1)-mers of the graph.
fn real_kmers(graph: &Boss) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    graph.call_kmers(|_, kmer| {
        if !kmer.contains('$') {
            result.push(kmer.to_string());
        }
    });
    result
}

// Returns the sorted distinct (k+1)-mers of the sequences.
fn expected_kmers(k: usize, sequences: &[&str]) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for sequence in sequences {
        if sequence.len() < k + 1 {
            continue;
        }
        for t in 0..=sequence.len() - (k + 1) {
            result.push(sequence[t..t + k + 1].to_string());
        }
    }
    result.sort();
    result.dedup();
    result
}

//-----------------------------------------------------------------------------

#[test]
fn empty_graph() {
    let graph = DynBoss::new(3).unwrap().into_static();
    assert_eq!(graph.num_edges(), 1, "An empty graph does not consist of the sentinel edge");
    assert_eq!(graph.num_nodes(), 1, "An empty graph does not consist of the root node");
    assert_eq!(graph.get_node_sequence(1), "$$$", "Incorrect root node");
    assert_eq!(graph.kmer_to_edge("AAAA"), NPOS, "Found an edge in an empty graph");
}

#[test]
fn invalid_k() {
    assert!(DynBoss::new(1).is_err(), "Node length 1 was accepted");
    assert!(DynBoss::new(MAX_K + 1).is_err(), "An overlong node length was accepted");
}

#[test]
fn single_sequence() {
    // One sequence of 3 real edges: 3 dummy source edges and 1 sink edge.
    let graph = build_graph(3, &["AAACGT"]);
    assert_eq!(graph.num_edges(), 7, "Incorrect number of edges");
    assert_eq!(graph.num_nodes(), 7, "Incorrect number of nodes");

    let (w, last, f) = extract(&graph);
    assert_eq!(w, vec![1, 1, 1, 2, 3, 4, 0], "Incorrect W");
    assert_eq!(last, vec![true; 7], "Incorrect last");
    assert_eq!(f, [0, 1, 4, 5, 6, 7], "Incorrect F");

    let edge = graph.kmer_to_edge("AACG");
    assert_eq!(edge, 5, "Incorrect edge for AACG");
    assert_eq!(graph.get_node_sequence(edge), "AAC", "Incorrect node for AACG");
    check_navigation(&graph);
}

#[test]
fn align_chain() {
    let graph = build_graph(3, &["AAACGT"]);
    let sequence = "AAACGT";
    let result = graph.align(sequence, 3);
    assert_eq!(result.len(), 4, "Incorrect number of aligned positions");
    assert!(result.iter().all(|edge| *edge != NPOS), "An aligned position is missing");
    for t in 0..result.len() - 1 {
        assert!(result[t] < result[t + 1], "Aligned edges are not strictly increasing");
        assert_eq!(graph.traverse(result[t], sequence.as_bytes()[t + 3]), result[t + 1],
            "Aligned edges are not connected by traverse at {}", t);
    }
    assert_eq!(graph.map_to_edges(sequence), result, "map_to_edges disagrees with align");

    let with_gap = graph.align("AANCGT", 3);
    assert_eq!(&with_gap[..3], &[NPOS, NPOS, NPOS], "Windows with invalid characters are not rejected");
    assert_ne!(with_gap[3], NPOS, "A valid window after an invalid character is not aligned");
}

#[test]
fn shared_target_flags() {
    // TACT and GACT both reach node ACT, so the edge from the
    // colex-greater source TAC carries the duplication flag.
    let graph = build_graph(3, &["TACT", "GACT"]);
    let (w, last, f) = extract(&graph);
    assert_eq!(w, vec![3, 4, 2, 2, 4, 4 + SIGMA as u8, 1, 1, 0], "Incorrect W");
    assert_eq!(last, vec![false, true, true, true, true, true, true, true, true], "Incorrect last");
    assert_eq!(f, [0, 2, 4, 6, 7, 9], "Incorrect F");

    let act = graph.map_to_edges("ACT")[0];
    assert_ne!(act, NPOS, "The shared target node is missing");
    assert_eq!(graph.node_indegree(act), 2, "Incorrect indegree of the shared target");
    check_navigation(&graph);
}

#[test]
fn insertion_order_does_not_matter() {
    let forward = build_graph(3, &["TACT", "GACT"]);
    let reverse = build_graph(3, &["GACT", "TACT"]);
    assert_eq!(forward, reverse, "Insertion order changes the graph");
}

#[test]
fn duplicate_insertions() {
    let once = build_graph(4, &["GATTACA"]);
    let twice = build_graph(4, &["GATTACA", "GATTACA", "GATT", "GATTA"]);
    assert_eq!(once, twice, "Duplicate sequences change the graph");
}

#[test]
fn short_sequences_are_skipped() {
    let mut graph = DynBoss::new(3).unwrap();
    assert_eq!(graph.add_sequence("ACG").unwrap(), 0, "A sequence of length k was not skipped");
    assert_eq!(graph.num_edges(), 1, "A skipped sequence changed the graph");
    assert!(graph.add_sequence("ACGN").is_err(), "An invalid sequence was accepted");
}

#[test]
fn round_trip_kmers() {
    let sequences = ["GATTACA", "TACATACA", "CATCATCAT", "GATTACA"];
    let graph = build_graph(3, &sequences);
    assert_eq!(real_kmers(&graph), expected_kmers(3, &sequences),
        "The graph does not contain exactly the 4-mers of the input");
    check_navigation(&graph);
}

#[test]
fn sink_edges_are_dropped_when_extended() {
    // GATT ends at ATT; the second sequence extends ATT, so the sink edge
    // must be gone.
    let graph = build_graph(3, &["GATT", "ATTA"]);
    let mut sinks: Vec<String> = Vec::new();
    graph.call_kmers(|_, kmer| {
        if kmer.ends_with('$') {
            sinks.push(kmer.to_string());
        }
    });
    assert_eq!(sinks, vec!["TTA$"], "Incorrect sink edges");
}

#[test]
fn serialize_graph() {
    let graph = build_graph(3, &["AAA", "AAC", "ACG", "AAACGT"]);
    serialize::test(&graph, "boss", None, true);

    // Loading through a file preserves the content.
    let filename = serialize::temp_file_name("boss-reload");
    serialize::serialize_to(&graph, &filename).unwrap();
    let loaded: Boss = serialize::load_from(&filename).unwrap();
    assert_eq!(loaded, graph, "Serialization changed the graph");
    std::fs::remove_file(&filename).unwrap();
}

#[test]
fn state_transitions() {
    let graph = build_graph(3, &["GATTACA"]);
    let mut dynamic = graph.clone().into_dynamic();
    dynamic.add_sequence("TACATT").unwrap();
    let extended = dynamic.into_static();
    let direct = build_graph(3, &["GATTACA", "TACATT"]);
    assert_eq!(extended, direct, "Extending a reloaded graph changes the result");
}

#[test]
fn merge_graphs() {
    let first = build_graph(3, &["TACT", "CATTA"]);
    let second = build_graph(3, &["GACT", "TTACG"]);
    let mut target = first.clone().into_dynamic();
    target.merge(&second).unwrap();
    let merged = target.into_static();
    let direct = build_graph(3, &["TACT", "CATTA", "GACT", "TTACG"]);
    assert_eq!(merged, direct, "Merging differs from building from the union");

    // Merging with an empty graph is a no-op.
    let empty = DynBoss::new(3).unwrap().into_static();
    let mut target = first.clone().into_dynamic();
    assert_eq!(target.merge(&empty).unwrap(), 0, "Merging an empty graph inserted edges");
    assert_eq!(target.into_static(), first, "Merging an empty graph changed the graph");

    // Node lengths must match.
    let mut target = first.into_dynamic();
    let wrong_k = build_graph(4, &["GACTA"]);
    assert!(target.merge(&wrong_k).is_err(), "Node length mismatch was not detected");
}

#[test]
fn cyclic_sequences() {
    // AAC -> ACA -> CAA -> AAC is a cycle in which every node's first
    // incoming edge comes from inside the cycle.
    let sequences = ["TAACAACAAC"];
    let graph = build_graph(3, &sequences);
    assert_eq!(real_kmers(&graph), expected_kmers(3, &sequences), "Incorrect k-mers for a cyclic sequence");
    check_navigation(&graph);
}

#[test]
fn merge_cyclic_graphs() {
    let first = build_graph(3, &["TAACAACAAC"]);
    let second = build_graph(3, &["CAACG"]);
    let mut target = first.into_dynamic();
    target.merge(&second).unwrap();
    let direct = build_graph(3, &["TAACAACAAC", "CAACG"]);
    assert_eq!(target.into_static(), direct, "Merging cyclic graphs differs from a direct build");
}

#[test]
fn canonical_mode() {
    let mut graph = DynBoss::with_mode(3, true).unwrap();
    graph.add_sequence("AAACGT").unwrap();
    let graph = graph.into_static();
    assert!(graph.is_canonical(), "The canonical flag was lost");

    // Both strands are present.
    for kmer in ["AAAC", "ACGT", "GTTT", "ACGT"] {
        assert_ne!(graph.kmer_to_edge(kmer), NPOS, "Missing k-mer {}", kmer);
        let rc = support::reverse_complement_str(kmer);
        assert_ne!(graph.kmer_to_edge(&rc), NPOS, "Missing reverse complement {}", rc);
    }
    check_navigation(&graph);
}

#[test]
#[should_panic]
fn invalid_edge_index() {
    let graph = build_graph(3, &["AAACGT"]);
    let _ = graph.get_node_sequence(graph.num_edges() + 1);
}

//-----------------------------------------------------------------------------
