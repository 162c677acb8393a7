use metadbg::annotation::{Annotation, AnnotationBuilder};
use metadbg::boss::{Boss, DynBoss};
use metadbg::graph::{DeBruijnGraph, HashDbg, SuccinctDbg};
use metadbg::query::{AnnotatedDbg, QueryConfig, QueryExecutor};
use metadbg::{construct, internal, merge, support, NPOS};

use simple_sds::serialize;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;
use std::{env, io, process};

use getopts::{Matches, Options};

//-----------------------------------------------------------------------------

// Exit codes: 0 for success, 1 for input errors, 2 for usage errors.

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();
    if args.len() < 2 {
        print_usage(&program);
        process::exit(2);
    }

    let result = match args[1].as_str() {
        "build" => build(&program, &args[2..]),
        "merge" => merge_graphs(&program, &args[2..]),
        "compare" => compare(&program, &args[2..]),
        "stats" => stats(&program, &args[2..]),
        "transform" => transform(&program, &args[2..]),
        "align" => align(&program, &args[2..]),
        "annotate" => annotate(&program, &args[2..]),
        "classify" => classify(&program, &args[2..]),
        "filter" => filter(&program, &args[2..]),
        "help" | "-h" | "--help" => {
            print_usage(&program);
            return;
        }
        command => {
            eprintln!("{}: Unknown command {}", program, command);
            print_usage(&program);
            process::exit(2);
        }
    };

    if let Err(message) = result {
        eprintln!("{}: {}", program, message);
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} COMMAND [options] [files]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  build      build a graph from sequence files");
    eprintln!("  merge      merge two or more graphs");
    eprintln!("  compare    compare two graphs for equality");
    eprintln!("  stats      print graph statistics");
    eprintln!("  transform  convert a graph to another representation");
    eprintln!("  align      map query sequences against a graph");
    eprintln!("  annotate   build a label annotation for a graph");
    eprintln!("  classify   query labels for sequences");
    eprintln!("  filter     drop reads with rare k-mers");
    eprintln!();
    eprintln!("Run '{} COMMAND -h' for the options of a command.", program);
}

//-----------------------------------------------------------------------------

// CLI options override environment variables, which override defaults.

fn default_threads() -> usize {
    env::var("METADBG_THREADS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|threads| *threads > 0)
        .unwrap_or(1)
}

fn default_mem_cap() -> Option<usize> {
    env::var("METADBG_MEM_CAP_GB")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .map(|gb| gb * 1024 * 1024 * 1024)
}

fn parse_options(program: &str, command: &str, usage_args: &str, opts: &Options, args: &[String]) -> Matches {
    let matches = match opts.parse(args) {
        Ok(matches) => matches,
        Err(failure) => {
            eprintln!("{} {}: {}", program, command, failure);
            process::exit(2);
        }
    };
    if matches.opt_present("h") {
        let header = format!("Usage: {} {} [options] {}", program, command, usage_args);
        eprint!("{}", opts.usage(&header));
        process::exit(0);
    }
    matches
}

fn parse_threads(matches: &Matches) -> usize {
    match matches.opt_str("p").map(|value| value.parse::<usize>()) {
        Some(Ok(threads)) if threads > 0 => threads,
        Some(_) => {
            eprintln!("--parallel: number of threads must be a positive integer");
            process::exit(2);
        }
        None => default_threads(),
    }
}

fn require_output(matches: &Matches) -> String {
    match matches.opt_str("o") {
        Some(value) => value,
        None => {
            eprintln!("--outfile-base: an output base name is required");
            process::exit(2);
        }
    }
}

//-----------------------------------------------------------------------------

// Reads sequences from line-oriented files, skipping headers and empty
// lines. File format parsing proper is outside the core: the contract is a
// stream of DNA strings.
fn read_sequences(files: &[String]) -> Result<Vec<String>, String> {
    if files.is_empty() {
        return Err("No input files".to_string());
    }
    let mut result: Vec<String> = Vec::new();
    for file in files {
        let handle = File::open(file).map_err(|e| format!("{}: {}", file, e))?;
        for line in BufReader::new(handle).lines() {
            let line = line.map_err(|e| format!("{}: {}", file, e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('>') || line.starts_with('@') {
                continue;
            }
            result.push(line.to_string());
        }
    }
    Ok(result)
}

fn load_graph(file: &str) -> Result<Boss, String> {
    let graph: Boss = serialize::load_from(file).map_err(|e| format!("{}: {}", file, e))?;
    Ok(graph)
}

fn graph_file_name(base: &str) -> String {
    format!("{}.dbg", base)
}

fn annotation_file_name(base: &str) -> String {
    format!("{}.anno.dbg", base)
}

//-----------------------------------------------------------------------------

fn build(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optopt("k", "kmer-length", "node length (default 31)", "INT");
    opts.optflag("c", "canonical", "index both strands of every k-mer");
    opts.optflag("r", "complement", "also index the reverse complements of the reads");
    opts.optflag("f", "fast", "use the chunked construction pipeline");
    opts.optopt("s", "nsplits", "number of suffix buckets in fast mode (default 1)", "INT");
    opts.optopt("p", "parallel", "number of threads", "INT");
    opts.optopt("m", "mem-cap-gb", "memory cap for construction buffers", "INT");
    opts.optopt("o", "outfile-base", "output base name", "NAME");
    opts.optflag("v", "verbose", "print progress information");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "build", "file1 [file2 ...]", &opts, args);

    let k = match matches.opt_str("k").map(|value| value.parse::<usize>()) {
        Some(Ok(k)) => k,
        Some(_) => {
            eprintln!("--kmer-length: the node length must be an integer");
            process::exit(2);
        }
        None => 31,
    };
    let threads = parse_threads(&matches);
    let nsplits = matches.opt_str("s").and_then(|value| value.parse::<usize>().ok()).unwrap_or(1);
    let mem_cap = matches
        .opt_str("m")
        .and_then(|value| value.parse::<usize>().ok())
        .map(|gb| gb * 1024 * 1024 * 1024)
        .or_else(default_mem_cap);
    let canonical = matches.opt_present("c");
    let output = require_output(&matches);
    let verbose = matches.opt_present("v");

    let start = Instant::now();
    let mut sequences = read_sequences(&matches.free)?;
    if matches.opt_present("r") && !canonical {
        let complements: Vec<String> = sequences.iter().map(|s| support::reverse_complement_str(s)).collect();
        sequences.extend(complements);
    }

    let graph = if matches.opt_present("f") {
        construct::build_boss(&sequences, k, canonical, nsplits, threads, mem_cap)
            .map_err(|e| e.to_string())?
    } else {
        let mut graph = DynBoss::with_mode(k, canonical).map_err(|e| e.to_string())?;
        for sequence in sequences.iter() {
            graph.add_sequence(sequence).map_err(|e| e.to_string())?;
        }
        graph.into_static()
    };

    let filename = graph_file_name(&output);
    serialize::serialize_to(&graph, &filename).map_err(|e| e.to_string())?;
    if verbose {
        eprintln!("Built a graph with {} nodes and {} edges in {:.3} seconds",
            graph.num_nodes(), graph.num_edges(), start.elapsed().as_secs_f64());
        internal::report_memory_usage();
    }
    Ok(())
}

//-----------------------------------------------------------------------------

fn merge_graphs(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optflag("b", "blocked", "use the blocked parallel merge");
    opts.optopt("n", "parts-total", "number of blocks in blocked mode (default 1)", "INT");
    opts.optopt("p", "parallel", "number of threads", "INT");
    opts.optopt("o", "outfile-base", "output base name", "NAME");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "merge", "graph1.dbg graph2.dbg [...]", &opts, args);

    if matches.free.len() < 2 {
        eprintln!("merge: at least two graphs are required");
        process::exit(2);
    }
    let threads = parse_threads(&matches);
    let parts = matches.opt_str("n").and_then(|value| value.parse::<usize>().ok()).unwrap_or(1);
    let output = require_output(&matches);

    let mut graphs: Vec<Boss> = Vec::new();
    for file in matches.free.iter() {
        graphs.push(load_graph(file)?);
    }
    let sources: Vec<&Boss> = graphs.iter().collect();

    let merged = if matches.opt_present("b") {
        merge::blocked_merge(&sources, parts, threads).map_err(|e| e.to_string())?
    } else {
        merge::traversal_merge(&sources).map_err(|e| e.to_string())?
    };
    serialize::serialize_to(&merged, &graph_file_name(&output)).map_err(|e| e.to_string())
}

//-----------------------------------------------------------------------------

fn compare(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "compare", "first.dbg second.dbg", &opts, args);

    if matches.free.len() != 2 {
        eprintln!("compare: exactly two graphs are required");
        process::exit(2);
    }
    let first = load_graph(&matches.free[0])?;
    let second = load_graph(&matches.free[1])?;
    if first == second {
        println!("Graphs are identical");
        Ok(())
    } else {
        println!("Graphs differ");
        process::exit(1);
    }
}

//-----------------------------------------------------------------------------

fn stats(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optopt("o", "outfile-base", "also write the table to FILE.stats.dbg", "NAME");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "stats", "graph1.dbg [...]", &opts, args);

    if matches.free.is_empty() {
        eprintln!("stats: at least one graph is required");
        process::exit(2);
    }
    let mut table = String::from("file\tnodes\tedges\tk\n");
    for file in matches.free.iter() {
        let graph = load_graph(file)?;
        table.push_str(&format!("{}\t{}\t{}\t{}\n", file, graph.num_nodes(), graph.num_edges(), graph.k()));
    }

    let mut output = BufWriter::new(io::stdout());
    output.write_all(table.as_bytes()).map_err(|e| e.to_string())?;
    output.flush().map_err(|e| e.to_string())?;
    if let Some(base) = matches.opt_str("o") {
        std::fs::write(format!("{}.stats.dbg", base), table).map_err(|e| e.to_string())?;
    }
    Ok(())
}

//-----------------------------------------------------------------------------

fn transform(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optflag("a", "to-adj-list", "dump the graph as an adjacency list");
    opts.optopt("o", "outfile-base", "write the output to FILE.adjlist instead of stdout", "NAME");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "transform", "graph.dbg", &opts, args);

    if matches.free.len() != 1 {
        eprintln!("transform: exactly one graph is required");
        process::exit(2);
    }
    if !matches.opt_present("a") {
        eprintln!("transform: no transformation was chosen");
        process::exit(2);
    }
    let graph = load_graph(&matches.free[0])?;

    if let Some(base) = matches.opt_str("o") {
        let file = File::create(format!("{}.adjlist", base)).map_err(|e| e.to_string())?;
        let mut writer = BufWriter::new(file);
        merge::write_adjacency_list(&graph, &mut writer).map_err(|e| e.to_string())?;
        writer.flush().map_err(|e| e.to_string())
    } else {
        let mut writer = BufWriter::new(io::stdout());
        merge::write_adjacency_list(&graph, &mut writer).map_err(|e| e.to_string())?;
        writer.flush().map_err(|e| e.to_string())
    }
}

//-----------------------------------------------------------------------------

fn align(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optopt("i", "index", "the graph to align against", "FILE");
    opts.optopt("a", "match-length", "match length (default k)", "INT");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "align", "-i graph.dbg queries1 [...]", &opts, args);

    let index = match matches.opt_str("i") {
        Some(file) => file,
        None => {
            eprintln!("align: a graph index is required");
            process::exit(2);
        }
    };
    let graph = load_graph(&index)?;
    let length = matches
        .opt_str("a")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| graph.k());
    if length == 0 || length > graph.k() {
        eprintln!("--match-length: the length must be between 1 and k");
        process::exit(2);
    }

    let start = Instant::now();
    let sequences = read_sequences(&matches.free)?;
    let mut output = BufWriter::new(io::stdout());
    let mut total_len = 0;
    for (ordinal, sequence) in sequences.iter().enumerate() {
        total_len += sequence.len();
        let edges = graph.align(sequence, length);
        let fields: Vec<String> = edges.iter().map(|edge| edge.to_string()).collect();
        writeln!(output, "{}\t{}", ordinal, fields.join(",")).map_err(|e| e.to_string())?;
    }
    output.flush().map_err(|e| e.to_string())?;
    internal::report_results(sequences.len(), total_len, start.elapsed());
    Ok(())
}

//-----------------------------------------------------------------------------

fn annotate(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optopt("i", "index", "the graph to annotate", "FILE");
    opts.optmulti("l", "label", "label for the input file at the same position", "NAME");
    opts.optopt("a", "arity", "arity of the annotation matrix (default 2)", "INT");
    opts.optopt("o", "outfile-base", "output base name", "NAME");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "annotate", "-i graph.dbg file1 [...]", &opts, args);

    let index = match matches.opt_str("i") {
        Some(file) => file,
        None => {
            eprintln!("annotate: a graph index is required");
            process::exit(2);
        }
    };
    let arity = matches.opt_str("a").and_then(|value| value.parse::<usize>().ok()).unwrap_or(2);
    let output = require_output(&matches);
    let labels = matches.opt_strs("l");
    if !labels.is_empty() && labels.len() != matches.free.len() {
        eprintln!("annotate: there must be one label per input file");
        process::exit(2);
    }

    let graph = SuccinctDbg::new(Arc::new(load_graph(&index)?));
    let mut builder = AnnotationBuilder::new(graph.max_index());
    for (position, file) in matches.free.iter().enumerate() {
        let label = if labels.is_empty() { file } else { &labels[position] };
        let sequences = read_sequences(&[file.clone()])?;
        for sequence in sequences {
            graph.map_to_nodes(&sequence, &mut |node| {
                if node != NPOS {
                    builder.add(label, AnnotatedDbg::node_to_row(node));
                }
            });
        }
    }

    let annotation = builder.build(arity);
    serialize::serialize_to(&annotation, &annotation_file_name(&output)).map_err(|e| e.to_string())
}

//-----------------------------------------------------------------------------

fn classify(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optopt("i", "index", "the graph to query", "FILE");
    opts.optopt("n", "annotation", "the annotation of the graph", "FILE");
    opts.optflag("f", "fast", "batch the queries through a query graph");
    opts.optopt("b", "batch-size-mb", "batch size in fast mode (default 64)", "INT");
    opts.optopt("d", "discovery-fraction", "fraction of k-mers a label must cover (default 0.7)", "FLOAT");
    opts.optopt("t", "num-top-labels", "report only the top labels with counts", "INT");
    opts.optopt("p", "parallel", "number of threads", "INT");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "classify", "-i graph.dbg -n graph.anno.dbg queries1 [...]", &opts, args);

    let index = match matches.opt_str("i") {
        Some(file) => file,
        None => {
            eprintln!("classify: a graph index is required");
            process::exit(2);
        }
    };
    let annotation_file = match matches.opt_str("n") {
        Some(file) => file,
        None => {
            eprintln!("classify: an annotation is required");
            process::exit(2);
        }
    };
    let config = QueryConfig {
        discovery_fraction: matches
            .opt_str("d")
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(0.7),
        num_top_labels: matches.opt_str("t").and_then(|value| value.parse::<usize>().ok()),
        batched: matches.opt_present("f"),
        batch_size: matches
            .opt_str("b")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(64)
            * 1024 * 1024,
        num_threads: parse_threads(&matches),
    };

    let graph = Arc::new(SuccinctDbg::new(Arc::new(load_graph(&index)?)));
    let annotation: Annotation = serialize::load_from(&annotation_file)
        .map_err(|e| format!("{}: {}", annotation_file, e))?;
    let anno_graph = Arc::new(AnnotatedDbg::new(graph, annotation).map_err(|e| e.to_string())?);

    let sequences = read_sequences(&matches.free)?;
    let mut executor = QueryExecutor::new(anno_graph, config);
    let output = io::stdout();
    let mut writer = BufWriter::new(output.lock());
    let mut failure: Option<io::Error> = None;
    executor
        .query_sequences(&sequences, |ordinal, labels| {
            if failure.is_none() {
                if let Err(e) = writeln!(writer, "{}\t{}", ordinal, labels.join(",")) {
                    failure = Some(e);
                }
            }
        })
        .map_err(|e| e.to_string())?;
    if let Some(e) = failure {
        return Err(e.to_string());
    }
    writer.flush().map_err(|e| e.to_string())
}

//-----------------------------------------------------------------------------

fn filter(program: &str, args: &[String]) -> Result<(), String> {
    let mut opts = Options::new();
    opts.optopt("k", "kmer-length", "k-mer length (default 31)", "INT");
    opts.optopt("m", "min-count", "minimum k-mer frequency (default 2)", "INT");
    opts.optflag("h", "help", "print this help");
    let matches = parse_options(program, "filter", "file1 [...]", &opts, args);

    let k = matches.opt_str("k").and_then(|value| value.parse::<usize>().ok()).unwrap_or(31);
    let min_count = matches.opt_str("m").and_then(|value| value.parse::<u32>().ok()).unwrap_or(2);

    let sequences = read_sequences(&matches.free)?;
    let mut counts = HashDbg::new(k, false).map_err(|e| e.to_string())?;
    for sequence in sequences.iter() {
        counts.add_sequence(sequence).map_err(|e| e.to_string())?;
    }

    // Keep the reads in which every k-mer reaches the threshold.
    let mut output = BufWriter::new(io::stdout());
    for sequence in sequences.iter() {
        let mut keep = sequence.len() >= k;
        counts.map_to_nodes(sequence, &mut |node| {
            keep &= node != NPOS && counts.count(node) >= min_count;
        });
        if keep {
            writeln!(output, "{}", sequence).map_err(|e| e.to_string())?;
        }
    }
    output.flush().map_err(|e| e.to_string())
}

//-----------------------------------------------------------------------------
