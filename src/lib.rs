//! # MetaDBG: succinct de Bruijn graphs with compressed annotations
//!
//! This crate implements a BOSS-style succinct de Bruijn graph over the DNA
//! alphabet, a chunked parallel construction pipeline, merge and transform
//! operations, a hierarchically clustered binary annotation matrix
//! (multi-BRWT), and a batched query engine that answers label queries
//! against a compact replica of the persistent graph.
//!
//! The succinct building blocks come from the
//! [Simple-SDS](https://github.com/jltsiren/simple-sds) library.
//!
//! # References
//!
//! ### BOSS
//!
//! Alexander Bowe, Taku Onodera, Kunihiko Sadakane, and Tetsuo Shibuya:
//! **Succinct de Bruijn graphs**.\
//! WABI 2012. DOI: [10.1007/978-3-642-33122-0_18](https://doi.org/10.1007/978-3-642-33122-0_18)
//!
//! ### Multi-BRWT
//!
//! Mikhail Karasikov, Harun Mustafa, Amir Joudaki, Sara Javadzadeh-No,
//! Gunnar Rätsch, and André Kahles:
//! **Sparse binary relation representations for genome graph annotation**.\
//! Journal of Computational Biology 27(4), 2020.
//! DOI: [10.1089/cmb.2019.0324](https://doi.org/10.1089/cmb.2019.0324)
//!
//! # Notes
//!
//! * See [Simple-SDS](https://github.com/jltsiren/simple-sds) for assumptions
//!   on the environment.
//! * Sequence input is a stream of DNA strings; file format parsing is left
//!   to the caller.

pub mod annotation;
pub mod boss;
pub mod construct;
pub mod dynamic;
pub mod graph;
pub mod headers;
pub mod merge;
pub mod pool;
pub mod query;
pub mod support;
pub mod wavelet;

// Shared internal code for the binaries.
#[cfg(feature = "binaries")]
#[doc(hidden)]
pub mod internal;

//-----------------------------------------------------------------------------

pub use crate::boss::{Boss, DynBoss};
pub use crate::annotation::{Annotation, Brwt, LabelEncoder};
pub use crate::graph::{DeBruijnGraph, HashDbg, MaskedDbg, CanonicalDbg, SuccinctDbg};
pub use crate::query::AnnotatedDbg;

use std::fmt;
use std::io;

//-----------------------------------------------------------------------------

/// Size of the extended DNA alphabet `$ A C G T`.
pub const SIGMA: usize = 5;

/// Number of symbols in the edge array alphabet. Values in `SIGMA..W_SIGMA`
/// mark edges whose target node has an earlier incoming edge with the same
/// symbol.
pub const W_SIGMA: usize = 2 * SIGMA;

/// Edge index `0` is used for technical purposes and does not exist in the
/// graph.
pub const NPOS: usize = 0;

/// The largest supported node length. A `(k+1)`-mer must fit into a `u128`
/// with three bits per symbol.
pub const MAX_K: usize = 40;

/// Key of the source tag.
pub const SOURCE_KEY: &str = "source";

/// Value of the source tag.
pub const SOURCE_VALUE: &str = "metadbg";

//-----------------------------------------------------------------------------

/// Crate-wide error type.
///
/// Input errors are recoverable at file granularity; consistency and
/// capacity errors are surfaced to the caller. Out-of-range accesses are
/// programmer errors and panic instead of being reported here.
#[derive(Debug)]
pub enum Error {
    /// A sequence contains a symbol outside the DNA alphabet.
    InvalidSequence(String),
    /// An input file is missing, unreadable, or malformed.
    InvalidInput(String),
    /// Node lengths of the operands do not match.
    KMismatch(usize, usize),
    /// The requested node length is not supported.
    UnsupportedK(usize),
    /// The wrapped graph does not support the requested view.
    NotCanonical,
    /// A query batch produced too many unique annotation rows.
    BatchTooLarge(usize),
    /// An I/O error from the underlying system.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSequence(s) => write!(f, "Invalid symbol in sequence: {}", s),
            Error::InvalidInput(s) => write!(f, "Invalid input: {}", s),
            Error::KMismatch(a, b) => write!(f, "Node length mismatch: {} vs {}", a, b),
            Error::UnsupportedK(k) => write!(f, "Unsupported node length {} (must be 2 to {})", k, MAX_K),
            Error::NotCanonical => write!(f, "The underlying graph was not built in canonical mode"),
            Error::BatchTooLarge(n) => write!(f, "{} unique annotation rows do not fit into 32 bits; reduce the batch size", n),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

//-----------------------------------------------------------------------------
