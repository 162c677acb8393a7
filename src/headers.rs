//! File format headers.

use std::path::Path;

use simple_sds::serialize::{Serialize, Serializable};

//-----------------------------------------------------------------------------

/// Common functionality for file format headers.
///
/// This struct contains the following fields: `tag`, `version`, and `flags`.
/// The payload type contains the remaining fields.
///
/// # Examples
///
/// ```
/// use metadbg::headers::{Header, Payload};
/// use simple_sds::serialize::Serialize;
///
/// #[derive(Copy, Clone, Default, PartialEq, Eq)]
/// struct Example {
///     data: u64,
/// }
///
/// impl Example {
///     const FLAG: u64 = 0x1;
/// }
///
/// impl Payload for Example {
///     const NAME: &'static str = "Example";
///     const TAG: u32 = 1234567890;
///     const VERSION: u32 = 1;
///     const MIN_VERSION: u32 = 1;
///     const DEFAULT_FLAGS: u64 = 0;
///
///     fn update(&mut self) {}
///
///     fn mask(_: u32) -> u64 {
///         0x1
///     }
///
///     fn validate(_: &Header<Self>) -> Result<(), String> {
///         Ok(())
///     }
/// }
///
/// let mut header = Header::<Example>::default();
/// assert_eq!(header.size_in_elements(), 3);
/// header.set(Example::FLAG);
/// assert!(header.validate().is_ok());
/// assert!(header.is_set(Example::FLAG));
/// header.unset(Example::FLAG);
/// assert!(!header.is_set(Example::FLAG));
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header<T: Payload> {
    tag: u32,
    version: u32,
    payload: T,
    flags: u64,
}

impl<T: Payload> Header<T> {
    /// Creates a default header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the file format version in the header.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Updates the header to the latest version.
    pub fn update(&mut self) {
        self.version = T::VERSION;
        self.payload.update()
    }

    /// Returns `true` if the specified binary flag is set.
    #[inline]
    pub fn is_set(&self, flag: u64) -> bool {
        (self.flags & flag) != 0
    }

    /// Sets the specified binary flag.
    #[inline]
    pub fn set(&mut self, flag: u64) {
        self.flags |= flag;
    }

    /// Unsets the specified binary flag.
    #[inline]
    pub fn unset(&mut self, flag: u64) {
        self.flags &= !flag;
    }

    /// Validates the header and returns an error message if the header is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tag != T::TAG {
            return Err(format!("{}: Invalid tag {:X}", T::NAME, self.tag));
        }
        for v in T::MIN_VERSION..T::VERSION + 1 {
            if self.version == v {
                if (self.flags & T::mask(v)) == self.flags {
                    return T::validate(self);
                } else {
                    return Err(format!("{}: Invalid flags {:X} for version {}", T::NAME, self.flags, self.version));
                }
            }
        }
        Err(format!("{}: Invalid version {} (expected {} to {})", T::NAME, self.version, T::MIN_VERSION, T::VERSION))
    }

    /// Returns `true` if the given file starts with a header of this type.
    pub fn found_in<P: AsRef<Path>>(filename: P) -> bool {
        if let Ok(mut file) = std::fs::File::open(filename)
            && let Ok(header) = Self::load(&mut file) {
            return header.tag == T::TAG;
        }
        false
    }

    /// Returns a reference to the payload.
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Returns a mutable reference to the payload.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }
}

impl<T: Payload> Default for Header<T> {
    fn default() -> Self {
        Header {
            tag: T::TAG,
            version: T::VERSION,
            payload: T::default(),
            flags: T::DEFAULT_FLAGS,
        }
    }
}

impl<T: Payload> Serializable for Header<T> {}

//-----------------------------------------------------------------------------

/// Format-specific payload stored in a file format header.
///
/// The implementing type must be either empty or `#[repr(C)]`.
/// If not empty, the size must be a multiple of 8 bytes.
/// See [`Header`] for an example.
pub trait Payload: Copy + Eq + Default {
    /// User-friendly type name for the header.
    const NAME: &'static str;

    /// The first four bytes of the header as an unsigned little-endian integer.
    const TAG: u32;

    /// The latest supported version.
    const VERSION: u32;

    /// The earliest supported version.
    const MIN_VERSION: u32;

    /// Binary flags that should be set by default.
    const DEFAULT_FLAGS: u64;

    /// Updates the header to the latest version.
    fn update(&mut self);

    /// Returns the binary mask corresponding to valid flags in the specified version.
    fn mask(version: u32) -> u64;

    /// Performs type-specific validation and returns an error message if the header is invalid.
    fn validate(header: &Header<Self>) -> Result<(), String>;
}

//-----------------------------------------------------------------------------

/// Payload for the BOSS graph header.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct BossPayload {
    /// Node length.
    pub k: usize,

    /// Number of edges, including dummy edges.
    pub edges: usize,
}

impl BossPayload {
    /// The graph is in the static state.
    pub const FLAG_STATIC: u64    = 0x0001;

    /// The graph stores both strands of every k-mer.
    pub const FLAG_CANONICAL: u64 = 0x0002;
}

impl Payload for BossPayload {
    const NAME: &'static str = "BossHeader";
    // "BOSS" in little-endian byte order.
    const TAG: u32 = 0x53534F42;
    const VERSION: u32 = 1;
    const MIN_VERSION: u32 = 1;
    const DEFAULT_FLAGS: u64 = Self::FLAG_STATIC;

    fn update(&mut self) {}

    fn mask(_: u32) -> u64 {
        Self::FLAG_STATIC | Self::FLAG_CANONICAL
    }

    fn validate(header: &Header<Self>) -> Result<(), String> {
        if !header.is_set(Self::FLAG_STATIC) {
            return Err(format!("{}: Dynamic graphs cannot be serialized", Self::NAME));
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// Payload for a construction chunk header.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct ChunkPayload {
    /// Node length.
    pub k: usize,

    /// Number of edges in the chunk.
    pub edges: usize,
}

impl Payload for ChunkPayload {
    const NAME: &'static str = "ChunkHeader";
    // "BCHK" in little-endian byte order.
    const TAG: u32 = 0x4B484342;
    const VERSION: u32 = 1;
    const MIN_VERSION: u32 = 1;
    const DEFAULT_FLAGS: u64 = 0;

    fn update(&mut self) {}

    fn mask(_: u32) -> u64 {
        0
    }

    fn validate(_: &Header<Self>) -> Result<(), String> {
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// Payload for the annotation header.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct AnnotationPayload {
    /// Number of rows in the matrix.
    pub rows: usize,

    /// Number of columns in the matrix.
    pub columns: usize,
}

impl AnnotationPayload {
    /// The matrix is a multi-BRWT tree.
    pub const FLAG_BRWT: u64        = 0x0001;

    /// The matrix is a deduplicated row store.
    pub const FLAG_UNIQUE_ROWS: u64 = 0x0002;
}

impl Payload for AnnotationPayload {
    const NAME: &'static str = "AnnotationHeader";
    // "BANO" in little-endian byte order.
    const TAG: u32 = 0x4F4E4142;
    const VERSION: u32 = 1;
    const MIN_VERSION: u32 = 1;
    const DEFAULT_FLAGS: u64 = Self::FLAG_BRWT;

    fn update(&mut self) {}

    fn mask(_: u32) -> u64 {
        Self::FLAG_BRWT | Self::FLAG_UNIQUE_ROWS
    }

    fn validate(header: &Header<Self>) -> Result<(), String> {
        if header.is_set(Self::FLAG_BRWT) == header.is_set(Self::FLAG_UNIQUE_ROWS) {
            return Err(format!("{}: Exactly one matrix representation flag must be set", Self::NAME));
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use simple_sds::serialize;

    #[test]
    fn boss_header() {
        let header = Header::<BossPayload>::new();
        if let Err(msg) = header.validate() {
            panic!("{}", msg);
        }
        assert!(header.is_set(BossPayload::FLAG_STATIC), "Default: Static flag is not set");
        assert!(!header.is_set(BossPayload::FLAG_CANONICAL), "Default: Canonical flag is set");
        serialize::test(&header, "boss-header", Some(4), true);

        // We only have to test setting / unsetting flags for one payload type.
        let mut header = header;
        header.set(BossPayload::FLAG_CANONICAL);
        if let Err(msg) = header.validate() {
            panic!("{}", msg);
        }
        assert!(header.is_set(BossPayload::FLAG_CANONICAL), "Modified: Canonical flag could not be set");
        serialize::test(&header, "modified-boss-header", Some(4), true);

        header.unset(BossPayload::FLAG_CANONICAL);
        assert!(!header.is_set(BossPayload::FLAG_CANONICAL), "Modified: Canonical flag could not be unset");

        header.unset(BossPayload::FLAG_STATIC);
        assert!(header.validate().is_err(), "A dynamic header passed validation");
    }

    #[test]
    fn chunk_header() {
        let header = Header::<ChunkPayload>::new();
        if let Err(msg) = header.validate() {
            panic!("{}", msg);
        }
        serialize::test(&header, "chunk-header", Some(4), true);
    }

    #[test]
    fn annotation_header() {
        let header = Header::<AnnotationPayload>::new();
        if let Err(msg) = header.validate() {
            panic!("{}", msg);
        }
        assert!(header.is_set(AnnotationPayload::FLAG_BRWT), "Default: BRWT flag is not set");
        serialize::test(&header, "annotation-header", Some(4), true);

        let mut header = header;
        header.set(AnnotationPayload::FLAG_UNIQUE_ROWS);
        assert!(header.validate().is_err(), "A header with two representation flags passed validation");
    }

    #[test]
    fn found_in() {
        let header = Header::<BossPayload>::new();
        let name = "found-in";
        let filename = serialize::temp_file_name(name);
        serialize::serialize_to(&header, &filename).unwrap();
        assert!(Header::<BossPayload>::found_in(&filename), "The file does not start with a BOSS header");
        assert!(!Header::<AnnotationPayload>::found_in(&filename), "The file starts with an annotation header");
        fs::remove_file(&filename).unwrap();
        assert!(!Header::<BossPayload>::found_in(&filename), "Deleted file starts with a BOSS header");
    }
}

//-----------------------------------------------------------------------------
