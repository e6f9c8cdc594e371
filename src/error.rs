//! Error types for index building and lookup.

use thiserror::Error;

/// Errors raised by the index core.
///
/// Read-path errors are recoverable: a search request records them as an
/// error string and finishes. `CompressError` on the build path is fatal to
/// the build; the partially written file must be discarded by the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A query was issued before `open_index`.
    #[error("index was not opened")]
    IndexNotOpened,

    /// Node compression failed while building the index.
    #[error("failed to compress index node")]
    CompressError,

    /// Node payload was rejected by the codec, or the decoded length did not
    /// match the stored uncompressed size, or an inner node's separator
    /// region held a non-terminated string.
    #[error("failed to decompress index node")]
    DecompressError,

    /// Leaf invariants were violated: an empty non-root leaf, a chain record
    /// overrunning its declared size, or a chain running past the leaf end.
    #[error("corrupted chain data in leaf node")]
    CorruptedChainData,

    /// A stored key or word is not valid UTF-8.
    #[error("cannot decode stored word as UTF-8")]
    CantDecode,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
