//! Packfile codec for the gitwire pack-protocol layer.
//!
//! [`reader::PackfileReader`] pulls objects one at a time off any buffered
//! byte stream, inflating and hashing each and capturing ref-deltas for
//! later resolution. [`writer::PackfileWriter`] stages objects in memory or
//! a temporary file and streams them back out as a checksummed pack. The
//! [`delta`] module decodes, applies and computes delta instruction streams.

pub mod delta;
pub mod entry;
pub mod inflate;
mod object;
pub mod reader;
pub mod writer;

pub use object::{build_tree_object, PackfileObject};
pub use reader::{PackfileEntry, PackfileReader, PackfileTrailer};
pub use writer::{PackfileWriter, StorageMode, WriterOptions};

use std::sync::Arc;

use gitwire_hash::{HashError, ObjectId};
use gitwire_object::{ObjectError, ObjectType};

/// Errors that can occur while reading, writing or resolving packs.
///
/// Cloneable so a failed reader can hand the same error to every caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack signature: {0:02x?}")]
    InvalidSignature([u8; 4]),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported object type in pack: {0}")]
    UnsupportedObjectType(ObjectType),

    #[error("corrupt pack entry {index}: {reason}")]
    CorruptEntry { index: u32, reason: String },

    #[error("object size mismatch: header says {expected} bytes, inflated to {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("pack stream truncated while reading {0}")]
    Truncated(&'static str),

    #[error("zlib error: {0}")]
    Decompress(String),

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta expects a {expected}-byte base, got {actual} bytes")]
    DeltaSourceSize { expected: usize, actual: usize },

    #[error("delta copy of {length} bytes at offset {offset} exceeds {base_len}-byte base")]
    DeltaCopyOutOfBounds {
        offset: usize,
        length: usize,
        base_len: usize,
    },

    #[error("delta copy with zero length")]
    ZeroLengthCopy,

    #[error("object is not a delta")]
    NotADelta,

    #[error("delta base mismatch: delta wants {expected}, got {actual}")]
    BaseMismatch { expected: ObjectId, actual: ObjectId },

    #[error("pack checksum mismatch: stream says {expected}, computed {actual}")]
    ChecksumMismatch { expected: ObjectId, actual: ObjectId },

    #[error("object hash mismatch: declared {declared}, computed {computed}")]
    HashMismatch {
        declared: ObjectId,
        computed: ObjectId,
    },

    #[error("packfile writer already cleaned up")]
    WriterCleanedUp,

    #[error("no commit staged; a pack for a ref update needs one")]
    NoCommit,

    #[error("no objects staged")]
    NoObjects,

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

impl From<std::io::Error> for PackError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;
