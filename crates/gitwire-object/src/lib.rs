//! Object model for the gitwire pack-protocol codec.
//!
//! Covers the closed set of pack entry types, Git's object id derivation,
//! author/committer identities, and the tree and commit content formats
//! that the pack reader parses eagerly and the writer produces.

mod commit;
mod identity;
mod tree;

pub use commit::PackfileCommit;
pub use identity::Identity;
pub use tree::{parse_tree, serialize_tree, sort_tree_entries, FileMode, PackfileTreeEntry};

use bstr::BString;
use gitwire_hash::{HashAlgorithm, HashError, Hasher, ObjectId};

/// Errors produced while decoding or hashing object content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object type: {0}")]
    InvalidType(BString),

    #[error("object type {0} has no object id")]
    UnhashableType(ObjectType),

    #[error("invalid tree entry at offset {offset}: {reason}")]
    InvalidTreeEntry { offset: usize, reason: String },

    #[error("invalid commit: missing '{field}' header")]
    MissingCommitField { field: &'static str },

    #[error("invalid commit header: {0}")]
    InvalidCommitHeader(String),

    #[error("invalid file mode: {0}")]
    InvalidFileMode(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Pack entry types, keyed by the 3-bit value in an entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Invalid,
    Commit,
    Tree,
    Blob,
    Tag,
    Reserved,
    OfsDelta,
    RefDelta,
}

impl ObjectType {
    /// Decode the 3-bit type field. Higher bits are ignored.
    pub const fn from_wire(bits: u8) -> Self {
        match bits & 0x07 {
            1 => Self::Commit,
            2 => Self::Tree,
            3 => Self::Blob,
            4 => Self::Tag,
            5 => Self::Reserved,
            6 => Self::OfsDelta,
            7 => Self::RefDelta,
            _ => Self::Invalid,
        }
    }

    pub const fn wire_value(&self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
            Self::Reserved => 5,
            Self::OfsDelta => 6,
            Self::RefDelta => 7,
        }
    }

    /// Name used in object headers and diagnostics.
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Invalid => b"invalid",
            Self::Commit => b"commit",
            Self::Tree => b"tree",
            Self::Blob => b"blob",
            Self::Tag => b"tag",
            Self::Reserved => b"reserved",
            Self::OfsDelta => b"ofs-delta",
            Self::RefDelta => b"ref-delta",
        }
    }

    /// Parse one of the four base object type names.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"commit" => Ok(Self::Commit),
            b"tree" => Ok(Self::Tree),
            b"blob" => Ok(Self::Blob),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidType(BString::from(s))),
        }
    }

    /// Commit, tree, blob and tag: the types that carry an object id.
    pub const fn is_base(&self) -> bool {
        matches!(self, Self::Commit | Self::Tree | Self::Blob | Self::Tag)
    }

    pub const fn is_delta(&self) -> bool {
        matches!(self, Self::OfsDelta | Self::RefDelta)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // as_bytes is always ASCII
        f.write_str(std::str::from_utf8(self.as_bytes()).unwrap_or("invalid"))
    }
}

impl std::str::FromStr for ObjectType {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// Compute the Git object id of `data` stored as `obj_type`.
///
/// Hashes `"<type> <len>\0"` followed by the content. Delta, invalid and
/// reserved types are rejected.
pub fn compute_object_id(
    algo: HashAlgorithm,
    obj_type: ObjectType,
    data: &[u8],
) -> Result<ObjectId, ObjectError> {
    if !obj_type.is_base() {
        return Err(ObjectError::UnhashableType(obj_type));
    }
    Ok(Hasher::hash_object(algo, obj_type.as_bytes(), data)?)
}
