use crate::{HashError, ObjectId};

/// Hash algorithms a Git server may advertise through `object-format`.
///
/// Only SHA-1 is implemented. SHA-256 is named so negotiation code can
/// reject it with a typed error instead of a string match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Length of the raw digest in bytes.
    pub const fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Length of the lowercase hex form.
    pub const fn hex_len(&self) -> usize {
        self.digest_len() * 2
    }

    /// Name as it appears in the `object-format=` capability.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" | "sha-1" => Some(Self::Sha1),
            "sha256" | "sha-256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Fail unless this algorithm can actually be computed.
    pub fn ensure_supported(&self) -> Result<(), HashError> {
        match self {
            Self::Sha1 => Ok(()),
            Self::Sha256 => Err(HashError::UnsupportedAlgorithm(self.name())),
        }
    }

    /// The all-zero id for this algorithm.
    pub fn zero_oid(&self) -> Result<ObjectId, HashError> {
        self.ensure_supported()?;
        Ok(ObjectId::ZERO)
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
