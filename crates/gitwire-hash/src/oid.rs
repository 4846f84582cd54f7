use std::fmt;
use std::str::FromStr;

use crate::hex::{decode_into, to_hex_string};
use crate::HashError;

/// A SHA-1 object identifier.
///
/// The all-zero value is the wire sentinel for "no object": an absent ref
/// on create, or the target of a delete.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// Raw digest length.
    pub const LEN: usize = 20;
    /// Hex digest length.
    pub const HEX_LEN: usize = 40;
    /// The zero sentinel, forty `'0'` characters in hex.
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn from_array(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an id from a raw 20-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| HashError::InvalidHashLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a 40-character hex id. Upper-case digits are accepted.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        Self::from_hex_bytes(hex.as_bytes())
    }

    pub fn from_hex_bytes(hex: &[u8]) -> Result<Self, HashError> {
        let mut bytes = [0u8; 20];
        decode_into(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn to_hex(&self) -> String {
        to_hex_string(&self.0)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
