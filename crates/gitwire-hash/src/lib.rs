//! Object identity for the gitwire pack-protocol codec.
//!
//! Provides the 20-byte [`ObjectId`], the all-zero sentinel used by
//! ref-update commands, hex encoding, and a streaming [`Hasher`] that
//! runs SHA-1 with collision detection.

mod algorithm;
mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use algorithm::HashAlgorithm;
pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
