//! Git smart-protocol messages: pkt-line framing, side-band demultiplexing,
//! `ls-refs` and `fetch` response parsing, and ref-update requests for push.
//!
//! Nothing here opens a connection. Every parser pulls from a caller-supplied
//! [`std::io::Read`] and every encoder writes to a caller-supplied sink.

pub mod fetch;
pub mod ls_refs;
pub mod pktline;
pub mod push;
pub mod sideband;

use std::io;
use std::sync::Arc;

use bstr::BString;
use gitwire_hash::HashError;
use gitwire_pack::PackError;
use gitwire_ref::RefError;

pub use fetch::{parse_fetch_response, FetchResponse};
pub use ls_refs::{parse_ls_refs_response, AdvertisedRef};
pub use pktline::{format_packets, Packet, PacketParser};
pub use push::{parse_report_status, RefUpdateRequest, ReportStatus, WritePackfile};
pub use sideband::SideBandReader;

/// A remote `ERR`, `error:` or `fatal:` message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote {kind}: {message}")]
pub struct ServerError {
    /// The packet payload as received.
    pub line: BString,
    /// `ERR`, `error` or `fatal`.
    pub kind: String,
    pub message: String,
}

/// An `ng <ref> <reason>` line from a push report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote rejected {ref_name}: {reason}")]
pub struct RefUpdateRejected {
    pub line: BString,
    pub ref_name: String,
    pub reason: String,
}

/// The remote failed to unpack what was pushed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote unpack failed: {status}")]
pub struct UnpackError {
    pub line: BString,
    pub status: String,
}

/// Errors that can occur while encoding or parsing protocol messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {reason}")]
    InvalidPktLine { reason: String, raw: BString },

    #[error("pkt-line payload of {0} bytes exceeds the 65516-byte limit")]
    PacketTooLong(usize),

    #[error("stream ended inside {0}")]
    Truncated(&'static str),

    #[error("malformed {context} line: {reason}")]
    InvalidLine {
        context: &'static str,
        reason: String,
        line: BString,
    },

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    RefUpdateRejected(#[from] RefUpdateRejected),

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    #[error("remote fatal error: {message}")]
    RemoteFatal { message: String },

    #[error(transparent)]
    Pack(PackError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl ProtocolError {
    /// Recover a protocol error that travelled through an `io::Error`,
    /// as side-band failures do on their way through the pack reader.
    pub fn from_io(err: &io::Error) -> Option<&ProtocolError> {
        err.get_ref()?.downcast_ref::<ProtocolError>()
    }

    pub(crate) fn invalid_line(context: &'static str, reason: impl Into<String>, line: &[u8]) -> Self {
        Self::InvalidLine {
            context,
            reason: reason.into(),
            line: BString::from(line),
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        match Self::from_io(&err) {
            Some(inner) => inner.clone(),
            None => Self::Io(Arc::new(err)),
        }
    }
}

impl From<PackError> for ProtocolError {
    fn from(err: PackError) -> Self {
        if let PackError::Io(io_err) = &err {
            if let Some(inner) = Self::from_io(io_err) {
                return inner.clone();
            }
        }
        Self::Pack(err)
    }
}
