//! Side-band demultiplexing.
//!
//! While a pack is streamed, the server multiplexes data, progress and
//! error messages over side-band channels, one pkt-line per message:
//! - Band 1: pack data
//! - Band 2: progress messages
//! - Band 3: fatal error messages
//!
//! [`SideBandReader`] exposes band 1 as a plain byte stream so a pack
//! reader can sit directly on top of it. Band 2 and 3 payloads go through
//! [`classify_line`] with their band byte, so `error:`/`fatal:` text keeps
//! its structured form.

use std::io::{self, BufRead, Read};

use bstr::{BString, ByteSlice};

use crate::pktline::{classify_line, Packet, PacketParser};
use crate::ProtocolError;

/// Side-band channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Data = 1,
    Progress = 2,
    Error = 3,
}

impl Band {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Data),
            2 => Some(Self::Progress),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Reads band 1 out of a side-band pkt-line stream.
///
/// The stream ends at a flush or response-end packet, or at end of input.
/// A band 3 message fails the read with an `io::Error` wrapping the
/// classified error, or [`ProtocolError::RemoteFatal`] for unprefixed text.
/// On band 2 only `fatal:` and unpack failures end the stream; other text,
/// `error:` lines from hooks included, is logged.
#[derive(Debug)]
pub struct SideBandReader<R> {
    parser: PacketParser<R>,
    /// Current band 1 payload, band byte included.
    buf: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R: Read> SideBandReader<R> {
    pub fn new(parser: PacketParser<R>) -> Self {
        Self {
            parser,
            buf: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    /// Get the underlying pkt-line parser.
    pub fn into_inner(self) -> PacketParser<R> {
        self.parser
    }

    /// Pull packets until one carries pack data or the stream ends.
    fn fill(&mut self) -> Result<(), ProtocolError> {
        while !self.done {
            let data = match self.parser.read_packet()? {
                None | Some(Packet::Flush | Packet::ResponseEnd) => {
                    self.done = true;
                    break;
                }
                Some(Packet::Delimiter | Packet::PackData(_)) => continue,
                Some(Packet::Data(data)) => data,
            };
            let Some(&band) = data.first() else { continue };

            match Band::from_byte(band) {
                Some(Band::Data) => {
                    self.buf = data;
                    self.pos = 1;
                    return Ok(());
                }
                Some(Band::Progress) => {
                    if let Some(err) = progress_failure(&data) {
                        self.done = true;
                        tracing::warn!(error = %err, "remote aborted in progress channel");
                        return Err(err);
                    }
                    let message = data[1..].trim_end();
                    tracing::debug!(message = %message.as_bstr(), "remote progress");
                }
                Some(Band::Error) => {
                    self.done = true;
                    if let Err(err) = classify_line(&data) {
                        tracing::warn!(error = %err, "remote reported an error");
                        return Err(err);
                    }
                    let message = data[1..].trim().to_str_lossy().into_owned();
                    tracing::warn!(%message, "remote reported a fatal error");
                    return Err(ProtocolError::RemoteFatal { message });
                }
                None => {
                    self.done = true;
                    return Err(ProtocolError::InvalidPktLine {
                        reason: format!("unknown side-band channel {band}"),
                        raw: BString::from(data),
                    });
                }
            }
        }
        self.buf.clear();
        self.pos = 0;
        Ok(())
    }
}

/// Progress text that reports the remote giving up.
fn progress_failure(data: &[u8]) -> Option<ProtocolError> {
    match classify_line(data) {
        Err(err @ ProtocolError::Unpack(_)) => Some(err),
        Err(ProtocolError::Server(err)) if err.kind == "fatal" => Some(err.into()),
        _ => None,
    }
}

impl<R: Read> BufRead for SideBandReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            self.fill().map_err(io::Error::other)?;
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}

impl<R: Read> Read for SideBandReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}
