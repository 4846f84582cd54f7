//! Pkt-line protocol framing.
//!
//! Each packet is prefixed with a 4-hex-digit length that counts the 4
//! bytes of the length field itself. Special packets:
//! - `0000`: flush packet (end of section)
//! - `0001`: delimiter packet (v2 section separator)
//! - `0002`: response-end packet (v2 stateless end of response)
//! - `0004`: empty data packet
//!
//! Data lines are checked for remote error reports before they are handed
//! to callers; see [`classify_line`].

use std::io::{self, Read, Write};

use bstr::{BString, ByteSlice};

use crate::{ProtocolError, RefUpdateRejected, ServerError, UnpackError};

/// Maximum data per packet (65520 - 4 = 65516).
pub const MAX_PKT_DATA_LEN: usize = 65516;

/// Maximum packet length including the 4-byte header.
pub const MAX_PKT_LEN: usize = 65520;

pub const FLUSH_PKT: &[u8; 4] = b"0000";
pub const DELIMITER_PKT: &[u8; 4] = b"0001";
pub const RESPONSE_END_PKT: &[u8; 4] = b"0002";

/// One unit of the wire stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Length-prefixed data line.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
    /// Delimiter packet (0001).
    Delimiter,
    /// Response-end packet (0002).
    ResponseEnd,
    /// Raw bytes written without framing, such as a pack following the
    /// command list of a push. Empty pack data writes nothing.
    PackData(Vec<u8>),
}

impl Packet {
    /// A data line carrying `text` with a trailing newline.
    pub fn text(text: &str) -> Self {
        let mut data = Vec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        if !text.ends_with('\n') {
            data.push(b'\n');
        }
        Self::Data(data)
    }

    /// Number of bytes [`encode`](Packet::encode) produces.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Data(data) => data.len() + 4,
            Self::Flush | Self::Delimiter | Self::ResponseEnd => 4,
            Self::PackData(data) => data.len(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        match self {
            Self::Data(data) => {
                if data.len() > MAX_PKT_DATA_LEN {
                    return Err(ProtocolError::PacketTooLong(data.len()));
                }
                write!(writer, "{:04x}", data.len() + 4)?;
                writer.write_all(data)?;
            }
            Self::Flush => writer.write_all(FLUSH_PKT)?,
            Self::Delimiter => writer.write_all(DELIMITER_PKT)?,
            Self::ResponseEnd => writer.write_all(RESPONSE_END_PKT)?,
            Self::PackData(data) => writer.write_all(data)?,
        }
        Ok(())
    }
}

/// Encode a sequence of packets back to back.
pub fn format_packets(packets: &[Packet]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(packets.iter().map(Packet::encoded_len).sum());
    for packet in packets {
        packet.write_to(&mut out)?;
    }
    Ok(out)
}

/// Pulls packets off a byte stream.
#[derive(Debug)]
pub struct PacketParser<R> {
    reader: R,
}

impl<R: Read> PacketParser<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Get a mutable reference to the inner reader.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the parser and return the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read one packet without interpreting it.
    ///
    /// Returns `None` when the stream ends cleanly on a packet boundary.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let mut header = [0u8; 4];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(None),
            4 => {}
            _ => return Err(ProtocolError::Truncated("pkt-line length")),
        }

        let len = parse_length(&header)?;
        match len {
            0 => Ok(Some(Packet::Flush)),
            1 => Ok(Some(Packet::Delimiter)),
            2 => Ok(Some(Packet::ResponseEnd)),
            3 => Err(ProtocolError::InvalidPktLine {
                reason: "length 3 is reserved".into(),
                raw: BString::from(&header[..]),
            }),
            _ if len > MAX_PKT_LEN => Err(ProtocolError::PacketTooLong(len - 4)),
            _ => {
                let mut data = vec![0u8; len - 4];
                if read_full(&mut self.reader, &mut data)? != data.len() {
                    return Err(ProtocolError::Truncated("pkt-line data"));
                }
                Ok(Some(Packet::Data(data)))
            }
        }
    }

    /// Read the next non-empty data line.
    ///
    /// Flush and delimiter packets are skipped, and a response-end packet
    /// ends the stream like end of input does. Lines that report a remote
    /// failure are returned as errors.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            match self.read_packet()? {
                None | Some(Packet::ResponseEnd) => return Ok(None),
                Some(Packet::Flush | Packet::Delimiter) => continue,
                Some(Packet::Data(data)) if data.is_empty() => continue,
                Some(Packet::Data(data)) => {
                    classify_line(&data)?;
                    return Ok(Some(data));
                }
                // Never produced by read_packet.
                Some(Packet::PackData(_)) => continue,
            }
        }
    }

    /// Read data lines up to the next flush, response-end or end of input.
    pub fn read_until_flush(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut lines = Vec::new();
        loop {
            match self.read_packet()? {
                None | Some(Packet::Flush | Packet::ResponseEnd) => return Ok(lines),
                Some(Packet::Delimiter | Packet::PackData(_)) => {}
                Some(Packet::Data(data)) => {
                    classify_line(&data)?;
                    if !data.is_empty() {
                        lines.push(data);
                    }
                }
            }
        }
    }
}

/// Like `read_exact`, but reports how much was read when the stream ends.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn parse_length(header: &[u8; 4]) -> Result<usize, ProtocolError> {
    let invalid = || ProtocolError::InvalidPktLine {
        reason: format!("invalid length {:?}", header.as_bstr()),
        raw: BString::from(&header[..]),
    };
    let text = std::str::from_utf8(header).map_err(|_| invalid())?;
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    usize::from_str_radix(text, 16).map_err(|_| invalid())
}

/// Turn a data line that reports a remote failure into the matching error.
///
/// Recognised forms:
/// - `ERR <message>`
/// - `error: <message>` / `fatal: <message>`, optionally after a side-band byte
/// - `ng <ref> <reason>`
/// - `unpack <status>` for any status other than `ok`
///
/// `error:`/`fatal:` messages that mention unpacking become [`UnpackError`].
pub fn classify_line(line: &[u8]) -> Result<(), ProtocolError> {
    if let Some(message) = line.strip_prefix(b"ERR ") {
        return Err(ServerError {
            line: line.into(),
            kind: "ERR".into(),
            message: trimmed(message),
        }
        .into());
    }

    let body = match line.first() {
        Some(1..=3) => &line[1..],
        _ => line,
    };
    for (prefix, kind) in [(&b"error:"[..], "error"), (&b"fatal:"[..], "fatal")] {
        if let Some(message) = body.strip_prefix(prefix) {
            let message = trimmed(message);
            if message.contains("unpack") {
                return Err(UnpackError {
                    line: line.into(),
                    status: message,
                }
                .into());
            }
            return Err(ServerError {
                line: line.into(),
                kind: kind.into(),
                message,
            }
            .into());
        }
    }

    if let Some(rest) = line.strip_prefix(b"ng ") {
        let rest = trimmed(rest);
        let (ref_name, reason) = rest.split_once(' ').unwrap_or((rest.as_str(), ""));
        return Err(RefUpdateRejected {
            line: line.into(),
            ref_name: ref_name.to_string(),
            reason: reason.to_string(),
        }
        .into());
    }

    if let Some(status) = line.strip_prefix(b"unpack ") {
        let status = trimmed(status);
        if status != "ok" {
            return Err(UnpackError {
                line: line.into(),
                status,
            }
            .into());
        }
    }

    Ok(())
}

fn trimmed(bytes: &[u8]) -> String {
    bytes.trim().to_str_lossy().into_owned()
}
