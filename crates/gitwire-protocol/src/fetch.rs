//! `fetch` response parsing.
//!
//! A protocol v2 fetch response is a series of sections separated by
//! delimiter packets, each opened by a header line:
//!
//! ```text
//! acknowledgments   NAK | ACK <oid> | ready
//! shallow-info      shallow <oid> | unshallow <oid>
//! wanted-refs       <oid> <refname>
//! packfile          side-band framed pack data, always last
//! ```

use std::io::Read;

use bstr::ByteSlice;
use gitwire_hash::ObjectId;
use gitwire_pack::PackfileReader;
use gitwire_ref::RefName;

use crate::ls_refs::AdvertisedRef;
use crate::pktline::{classify_line, Packet, PacketParser};
use crate::sideband::SideBandReader;
use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Acknowledgments,
    ShallowInfo,
    WantedRefs,
    Unknown,
}

/// Everything a fetch response carried before its pack.
#[derive(Debug)]
pub struct FetchResponse<R: Read> {
    pub acks: Vec<ObjectId>,
    pub nak: bool,
    pub ready: bool,
    pub shallow: Vec<ObjectId>,
    pub unshallow: Vec<ObjectId>,
    pub wanted_refs: Vec<AdvertisedRef>,
    /// Reader over the pack, when the response has a `packfile` section.
    pub packfile: Option<PackfileReader<SideBandReader<R>>>,
}

impl<R: Read> FetchResponse<R> {
    fn empty() -> Self {
        Self {
            acks: Vec::new(),
            nak: false,
            ready: false,
            shallow: Vec::new(),
            unshallow: Vec::new(),
            wanted_refs: Vec::new(),
            packfile: None,
        }
    }
}

/// Parse a fetch response, stopping at the start of its pack.
///
/// The rest of the stream is handed to the returned
/// [`FetchResponse::packfile`] reader through a side-band demultiplexer.
pub fn parse_fetch_response<R: Read>(
    mut parser: PacketParser<R>,
) -> Result<FetchResponse<R>, ProtocolError> {
    let mut response = FetchResponse::empty();
    let mut section = None;

    loop {
        let line = match parser.read_packet()? {
            None | Some(Packet::Flush | Packet::ResponseEnd) => break,
            Some(Packet::Delimiter) => {
                section = None;
                continue;
            }
            Some(Packet::PackData(_)) => continue,
            Some(Packet::Data(line)) => line,
        };
        classify_line(&line)?;
        let text = line.strip_suffix(b"\n").unwrap_or(&line);
        if text.is_empty() {
            continue;
        }

        let Some(current) = section else {
            section = Some(match text {
                b"acknowledgments" | b"acknowledgements" => Section::Acknowledgments,
                b"shallow-info" => Section::ShallowInfo,
                b"wanted-refs" => Section::WantedRefs,
                b"packfile" => {
                    tracing::debug!(
                        acks = response.acks.len(),
                        ready = response.ready,
                        "fetch response reached packfile"
                    );
                    let demux = SideBandReader::new(parser);
                    response.packfile = Some(PackfileReader::new(demux));
                    return Ok(response);
                }
                other => {
                    tracing::debug!(section = %other.as_bstr(), "skipping unknown fetch section");
                    Section::Unknown
                }
            });
            continue;
        };

        match current {
            Section::Acknowledgments => {
                if text == b"NAK" {
                    response.nak = true;
                } else if text == b"ready" {
                    response.ready = true;
                } else if let Some(hex) = text.strip_prefix(b"ACK ") {
                    response.acks.push(parse_oid(hex, text)?);
                } else {
                    return Err(ProtocolError::invalid_line(
                        "acknowledgments",
                        "expected NAK, ACK or ready",
                        text,
                    ));
                }
            }
            Section::ShallowInfo => {
                if let Some(hex) = text.strip_prefix(b"shallow ") {
                    response.shallow.push(parse_oid(hex, text)?);
                } else if let Some(hex) = text.strip_prefix(b"unshallow ") {
                    response.unshallow.push(parse_oid(hex, text)?);
                } else {
                    return Err(ProtocolError::invalid_line(
                        "shallow-info",
                        "expected shallow or unshallow",
                        text,
                    ));
                }
            }
            Section::WantedRefs => {
                let (hex, name) = text.split_once_str(" ").ok_or_else(|| {
                    ProtocolError::invalid_line("wanted-refs", "missing ref name", text)
                })?;
                response.wanted_refs.push(AdvertisedRef {
                    name: RefName::from_bytes(name)?,
                    hash: parse_oid(hex, text)?,
                });
            }
            Section::Unknown => {}
        }
    }

    Ok(response)
}

fn parse_oid(hex: &[u8], line: &[u8]) -> Result<ObjectId, ProtocolError> {
    ObjectId::from_hex_bytes(hex).map_err(|e| ProtocolError::invalid_line("fetch", e.to_string(), line))
}
