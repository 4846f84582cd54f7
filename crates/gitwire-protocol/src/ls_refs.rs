//! `ls-refs` response parsing.
//!
//! Each line is `<oid> <refname>`, optionally followed by v2 attributes
//! (`symref-target:<ref>`, `peeled:<oid>`) or, in v0 advertisements, by
//! `\0` and a capability list.

use std::io::Read;

use bstr::ByteSlice;
use gitwire_hash::ObjectId;
use gitwire_ref::RefName;

use crate::pktline::{classify_line, Packet, PacketParser};
use crate::ProtocolError;

/// One reference reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub name: RefName,
    pub hash: ObjectId,
}

/// Read an `ls-refs` response up to its flush packet.
///
/// Capability lines (leading `=`), peeled `^{}` entries and the
/// `capabilities^{}` placeholder are skipped. A `HEAD` line naming its
/// symbolic target is reported under the target's name.
pub fn parse_ls_refs_response<R: Read>(
    parser: &mut PacketParser<R>,
) -> Result<Vec<AdvertisedRef>, ProtocolError> {
    let mut refs = Vec::new();
    loop {
        let line = match parser.read_packet()? {
            None | Some(Packet::Flush | Packet::ResponseEnd) => break,
            Some(Packet::Delimiter | Packet::PackData(_)) => continue,
            Some(Packet::Data(line)) => line,
        };
        if line.is_empty() {
            continue;
        }
        classify_line(&line)?;
        if let Some(advertised) = parse_ref_line(&line)? {
            refs.push(advertised);
        }
    }
    tracing::debug!(refs = refs.len(), "parsed ls-refs response");
    Ok(refs)
}

/// Parse one advertisement line. Returns `None` for lines that carry no ref.
pub fn parse_ref_line(line: &[u8]) -> Result<Option<AdvertisedRef>, ProtocolError> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    if line.first() == Some(&b'=') {
        return Ok(None);
    }

    let (main, capabilities) = match line.find_byte(0) {
        Some(nul) => (&line[..nul], Some(&line[nul + 1..])),
        None => (line, None),
    };
    let mut fields = main.split_str(" ");
    let hex = fields.next().unwrap_or_default();
    let name = fields
        .next()
        .ok_or_else(|| ProtocolError::invalid_line("ls-refs", "missing ref name", line))?;

    if name == b"capabilities^{}" || name.ends_with(b"^{}") {
        return Ok(None);
    }
    let hash = ObjectId::from_hex_bytes(hex)
        .map_err(|e| ProtocolError::invalid_line("ls-refs", e.to_string(), line))?;

    let mut target = None;
    if name == b"HEAD" {
        target = fields.find_map(|attr| attr.strip_prefix(b"symref-target:"));
        if target.is_none() {
            target = capabilities.and_then(|caps| {
                caps.split_str(" ")
                    .find_map(|cap| cap.strip_prefix(b"symref=HEAD:"))
            });
        }
    }

    let name = RefName::from_bytes(target.unwrap_or(name))?;
    Ok(Some(AdvertisedRef { name, hash }))
}
