//! Push (receive-pack) requests and status reports.
//!
//! A push sends one ref-update command, a flush, a pack and a final flush:
//!
//! ```text
//! <old-oid> <new-oid> <refname>\0<capabilities>\n
//! 0000
//! PACK ...
//! 0000
//! ```

use std::io::{Read, Write};

use gitwire_hash::{HashAlgorithm, Hasher, ObjectId};
use gitwire_pack::{PackfileWriter, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};
use gitwire_ref::RefName;

use crate::pktline::{format_packets, Packet, PacketParser};
use crate::sideband::SideBandReader;
use crate::ProtocolError;

/// Capabilities requested on the update command.
pub fn push_capabilities() -> String {
    format!(
        "report-status-v2 side-band-64k quiet object-format=sha1 agent=gitwire/{}",
        env!("CARGO_PKG_VERSION")
    )
}

/// A single ref update: create, move or delete `ref_name`.
///
/// The zero id stands for "does not exist" on either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdateRequest {
    pub old_ref: ObjectId,
    pub new_ref: ObjectId,
    pub ref_name: RefName,
}

impl RefUpdateRequest {
    pub fn create(ref_name: RefName, new_ref: ObjectId) -> Self {
        Self::update(ref_name, ObjectId::ZERO, new_ref)
    }

    pub fn update(ref_name: RefName, old_ref: ObjectId, new_ref: ObjectId) -> Self {
        Self {
            old_ref,
            new_ref,
            ref_name,
        }
    }

    pub fn delete(ref_name: RefName, old_ref: ObjectId) -> Self {
        Self::update(ref_name, old_ref, ObjectId::ZERO)
    }

    /// Build a request from textual ids, each 40 hex digits (all zeros
    /// for a missing side).
    pub fn from_hex(ref_name: &str, old_ref: &str, new_ref: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            old_ref: ObjectId::from_hex(old_ref)?,
            new_ref: ObjectId::from_hex(new_ref)?,
            ref_name: RefName::new(ref_name)?,
        })
    }

    pub fn is_create(&self) -> bool {
        self.old_ref.is_zero()
    }

    pub fn is_delete(&self) -> bool {
        self.new_ref.is_zero()
    }

    /// The command payload, before pkt-line framing.
    pub fn command_line(&self) -> Vec<u8> {
        format!(
            "{} {} {}\0{}\n",
            self.old_ref,
            self.new_ref,
            self.ref_name,
            push_capabilities()
        )
        .into_bytes()
    }

    /// Encode the full request: command, flush, an empty pack and a
    /// closing flush.
    pub fn format(&self) -> Result<Vec<u8>, ProtocolError> {
        format_packets(&[
            Packet::Data(self.command_line()),
            Packet::Flush,
            Packet::PackData(empty_pack()?),
            Packet::Flush,
        ])
    }
}

/// A version 2 pack with no objects, checksum included.
pub fn empty_pack() -> Result<Vec<u8>, ProtocolError> {
    let mut pack = Vec::with_capacity(PACK_HEADER_SIZE + ObjectId::LEN);
    pack.extend_from_slice(PACK_SIGNATURE);
    pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
    pack.extend_from_slice(&0u32.to_be_bytes());
    let checksum = Hasher::digest(HashAlgorithm::Sha1, &pack)?;
    pack.extend_from_slice(checksum.as_bytes());
    Ok(pack)
}

/// Stream staged objects as a complete push request.
pub trait WritePackfile {
    /// Write the update of `ref_name` from `old_ref` to the most recently
    /// staged commit, followed by the pack. Returns the pack checksum.
    fn write_packfile<W: Write>(
        &mut self,
        sink: &mut W,
        ref_name: &RefName,
        old_ref: ObjectId,
    ) -> Result<ObjectId, ProtocolError>;
}

impl WritePackfile for PackfileWriter {
    fn write_packfile<W: Write>(
        &mut self,
        sink: &mut W,
        ref_name: &RefName,
        old_ref: ObjectId,
    ) -> Result<ObjectId, ProtocolError> {
        let commit = self.check_writable()?;
        let request = RefUpdateRequest::update(ref_name.clone(), old_ref, commit);
        let head = format_packets(&[
            Packet::Data(request.command_line()),
            Packet::Flush,
            // Placeholder for the pack the command list may carry inline.
            Packet::PackData(Vec::new()),
        ])?;
        sink.write_all(&head)?;

        let objects = self.object_count();
        let checksum = self.write_pack(sink)?;
        tracing::debug!(
            ref_name = %ref_name,
            old = %old_ref,
            new = %commit,
            objects,
            %checksum,
            "wrote push request"
        );
        Ok(checksum)
    }
}

/// Outcome of a push that the server accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStatus {
    pub unpack_ok: bool,
    /// Refs reported `ok`.
    pub updated: Vec<String>,
}

/// Parse a receive-pack status report.
///
/// Set `side_band` when `side-band-64k` was negotiated. A failed unpack, a
/// rejected ref, or a report with no `unpack ok` line is returned as an
/// error.
pub fn parse_report_status<R: Read>(reader: R, side_band: bool) -> Result<ReportStatus, ProtocolError> {
    let lines = if side_band {
        let demux = SideBandReader::new(PacketParser::new(reader));
        PacketParser::new(demux).read_until_flush()?
    } else {
        PacketParser::new(reader).read_until_flush()?
    };

    let mut status = ReportStatus::default();
    for line in &lines {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches('\n');
        if text == "unpack ok" {
            status.unpack_ok = true;
        } else if let Some(name) = text.strip_prefix("ok ") {
            status.updated.push(name.to_string());
        } else {
            tracing::trace!(line = text, "ignoring report-status line");
        }
    }
    if !status.unpack_ok {
        return Err(ProtocolError::invalid_line(
            "report-status",
            "missing `unpack ok`",
            lines.first().map_or(&[][..], Vec::as_slice),
        ));
    }
    tracing::debug!(refs = status.updated.len(), "push accepted");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "95d09f2b10159347eece71399a7e2e907ea3df4f";

    #[test]
    fn empty_pack_checksum() {
        let pack = empty_pack().unwrap();
        assert_eq!(pack.len(), 32);
        assert_eq!(
            ObjectId::from_bytes(&pack[12..]).unwrap().to_hex(),
            "029d08823bd8a8eab510ad6ac75c823cfd3ed31e"
        );
    }

    #[test]
    fn constructors() {
        let main = RefName::new("refs/heads/main").unwrap();
        let id = ObjectId::from_hex(OID).unwrap();
        assert!(RefUpdateRequest::create(main.clone(), id).is_create());
        assert!(RefUpdateRequest::delete(main, id).is_delete());
    }

    #[test]
    fn from_hex_validates() {
        let zero = "0".repeat(40);
        assert!(RefUpdateRequest::from_hex("refs/heads/main", &zero, OID).is_ok());
        assert!(matches!(
            RefUpdateRequest::from_hex("refs/heads/main", "abc", OID),
            Err(ProtocolError::Hash(_))
        ));
        assert!(matches!(
            RefUpdateRequest::from_hex("main", &zero, OID),
            Err(ProtocolError::Ref(_))
        ));
    }

    #[test]
    fn command_line_layout() {
        let req = RefUpdateRequest::from_hex("refs/heads/main", &"0".repeat(40), OID).unwrap();
        let line = String::from_utf8(req.command_line()).unwrap();
        let (command, caps) = line.split_once('\0').unwrap();
        assert_eq!(
            command,
            format!("{} {OID} refs/heads/main", "0".repeat(40))
        );
        assert!(caps.starts_with("report-status-v2 side-band-64k quiet object-format=sha1 agent="));
        assert!(caps.ends_with('\n'));
    }

    #[test]
    fn report_status_ok() {
        let bytes = format_packets(&[
            Packet::text("unpack ok"),
            Packet::text("ok refs/heads/main"),
            Packet::Flush,
        ])
        .unwrap();
        let status = parse_report_status(&bytes[..], false).unwrap();
        assert!(status.unpack_ok);
        assert_eq!(status.updated, vec!["refs/heads/main".to_string()]);
    }

    #[test]
    fn report_status_rejected() {
        let bytes = format_packets(&[
            Packet::text("unpack ok"),
            Packet::text("ng refs/heads/main non-fast-forward"),
            Packet::Flush,
        ])
        .unwrap();
        match parse_report_status(&bytes[..], false).unwrap_err() {
            ProtocolError::RefUpdateRejected(e) => {
                assert_eq!(e.ref_name, "refs/heads/main");
                assert_eq!(e.reason, "non-fast-forward");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn side_band(packets: &[(u8, &str)]) -> Vec<u8> {
        let mut framed: Vec<Packet> = packets
            .iter()
            .map(|(band, text)| {
                let mut data = vec![*band];
                data.extend_from_slice(text.as_bytes());
                Packet::Data(data)
            })
            .collect();
        framed.push(Packet::Flush);
        format_packets(&framed).unwrap()
    }

    #[test]
    fn report_status_over_side_band() {
        let inner = format_packets(&[
            Packet::text("unpack ok"),
            Packet::text("ok refs/heads/main"),
            Packet::Flush,
        ])
        .unwrap();
        let inner = String::from_utf8(inner).unwrap();
        let bytes = side_band(&[(2, "Resolving deltas: 100%\r"), (1, inner.as_str())]);
        let status = parse_report_status(&bytes[..], true).unwrap();
        assert_eq!(status.updated, vec!["refs/heads/main".to_string()]);
    }

    #[test]
    fn unpack_failure_on_error_band() {
        let bytes = side_band(&[(3, "error: unpack failed\n")]);
        match parse_report_status(&bytes[..], true).unwrap_err() {
            ProtocolError::Unpack(e) => assert_eq!(e.status, "unpack failed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fatal_progress_fails_report() {
        let bytes = side_band(&[(2, "fatal: the remote end hung up\n")]);
        match parse_report_status(&bytes[..], true).unwrap_err() {
            ProtocolError::Server(e) => {
                assert_eq!(e.kind, "fatal");
                assert_eq!(e.message, "the remote end hung up");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn report_without_unpack_line_fails() {
        let bytes = format_packets(&[Packet::text("ok refs/heads/main"), Packet::Flush]).unwrap();
        assert!(matches!(
            parse_report_status(&bytes[..], false),
            Err(ProtocolError::InvalidLine { context: "report-status", .. })
        ));

        let empty = format_packets(&[Packet::Flush]).unwrap();
        assert!(parse_report_status(&empty[..], false).is_err());
    }
}
