//! Fetch responses carrying a real pack over side-band.

use gitwire_hash::HashAlgorithm;
use gitwire_object::{FileMode, Identity, ObjectType, PackfileTreeEntry};
use gitwire_pack::{PackError, PackfileWriter, StorageMode};
use gitwire_protocol::pktline::{format_packets, Packet, PacketParser};
use gitwire_protocol::{parse_fetch_response, parse_ls_refs_response, ProtocolError};

fn sample_pack() -> Vec<u8> {
    let who = Identity::new("Fetch Test", "fetch@example.com", 1_700_000_000, "+0100");
    let mut writer = PackfileWriter::new(HashAlgorithm::Sha1, StorageMode::Memory).unwrap();
    let blob = writer.add_blob(b"fetched content\n").unwrap();
    let tree = writer
        .add_tree(&[PackfileTreeEntry::new(FileMode::Regular, "a.txt", blob)])
        .unwrap();
    writer.add_commit(tree, None, &who, &who, "fetched\n").unwrap();
    let mut pack = Vec::new();
    writer.write_pack(&mut pack).unwrap();
    pack
}

/// Frame `pack` as band 1 packets of at most `chunk` bytes, with progress
/// messages interleaved.
fn side_band(pack: &[u8], chunk: usize) -> Vec<Packet> {
    let mut packets = Vec::new();
    for (i, piece) in pack.chunks(chunk).enumerate() {
        if i % 2 == 0 {
            packets.push(Packet::Data(format!("\x02Receiving objects: {i}\r").into_bytes()));
        }
        let mut data = vec![1u8];
        data.extend_from_slice(piece);
        packets.push(Packet::Data(data));
    }
    packets
}

#[test]
fn packfile_section_streams_objects() {
    let pack = sample_pack();
    let mut packets = vec![
        Packet::text("acknowledgments"),
        Packet::text("ready"),
        Packet::Delimiter,
        Packet::text("packfile"),
    ];
    packets.extend(side_band(&pack, 7));
    packets.push(Packet::Flush);
    let bytes = format_packets(&packets).unwrap();

    let response = parse_fetch_response(PacketParser::new(&bytes[..])).unwrap();
    assert!(response.ready);
    let (objects, trailer) = response.packfile.unwrap().read_all().unwrap();
    assert!(trailer.checksum.is_some());

    let mut types: Vec<ObjectType> = objects.iter().map(|o| o.object_type).collect();
    types.sort_by_key(|t| t.wire_value());
    assert_eq!(types, [ObjectType::Commit, ObjectType::Tree, ObjectType::Blob]);
    let commit = objects.iter().find_map(|o| o.commit.as_ref()).unwrap();
    assert_eq!(commit.message, "fetched\n");
}

#[test]
fn fatal_band_inside_pack_surfaces_as_remote_fatal() {
    let pack = sample_pack();
    let mut packets = vec![Packet::text("packfile")];
    let mut first = vec![1u8];
    first.extend_from_slice(&pack[..20]);
    packets.push(Packet::Data(first));
    packets.push(Packet::Data(b"\x03upload-pack: aborting due to possible repository corruption\n".to_vec()));
    let bytes = format_packets(&packets).unwrap();

    let mut reader = parse_fetch_response(PacketParser::new(&bytes[..]))
        .unwrap()
        .packfile
        .unwrap();
    let err = loop {
        match reader.read_entry() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("pack ended without error"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, PackError::Io(_)));
    match ProtocolError::from(err) {
        ProtocolError::RemoteFatal { message } => {
            assert!(message.starts_with("upload-pack: aborting"))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn ls_refs_response() {
    let oid = "95d09f2b10159347eece71399a7e2e907ea3df4f";
    let bytes = format_packets(&[
        Packet::text(&format!("{oid} HEAD symref-target:refs/heads/main")),
        Packet::text(&format!("{oid} refs/heads/main")),
        Packet::text(&format!("{oid} refs/tags/v1.0 peeled:{oid}")),
        Packet::Flush,
    ])
    .unwrap();

    let refs = parse_ls_refs_response(&mut PacketParser::new(&bytes[..])).unwrap();
    let names: Vec<&str> = refs.iter().map(|r| r.name.full_name()).collect();
    assert_eq!(names, ["refs/heads/main", "refs/heads/main", "refs/tags/v1.0"]);
    assert_eq!(refs[2].name.category(), "tags");
    assert_eq!(refs[2].name.location(), "v1.0");
}
