use std::io::{BufReader, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use gitwire_hash::{HashAlgorithm, Hasher, ObjectId};
use gitwire_object::{FileMode, Identity, ObjectType, PackfileTreeEntry};
use gitwire_pack::delta::compute::compute_delta;
use gitwire_pack::entry::encode_entry_header;
use gitwire_pack::{PackError, PackfileEntry, PackfileObject, PackfileReader, PackfileWriter, StorageMode};

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A pack holding a blob and a ref-delta against it.
fn delta_pack(base: &[u8], target: &[u8]) -> (Vec<u8>, ObjectId) {
    let base_id = Hasher::hash_object(HashAlgorithm::Sha1, b"blob", base).unwrap();
    let raw = compute_delta(base, target);

    let mut pack = Vec::new();
    pack.extend_from_slice(b"PACK");
    pack.extend_from_slice(&2u32.to_be_bytes());
    pack.extend_from_slice(&2u32.to_be_bytes());
    pack.extend_from_slice(&encode_entry_header(ObjectType::Blob, base.len() as u64));
    pack.extend_from_slice(&deflate(base));
    pack.extend_from_slice(&encode_entry_header(ObjectType::RefDelta, raw.len() as u64));
    pack.extend_from_slice(base_id.as_bytes());
    pack.extend_from_slice(&deflate(&raw));
    let sum = Hasher::digest(HashAlgorithm::Sha1, &pack).unwrap();
    pack.extend_from_slice(sum.as_bytes());
    (pack, base_id)
}

fn find(objects: &[PackfileObject], id: ObjectId) -> &PackfileObject {
    objects.iter().find(|o| o.hash == id).unwrap()
}

#[test]
fn ref_delta_is_captured_and_resolves() {
    let base = b"fn main() {\n    println!(\"hello\");\n}\n".repeat(4);
    let mut target = base.clone();
    target.extend_from_slice(b"// trailing comment\n");
    let (pack, base_id) = delta_pack(&base, &target);

    let (objects, trailer) = PackfileReader::new(&pack[..]).read_all().unwrap();
    assert!(trailer.checksum.is_some());
    assert_eq!(objects.len(), 2);

    let delta = &objects[1];
    assert_eq!(delta.object_type, ObjectType::RefDelta);
    assert!(delta.hash.is_zero());
    assert_eq!(delta.delta_base(), Some(&base_id));

    let resolved = delta.resolve_delta(&objects[0]).unwrap();
    assert_eq!(resolved.data, target);
    assert_eq!(
        resolved.hash,
        Hasher::hash_object(HashAlgorithm::Sha1, b"blob", &target).unwrap()
    );
}

#[test]
fn tiny_read_buffer_keeps_entries_aligned() {
    let base: Vec<u8> = (0..3000u32).map(|i| (i % 97) as u8).collect();
    let mut target = base.clone();
    target[1500] = 0;
    let (pack, _) = delta_pack(&base, &target);

    let reader = BufReader::with_capacity(7, &pack[..]);
    let entries: Vec<PackfileEntry> = PackfileReader::new(reader)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries[2].is_trailer());
}

#[test]
fn commit_round_trip_through_disk_storage() {
    let who = Identity::new("Jane Doe", "jane@example.com", 1_234_567_890, "-0700");
    let mut writer = PackfileWriter::new(HashAlgorithm::Sha1, StorageMode::Disk).unwrap();
    let readme = writer.add_blob(b"# readme\n").unwrap();
    let lib = writer.add_blob(b"pub fn f() {}\n").unwrap();
    let src = writer
        .add_tree(&[PackfileTreeEntry::new(FileMode::Regular, "lib.rs", lib)])
        .unwrap();
    let root = writer
        .add_tree(&[
            PackfileTreeEntry::new(FileMode::Regular, "README.md", readme),
            PackfileTreeEntry::new(FileMode::Tree, "src", src),
        ])
        .unwrap();
    let parent = ObjectId::from_hex("95d09f2b10159347eece71399a7e2e907ea3df4f").unwrap();
    let commit = writer
        .add_commit(root, Some(parent), &who, &who, "Add library\n")
        .unwrap();
    assert_eq!(writer.object_count(), 5);

    let mut pack = Vec::new();
    writer.write_pack(&mut pack).unwrap();
    assert!(writer.is_cleaned_up());

    let (objects, _) = PackfileReader::new(&pack[..]).read_all().unwrap();
    let by_id = |id: ObjectId| find(&objects, id);

    let c = by_id(commit).commit.as_ref().unwrap();
    assert_eq!(c.tree, root);
    assert_eq!(c.parent(), Some(&parent));
    assert_eq!(c.author, who);

    let entries = by_id(root).tree.as_ref().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].file_name, "src");
    assert!(entries[1].file_mode.is_tree());
    assert_eq!(by_id(lib).data, b"pub fn f() {}\n");
}

#[test]
fn truncated_payload_fails_and_sticks() {
    let (pack, _) = delta_pack(b"base object body", b"base object body!");
    let cut = &pack[..30];
    let mut reader = PackfileReader::new(cut);
    let err = loop {
        match reader.read_entry() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("truncated pack read to the end"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, PackError::Truncated(_)));
    assert!(matches!(reader.read_entry(), Err(PackError::Truncated(_))));
}
