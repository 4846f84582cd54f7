use gitwire_hash::{HashAlgorithm, Hasher, ObjectId};

// Raw SHA-1 digests.

#[test]
fn sha1_empty_string() {
    let oid = Hasher::digest(HashAlgorithm::Sha1, b"").unwrap();
    assert_eq!(oid.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
}

#[test]
fn sha1_hello_world() {
    let oid = Hasher::digest(HashAlgorithm::Sha1, b"hello world").unwrap();
    assert_eq!(oid.to_hex(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
}

// Object ids as produced by `git hash-object`.

#[test]
fn blob_hello() {
    let oid = Hasher::hash_object(HashAlgorithm::Sha1, b"blob", b"hello").unwrap();
    assert_eq!(oid, Hasher::digest(HashAlgorithm::Sha1, b"blob 5\0hello").unwrap());
    assert_eq!(oid.to_hex(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
}

#[test]
fn empty_blob() {
    let oid = Hasher::hash_object(HashAlgorithm::Sha1, b"blob", b"").unwrap();
    assert_eq!(oid.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
}

#[test]
fn empty_tree() {
    let oid = Hasher::hash_object(HashAlgorithm::Sha1, b"tree", b"").unwrap();
    assert_eq!(oid.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
}

#[test]
fn blob_hello_world() {
    let oid = Hasher::hash_object(HashAlgorithm::Sha1, b"blob", b"hello world").unwrap();
    assert_eq!(oid.to_hex(), "95d09f2b10159347eece71399a7e2e907ea3df4f");
}

// The checksum of a pack with no objects, sent with every ref-only push.

#[test]
fn empty_pack_checksum() {
    let oid = Hasher::digest(HashAlgorithm::Sha1, b"PACK\0\0\0\x02\0\0\0\0").unwrap();
    assert_eq!(
        oid,
        ObjectId::from_hex("029d08823bd8a8eab510ad6ac75c823cfd3ed31e").unwrap()
    );
}

#[test]
fn type_name_changes_the_id() {
    let blob = Hasher::hash_object(HashAlgorithm::Sha1, b"blob", b"x").unwrap();
    let tree = Hasher::hash_object(HashAlgorithm::Sha1, b"tree", b"x").unwrap();
    assert_ne!(blob, tree);
}
