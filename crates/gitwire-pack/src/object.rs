use gitwire_hash::{HashAlgorithm, ObjectId};
use gitwire_object::{
    compute_object_id, parse_tree, serialize_tree, ObjectType, PackfileCommit, PackfileTreeEntry,
};

use crate::delta::apply::apply_delta;
use crate::delta::Delta;
use crate::PackError;

/// One object decoded from, or destined for, a pack.
///
/// Base objects carry their Git id. A ref-delta carries the zero id, its
/// raw delta body in `data`, and the decoded `delta`, until
/// [`resolve_delta`](PackfileObject::resolve_delta) turns it into the
/// object it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackfileObject {
    pub object_type: ObjectType,
    pub data: Vec<u8>,
    pub hash: ObjectId,
    pub delta: Option<Delta>,
    /// Parsed entries, present for trees.
    pub tree: Option<Vec<PackfileTreeEntry>>,
    /// Parsed content, present for commits.
    pub commit: Option<PackfileCommit>,
}

impl PackfileObject {
    /// Hash `data` as `object_type` and parse it when it is a tree or commit.
    pub fn new(
        algo: HashAlgorithm,
        object_type: ObjectType,
        data: Vec<u8>,
    ) -> Result<Self, PackError> {
        let hash = compute_object_id(algo, object_type, &data)?;
        let mut object = Self {
            object_type,
            data,
            hash,
            delta: None,
            tree: None,
            commit: None,
        };
        object.parse_content()?;
        Ok(object)
    }

    /// An unresolved ref-delta whose body has already been decoded.
    pub fn ref_delta(data: Vec<u8>, delta: Delta) -> Self {
        Self {
            object_type: ObjectType::RefDelta,
            data,
            hash: ObjectId::ZERO,
            delta: Some(delta),
            tree: None,
            commit: None,
        }
    }

    fn parse_content(&mut self) -> Result<(), PackError> {
        match self.object_type {
            ObjectType::Tree => self.tree = Some(parse_tree(&self.data)?),
            ObjectType::Commit => self.commit = Some(PackfileCommit::parse(&self.data)?),
            ObjectType::Blob
            | ObjectType::Tag
            | ObjectType::OfsDelta
            | ObjectType::RefDelta
            | ObjectType::Invalid
            | ObjectType::Reserved => {}
        }
        Ok(())
    }

    /// Id of the base this delta applies to.
    pub fn delta_base(&self) -> Option<&ObjectId> {
        self.delta.as_ref().map(|d| &d.parent)
    }

    /// Apply this ref-delta to `base`, yielding the reconstructed object
    /// rehashed under the base's type.
    pub fn resolve_delta(&self, base: &PackfileObject) -> Result<PackfileObject, PackError> {
        let delta = self.delta.as_ref().ok_or(PackError::NotADelta)?;
        if base.hash != delta.parent {
            return Err(PackError::BaseMismatch {
                expected: delta.parent,
                actual: base.hash,
            });
        }
        if !base.object_type.is_base() {
            return Err(PackError::UnsupportedObjectType(base.object_type));
        }
        let data = apply_delta(&base.data, delta)?;
        Self::new(HashAlgorithm::Sha1, base.object_type, data)
    }
}

/// Build a tree object from `entries`, sorting them into Git's tree order.
pub fn build_tree_object(
    algo: HashAlgorithm,
    entries: &[PackfileTreeEntry],
) -> Result<PackfileObject, PackError> {
    PackfileObject::new(algo, ObjectType::Tree, serialize_tree(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::compute::compute_delta;
    use gitwire_object::FileMode;

    #[test]
    fn blob_hello() {
        let obj = PackfileObject::new(HashAlgorithm::Sha1, ObjectType::Blob, b"hello".to_vec())
            .unwrap();
        assert_eq!(obj.hash.to_hex(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
        assert!(obj.tree.is_none() && obj.commit.is_none());
    }

    #[test]
    fn empty_tree_id() {
        let tree = build_tree_object(HashAlgorithm::Sha1, &[]).unwrap();
        assert_eq!(tree.hash.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        assert_eq!(tree.tree, Some(Vec::new()));
    }

    #[test]
    fn tree_builder_sorts_and_parses() {
        let blob = PackfileObject::new(HashAlgorithm::Sha1, ObjectType::Blob, b"x".to_vec())
            .unwrap();
        let entries = [
            PackfileTreeEntry::new(FileMode::Regular, "b.txt", blob.hash),
            PackfileTreeEntry::new(FileMode::Tree, "a", ObjectId::from_array([1; 20])),
        ];
        let tree = build_tree_object(HashAlgorithm::Sha1, &entries).unwrap();
        let parsed = tree.tree.unwrap();
        assert_eq!(parsed[0].file_name, "a");
        assert_eq!(parsed[1].hash, blob.hash);
    }

    #[test]
    fn resolve_delta_rehashes() {
        let base = PackfileObject::new(
            HashAlgorithm::Sha1,
            ObjectType::Blob,
            b"the quick brown fox jumps over the lazy dog".to_vec(),
        )
        .unwrap();
        let target = b"the quick brown fox jumps over the lazy cat".to_vec();
        let raw = compute_delta(&base.data, &target);
        let delta = Delta::decode(base.hash, &raw).unwrap();
        let obj = PackfileObject::ref_delta(raw, delta);
        assert_eq!(obj.delta_base(), Some(&base.hash));

        let resolved = obj.resolve_delta(&base).unwrap();
        assert_eq!(resolved.object_type, ObjectType::Blob);
        assert_eq!(resolved.data, target);
        assert_eq!(
            resolved.hash,
            compute_object_id(HashAlgorithm::Sha1, ObjectType::Blob, &target).unwrap()
        );
    }

    #[test]
    fn resolve_requires_matching_base() {
        let base = PackfileObject::new(HashAlgorithm::Sha1, ObjectType::Blob, b"a".to_vec())
            .unwrap();
        let other = PackfileObject::new(HashAlgorithm::Sha1, ObjectType::Blob, b"b".to_vec())
            .unwrap();
        let raw = compute_delta(b"a", b"ab");
        let obj = PackfileObject::ref_delta(raw.clone(), Delta::decode(base.hash, &raw).unwrap());
        assert!(matches!(
            obj.resolve_delta(&other),
            Err(PackError::BaseMismatch { .. })
        ));
        assert!(matches!(base.resolve_delta(&base), Err(PackError::NotADelta)));
    }

    #[test]
    fn malformed_tree_is_rejected() {
        assert!(matches!(
            PackfileObject::new(HashAlgorithm::Sha1, ObjectType::Tree, b"garbage".to_vec()),
            Err(PackError::Object(_))
        ));
    }
}
