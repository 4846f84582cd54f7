use crate::{HashAlgorithm, HashError, ObjectId};

/// Streaming SHA-1 with collision detection.
///
/// Bytes go in through [`update`](Hasher::update) or [`std::io::Write`];
/// [`finalize`](Hasher::finalize) turns them into an [`ObjectId`].
pub struct Hasher {
    inner: Box<sha1_checked::Sha1>,
}

impl Hasher {
    /// Create a hasher for `algo`. Only SHA-1 is available.
    pub fn new(algo: HashAlgorithm) -> Result<Self, HashError> {
        algo.ensure_supported()?;
        Ok(Self::sha1())
    }

    pub fn sha1() -> Self {
        use digest::Digest;
        Self {
            inner: Box::new(sha1_checked::Sha1::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        use digest::Digest;
        self.inner.update(data);
    }

    /// Finish hashing. Fails if the collision detector fired.
    pub fn finalize(self) -> Result<ObjectId, HashError> {
        let result = self.inner.try_finalize();
        if result.has_collision() {
            return Err(HashError::Sha1Collision);
        }
        ObjectId::from_bytes(result.hash().as_slice())
    }

    /// Finish hashing and leave a fresh hasher in place.
    pub fn finalize_reset(&mut self) -> Result<ObjectId, HashError> {
        std::mem::replace(self, Self::sha1()).finalize()
    }

    /// Hash `data` in one call.
    pub fn digest(algo: HashAlgorithm, data: &[u8]) -> Result<ObjectId, HashError> {
        let mut h = Self::new(algo)?;
        h.update(data);
        h.finalize()
    }

    /// Hash a Git object as `"<type> <len>\0<content>"`.
    pub fn hash_object(
        algo: HashAlgorithm,
        type_name: &[u8],
        data: &[u8],
    ) -> Result<ObjectId, HashError> {
        let mut h = Self::new(algo)?;
        h.update(type_name);
        h.update(format!(" {}\0", data.len()).as_bytes());
        h.update(data);
        h.finalize()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = Hasher::sha1();
        h.update(b"hello ");
        h.write_all(b"world").unwrap();
        assert_eq!(
            h.finalize().unwrap(),
            Hasher::digest(HashAlgorithm::Sha1, b"hello world").unwrap()
        );
    }

    #[test]
    fn finalize_reset_starts_over() {
        let mut h = Hasher::sha1();
        h.update(b"abc");
        let first = h.finalize_reset().unwrap();
        h.update(b"abc");
        assert_eq!(h.finalize().unwrap(), first);
    }

    #[test]
    fn sha256_unsupported() {
        assert!(matches!(
            Hasher::new(HashAlgorithm::Sha256),
            Err(HashError::UnsupportedAlgorithm(_))
        ));
        assert!(Hasher::hash_object(HashAlgorithm::Sha256, b"blob", b"").is_err());
    }
}
