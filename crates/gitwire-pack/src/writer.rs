//! Object staging and pack emission.
//!
//! Objects are deduplicated by id and kept in memory until the storage
//! policy moves them to a temporary file. [`PackfileWriter::write_pack`]
//! streams everything out as a version 2 pack and then releases the
//! staging area; the writer cannot be reused afterwards.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use gitwire_hash::{HashAlgorithm, Hasher, ObjectId};
use gitwire_object::{compute_object_id, Identity, ObjectType, PackfileCommit, PackfileTreeEntry};
use tempfile::NamedTempFile;

use crate::entry::encode_entry_header;
use crate::object::{build_tree_object, PackfileObject};
use crate::{PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

/// Where staged object data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Always in memory.
    Memory,
    /// Always in a temporary file.
    Disk,
    /// In memory until a limit in [`WriterOptions`] is reached, then in a
    /// temporary file.
    #[default]
    Auto,
}

/// Writer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub storage: StorageMode,
    /// Auto mode spills once this many objects are staged.
    pub memory_object_limit: usize,
    /// Auto mode spills once this many bytes are staged.
    pub memory_byte_limit: u64,
    /// Directory for the temporary file; the system default when `None`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            storage: StorageMode::Auto,
            memory_object_limit: 10,
            memory_byte_limit: 5 * 1024 * 1024,
            temp_dir: None,
        }
    }
}

impl WriterOptions {
    pub fn storage(mut self, storage: StorageMode) -> Self {
        self.storage = storage;
        self
    }

    pub fn memory_object_limit(mut self, limit: usize) -> Self {
        self.memory_object_limit = limit;
        self
    }

    pub fn memory_byte_limit(mut self, limit: u64) -> Self {
        self.memory_byte_limit = limit;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

#[derive(Debug)]
enum Location {
    Memory(Vec<u8>),
    File { offset: u64 },
}

#[derive(Debug)]
struct StagedObject {
    hash: ObjectId,
    object_type: ObjectType,
    len: usize,
    location: Location,
}

/// Stages objects and writes them out as a single pack.
#[derive(Debug)]
pub struct PackfileWriter {
    algo: HashAlgorithm,
    options: WriterOptions,
    seen: HashSet<ObjectId>,
    staged: Vec<StagedObject>,
    spill: Option<NamedTempFile>,
    spill_len: u64,
    memory_bytes: u64,
    last_commit: Option<ObjectId>,
    cleaned_up: bool,
}

impl PackfileWriter {
    /// Create a writer with default limits and the given storage mode.
    pub fn new(algo: HashAlgorithm, storage: StorageMode) -> Result<Self, PackError> {
        Self::with_options(algo, WriterOptions::default().storage(storage))
    }

    pub fn with_options(algo: HashAlgorithm, options: WriterOptions) -> Result<Self, PackError> {
        algo.ensure_supported()?;
        Ok(Self {
            algo,
            options,
            seen: HashSet::new(),
            staged: Vec::new(),
            spill: None,
            spill_len: 0,
            memory_bytes: 0,
            last_commit: None,
            cleaned_up: false,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Stage a blob and return its id.
    pub fn add_blob(&mut self, data: &[u8]) -> Result<ObjectId, PackError> {
        self.stage(ObjectType::Blob, data)
    }

    /// Stage a tree built from `entries` and return its id.
    pub fn add_tree(&mut self, entries: &[PackfileTreeEntry]) -> Result<ObjectId, PackError> {
        self.ensure_open()?;
        let tree = build_tree_object(self.algo, entries)?;
        self.stage(ObjectType::Tree, &tree.data)
    }

    /// Stage a commit and return its id. The most recently staged commit is
    /// what a ref update will point at.
    pub fn add_commit(
        &mut self,
        tree: ObjectId,
        parent: Option<ObjectId>,
        author: &Identity,
        committer: &Identity,
        message: impl AsRef<[u8]>,
    ) -> Result<ObjectId, PackError> {
        let commit = PackfileCommit {
            tree,
            parents: parent.into_iter().collect(),
            author: author.clone(),
            committer: committer.clone(),
            fields: Vec::new(),
            message: message.as_ref().to_vec().into(),
        };
        self.stage(ObjectType::Commit, &commit.serialize())
    }

    /// Stage an already-built object.
    ///
    /// The id is recomputed from the content. A non-zero `hash` on the
    /// object that disagrees with it is rejected.
    pub fn add_object(&mut self, object: &PackfileObject) -> Result<ObjectId, PackError> {
        if !object.object_type.is_base() {
            return Err(PackError::UnsupportedObjectType(object.object_type));
        }
        let computed = compute_object_id(self.algo, object.object_type, &object.data)?;
        if !object.hash.is_zero() && object.hash != computed {
            return Err(PackError::HashMismatch {
                declared: object.hash,
                computed,
            });
        }
        self.stage(object.object_type, &object.data)
    }

    fn stage(&mut self, object_type: ObjectType, data: &[u8]) -> Result<ObjectId, PackError> {
        self.ensure_open()?;
        let hash = compute_object_id(self.algo, object_type, data)?;
        if self.seen.contains(&hash) {
            tracing::trace!(%hash, "object already staged");
            return Ok(hash);
        }

        let location = if self.spill.is_some() || self.options.storage == StorageMode::Disk {
            self.append_to_file(data)?
        } else {
            self.memory_bytes += data.len() as u64;
            Location::Memory(data.to_vec())
        };
        self.staged.push(StagedObject {
            hash,
            object_type,
            len: data.len(),
            location,
        });
        self.seen.insert(hash);
        if object_type == ObjectType::Commit {
            self.last_commit = Some(hash);
        }
        tracing::trace!(%hash, kind = %object_type, size = data.len(), "staged object");

        if self.should_spill() {
            self.spill_to_file()?;
        }
        Ok(hash)
    }

    fn should_spill(&self) -> bool {
        self.options.storage == StorageMode::Auto
            && self.spill.is_none()
            && (self.staged.len() >= self.options.memory_object_limit
                || self.memory_bytes >= self.options.memory_byte_limit)
    }

    /// Move every in-memory object to the temporary file.
    fn spill_to_file(&mut self) -> Result<(), PackError> {
        let mut staged = std::mem::take(&mut self.staged);
        let result = staged.iter_mut().try_for_each(|obj| {
            if let Location::Memory(data) = &obj.location {
                let location = self.append_to_file(data)?;
                obj.location = location;
            }
            Ok::<_, PackError>(())
        });
        self.staged = staged;
        result?;

        self.memory_bytes = 0;
        tracing::debug!(
            objects = self.staged.len(),
            bytes = self.spill_len,
            path = ?self.temp_path(),
            "moved staged objects to temporary file"
        );
        Ok(())
    }

    fn append_to_file(&mut self, data: &[u8]) -> Result<Location, PackError> {
        let offset = self.spill_len;
        let file = self.spill_file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        self.spill_len += data.len() as u64;
        Ok(Location::File { offset })
    }

    fn spill_file(&mut self) -> Result<&mut NamedTempFile, PackError> {
        let file = match self.spill.take() {
            Some(file) => file,
            None => {
                let mut builder = tempfile::Builder::new();
                builder.prefix("gitwire-pack-").suffix(".tmp");
                match &self.options.temp_dir {
                    Some(dir) => builder.tempfile_in(dir)?,
                    None => builder.tempfile()?,
                }
            }
        };
        Ok(self.spill.insert(file))
    }

    fn ensure_open(&self) -> Result<(), PackError> {
        if self.cleaned_up {
            return Err(PackError::WriterCleanedUp);
        }
        Ok(())
    }

    /// Check that a ref-update pack can be written, returning the commit
    /// the ref will point at.
    pub fn check_writable(&self) -> Result<ObjectId, PackError> {
        self.ensure_open()?;
        let commit = self.last_commit.ok_or(PackError::NoCommit)?;
        if self.staged.is_empty() {
            return Err(PackError::NoObjects);
        }
        Ok(commit)
    }

    /// Write every staged object as a pack to `sink` and release the
    /// staging area. Returns the pack checksum.
    pub fn write_pack<W: Write>(&mut self, sink: &mut W) -> Result<ObjectId, PackError> {
        self.check_writable()?;

        let mut out = HashingWriter {
            inner: sink,
            hasher: Hasher::new(self.algo)?,
        };
        let mut header = [0u8; PACK_HEADER_SIZE];
        header[0..4].copy_from_slice(PACK_SIGNATURE);
        header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
        let count = u32::try_from(self.staged.len()).map_err(|_| PackError::CorruptEntry {
            index: u32::MAX,
            reason: "too many objects for one pack".into(),
        })?;
        header[8..12].copy_from_slice(&count.to_be_bytes());
        out.write_all(&header)?;

        let Self { staged, spill, .. } = self;
        for obj in staged.iter() {
            let data: Cow<'_, [u8]> = match &obj.location {
                Location::Memory(data) => Cow::Borrowed(data),
                Location::File { offset } => {
                    let file = spill.as_mut().ok_or(PackError::Truncated("staged object file"))?;
                    let mut buf = vec![0u8; obj.len];
                    file.seek(SeekFrom::Start(*offset))?;
                    file.read_exact(&mut buf)?;
                    Cow::Owned(buf)
                }
            };
            out.write_all(&encode_entry_header(obj.object_type, obj.len as u64))?;
            let mut encoder = ZlibEncoder::new(&mut out, Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()?;
            tracing::trace!(hash = %obj.hash, kind = %obj.object_type, "packed object");
        }

        let checksum = out.hasher.finalize()?;
        out.inner.write_all(checksum.as_bytes())?;
        out.inner.flush()?;
        tracing::debug!(objects = count, %checksum, "wrote pack");

        self.cleanup()?;
        Ok(checksum)
    }

    /// Drop every staged object and delete the temporary file.
    ///
    /// Runs once; the writer is unusable afterwards and a second call
    /// returns [`PackError::WriterCleanedUp`].
    pub fn cleanup(&mut self) -> Result<(), PackError> {
        self.ensure_open()?;
        self.cleaned_up = true;
        self.staged.clear();
        self.seen.clear();
        self.memory_bytes = 0;
        self.spill_len = 0;
        self.last_commit = None;
        if let Some(file) = self.spill.take() {
            let path = file.path().to_path_buf();
            file.close()?;
            tracing::debug!(path = %path.display(), "removed staging file");
        }
        Ok(())
    }

    pub fn has_objects(&self) -> bool {
        !self.staged.is_empty()
    }

    pub fn object_count(&self) -> usize {
        self.staged.len()
    }

    /// Bytes of object data currently held in memory.
    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes
    }

    pub fn contains(&self, hash: &ObjectId) -> bool {
        self.seen.contains(hash)
    }

    /// Most recently staged commit.
    pub fn last_commit(&self) -> Option<ObjectId> {
        self.last_commit
    }

    /// Path of the temporary file, while one exists.
    pub fn temp_path(&self) -> Option<&Path> {
        self.spill.as_ref().map(|f| f.path())
    }

    pub fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }
}

/// Feeds everything written into a running checksum.
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: Hasher,
}

impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
