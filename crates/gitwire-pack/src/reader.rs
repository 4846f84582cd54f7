//! Streaming pack reader.
//!
//! ```text
//! Header ──► Objects{remaining} ──► Trailer ──► Done
//!    │              │                  │
//!    └──────────────┴──────────────────┴──► Failed(err)
//! ```
//!
//! Every byte pulled off the source after the start of the stream feeds the
//! running pack checksum, which the trailer is checked against.

use std::io::{self, BufRead, Read};

use gitwire_hash::{HashAlgorithm, Hasher, ObjectId};
use gitwire_object::ObjectType;

use crate::delta::Delta;
use crate::entry::read_entry_header;
use crate::inflate::inflate_exact;
use crate::object::PackfileObject;
use crate::{PackError, PACK_SIGNATURE};

/// Marks the end of a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackfileTrailer {
    /// The 20-byte checksum that closed the stream, once verified. `None`
    /// when the stream ended right after the last object.
    pub checksum: Option<ObjectId>,
}

/// One item pulled from a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackfileEntry {
    Object(PackfileObject),
    Trailer(PackfileTrailer),
}

impl PackfileEntry {
    pub fn object(&self) -> Option<&PackfileObject> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::Trailer(_) => None,
        }
    }

    pub fn into_object(self) -> Option<PackfileObject> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::Trailer(_) => None,
        }
    }

    pub fn is_trailer(&self) -> bool {
        matches!(self, Self::Trailer(_))
    }
}

#[derive(Debug)]
enum ReaderState {
    Header,
    Objects { index: u32, remaining: u32 },
    Trailer,
    Done,
    Failed(PackError),
}

/// Pulls objects one at a time off a buffered pack stream.
pub struct PackfileReader<R: BufRead> {
    source: HashingReader<R>,
    algo: HashAlgorithm,
    state: ReaderState,
    version: Option<u32>,
    object_count: Option<u32>,
}

impl<R: BufRead> PackfileReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            source: HashingReader::new(reader),
            algo: HashAlgorithm::Sha1,
            state: ReaderState::Header,
            version: None,
            object_count: None,
        }
    }

    /// Read a pack whose objects are named with `algo`.
    ///
    /// Only SHA-1 is supported; anything else leaves the reader failed.
    pub fn with_algorithm(reader: R, algo: HashAlgorithm) -> Self {
        let mut this = Self::new(reader);
        this.algo = algo;
        if let Err(e) = algo.ensure_supported() {
            this.state = ReaderState::Failed(e.into());
        }
        this
    }

    /// Pack version, once the header has been read.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Declared object count, once the header has been read.
    pub fn object_count(&self) -> Option<u32> {
        self.object_count
    }

    /// The error the reader stopped on, if any.
    pub fn error(&self) -> Option<&PackError> {
        match &self.state {
            ReaderState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Read the next entry.
    ///
    /// Yields every declared object, then one [`PackfileEntry::Trailer`],
    /// then `Ok(None)` forever. After a failure every call returns a clone
    /// of the same error without touching the stream again.
    pub fn read_entry(&mut self) -> Result<Option<PackfileEntry>, PackError> {
        if let ReaderState::Failed(e) = &self.state {
            return Err(e.clone());
        }
        match self.step() {
            Ok(entry) => Ok(entry),
            Err(e) => {
                tracing::debug!(error = %e, "pack reader failed");
                self.state = ReaderState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Read every remaining object and the trailer.
    pub fn read_all(&mut self) -> Result<(Vec<PackfileObject>, PackfileTrailer), PackError> {
        let mut objects = Vec::new();
        while let Some(entry) = self.read_entry()? {
            match entry {
                PackfileEntry::Object(obj) => objects.push(obj),
                PackfileEntry::Trailer(trailer) => return Ok((objects, trailer)),
            }
        }
        Err(PackError::Truncated("pack trailer"))
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.source.inner
    }

    fn step(&mut self) -> Result<Option<PackfileEntry>, PackError> {
        loop {
            match self.state {
                ReaderState::Header => self.read_header()?,
                ReaderState::Objects { remaining: 0, .. } => self.state = ReaderState::Trailer,
                ReaderState::Objects { index, remaining } => {
                    let object = self.read_object(index)?;
                    self.state = ReaderState::Objects {
                        index: index + 1,
                        remaining: remaining - 1,
                    };
                    return Ok(Some(PackfileEntry::Object(object)));
                }
                ReaderState::Trailer => {
                    let trailer = self.read_trailer()?;
                    self.state = ReaderState::Done;
                    return Ok(Some(PackfileEntry::Trailer(trailer)));
                }
                ReaderState::Done => return Ok(None),
                // Handled by read_entry before stepping.
                ReaderState::Failed(ref e) => return Err(e.clone()),
            }
        }
    }

    fn read_header(&mut self) -> Result<(), PackError> {
        let mut header = [0u8; 12];
        read_exact_or(&mut self.source, &mut header, "pack header")?;

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&header[0..4]);
        if &signature != PACK_SIGNATURE {
            return Err(PackError::InvalidSignature(signature));
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != 2 && version != 3 {
            return Err(PackError::UnsupportedVersion(version));
        }
        let count = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

        tracing::debug!(version, objects = count, "reading pack");
        self.version = Some(version);
        self.object_count = Some(count);
        self.state = ReaderState::Objects {
            index: 0,
            remaining: count,
        };
        Ok(())
    }

    fn read_object(&mut self, index: u32) -> Result<PackfileObject, PackError> {
        let (object_type, size) = read_entry_header(&mut self.source, index)?;
        let size = usize::try_from(size).map_err(|_| PackError::CorruptEntry {
            index,
            reason: format!("object size {size} does not fit in memory"),
        })?;

        match object_type {
            ObjectType::Commit | ObjectType::Tree | ObjectType::Blob | ObjectType::Tag => {
                let data = inflate_exact(&mut self.source, size)?;
                PackfileObject::new(self.algo, object_type, data)
            }
            ObjectType::RefDelta => {
                let mut base = [0u8; 20];
                read_exact_or(&mut self.source, &mut base, "delta base id")?;
                let parent = ObjectId::from_array(base);
                let data = inflate_exact(&mut self.source, size)?;
                let delta = Delta::decode(parent, &data)?;
                tracing::trace!(index, base = %parent, "ref-delta");
                Ok(PackfileObject::ref_delta(data, delta))
            }
            ObjectType::OfsDelta | ObjectType::Invalid | ObjectType::Reserved => {
                Err(PackError::UnsupportedObjectType(object_type))
            }
        }
    }

    fn read_trailer(&mut self) -> Result<PackfileTrailer, PackError> {
        let computed = self.source.hasher.finalize_reset()?;

        let mut checksum = [0u8; 20];
        let mut filled = 0;
        while filled < checksum.len() {
            match self.source.inner.read(&mut checksum[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(PackfileTrailer { checksum: None }),
            20 => {
                let expected = ObjectId::from_array(checksum);
                if expected != computed {
                    return Err(PackError::ChecksumMismatch {
                        expected,
                        actual: computed,
                    });
                }
                Ok(PackfileTrailer {
                    checksum: Some(expected),
                })
            }
            _ => Err(PackError::Truncated("pack checksum")),
        }
    }
}

impl<R: BufRead> Iterator for PackfileReader<R> {
    type Item = Result<PackfileEntry, PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, ReaderState::Failed(_)) {
            return None;
        }
        self.read_entry().transpose()
    }
}

impl<R: BufRead> std::fmt::Debug for PackfileReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackfileReader")
            .field("algo", &self.algo)
            .field("state", &self.state)
            .field("version", &self.version)
            .field("object_count", &self.object_count)
            .finish()
    }
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> Result<(), PackError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => PackError::Truncated(what),
        _ => PackError::from(e),
    })
}

/// Feeds everything consumed from `inner` into a running checksum.
struct HashingReader<R> {
    inner: R,
    hasher: Hasher,
}

impl<R: BufRead> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::sha1(),
        }
    }
}

impl<R: BufRead> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for HashingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        // A non-empty buffer is handed back again without new I/O.
        if amt > 0 {
            if let Ok(buf) = self.inner.fill_buf() {
                self.hasher.update(&buf[..amt.min(buf.len())]);
            }
        }
        self.inner.consume(amt);
    }
}
