use std::cmp::Ordering;

use bstr::{BString, ByteSlice};
use gitwire_hash::ObjectId;

use crate::ObjectError;

/// Mode of a tree entry, stored in octal ASCII on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// 100644
    Regular,
    /// 100755
    Executable,
    /// 120000
    Symlink,
    /// 160000, a submodule commit
    Gitlink,
    /// 40000
    Tree,
    /// Anything else, kept so trees re-serialize byte for byte.
    Unknown(u32),
}

impl FileMode {
    /// Parse octal ASCII such as `b"100644"`.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        parse_octal(s)
            .map(Self::from_raw)
            .ok_or_else(|| ObjectError::InvalidFileMode(String::from_utf8_lossy(s).into_owned()))
    }

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0o100644 => Self::Regular,
            0o100755 => Self::Executable,
            0o120000 => Self::Symlink,
            0o160000 => Self::Gitlink,
            0o040000 => Self::Tree,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Gitlink => 0o160000,
            Self::Tree => 0o040000,
            Self::Unknown(v) => *v,
        }
    }

    /// Octal form without leading zeros, as Git writes it.
    pub fn to_octal(&self) -> String {
        format!("{:o}", self.raw())
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }
}

fn parse_octal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    s.iter().try_fold(0u32, |acc, &b| {
        let digit = match b {
            b'0'..=b'7' => u32::from(b - b'0'),
            _ => return None,
        };
        acc.checked_mul(8)?.checked_add(digit)
    })
}

/// One `mode name\0id` record of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackfileTreeEntry {
    pub file_mode: FileMode,
    pub file_name: BString,
    pub hash: ObjectId,
}

impl PackfileTreeEntry {
    pub fn new(file_mode: FileMode, file_name: impl Into<BString>, hash: ObjectId) -> Self {
        Self {
            file_mode,
            file_name: file_name.into(),
            hash,
        }
    }

    /// Git's tree order: a directory compares as if its name ended in `/`.
    pub fn cmp_entries(a: &Self, b: &Self) -> Ordering {
        let (x, y) = (a.file_name.as_bytes(), b.file_name.as_bytes());
        let common = x.len().min(y.len());
        x[..common].cmp(&y[..common]).then_with(|| {
            let next = |name: &[u8], is_dir: bool| match name.get(common) {
                Some(&c) => c,
                None if is_dir => b'/',
                None => 0,
            };
            next(x, a.file_mode.is_tree()).cmp(&next(y, b.file_mode.is_tree()))
        })
    }
}

/// Sort entries into canonical tree order.
pub fn sort_tree_entries(entries: &mut [PackfileTreeEntry]) {
    entries.sort_by(PackfileTreeEntry::cmp_entries);
}

/// Decode tree content into its entries, in stored order.
pub fn parse_tree(content: &[u8]) -> Result<Vec<PackfileTreeEntry>, ObjectError> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < content.len() {
        let rest = &content[pos..];
        let space = rest.find_byte(b' ').ok_or_else(|| ObjectError::InvalidTreeEntry {
            offset: pos,
            reason: "missing space after mode".into(),
        })?;
        let file_mode =
            FileMode::from_bytes(&rest[..space]).map_err(|_| ObjectError::InvalidTreeEntry {
                offset: pos,
                reason: "invalid mode".into(),
            })?;

        let name_start = space + 1;
        let nul = rest[name_start..]
            .find_byte(0)
            .ok_or_else(|| ObjectError::InvalidTreeEntry {
                offset: pos + name_start,
                reason: "missing NUL after name".into(),
            })?
            + name_start;
        if nul == name_start {
            return Err(ObjectError::InvalidTreeEntry {
                offset: pos + name_start,
                reason: "empty name".into(),
            });
        }

        let id_start = nul + 1;
        let id_end = id_start + ObjectId::LEN;
        if id_end > rest.len() {
            return Err(ObjectError::InvalidTreeEntry {
                offset: pos + id_start,
                reason: "truncated object id".into(),
            });
        }

        entries.push(PackfileTreeEntry {
            file_mode,
            file_name: BString::from(&rest[name_start..nul]),
            hash: ObjectId::from_bytes(&rest[id_start..id_end])?,
        });
        pos += id_end;
    }

    Ok(entries)
}

/// Encode entries as tree content, sorting a copy first.
pub fn serialize_tree(entries: &[PackfileTreeEntry]) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sort_tree_entries(&mut sorted);

    let mut out = Vec::with_capacity(sorted.len() * (ObjectId::LEN + 16));
    for entry in &sorted {
        out.extend_from_slice(entry.file_mode.to_octal().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&entry.file_name);
        out.push(0);
        out.extend_from_slice(entry.hash.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_array([n; 20])
    }

    #[test]
    fn file_mode_parsing() {
        assert_eq!(FileMode::from_bytes(b"100644").unwrap(), FileMode::Regular);
        assert_eq!(FileMode::from_bytes(b"100755").unwrap(), FileMode::Executable);
        assert_eq!(FileMode::from_bytes(b"120000").unwrap(), FileMode::Symlink);
        assert_eq!(FileMode::from_bytes(b"160000").unwrap(), FileMode::Gitlink);
        assert_eq!(FileMode::from_bytes(b"40000").unwrap(), FileMode::Tree);
        assert_eq!(FileMode::from_bytes(b"040000").unwrap(), FileMode::Tree);
        assert_eq!(FileMode::from_bytes(b"100664").unwrap(), FileMode::Unknown(0o100664));
        assert!(FileMode::from_bytes(b"").is_err());
        assert!(FileMode::from_bytes(b"10064x").is_err());
    }

    #[test]
    fn tree_mode_has_no_leading_zero() {
        assert_eq!(FileMode::Tree.to_octal(), "40000");
        assert_eq!(FileMode::Regular.to_octal(), "100644");
    }

    #[test]
    fn parse_serialize_roundtrip() {
        let entries = vec![
            PackfileTreeEntry::new(FileMode::Regular, "README", oid(1)),
            PackfileTreeEntry::new(FileMode::Tree, "src", oid(2)),
            PackfileTreeEntry::new(FileMode::Executable, "zz.sh", oid(3)),
        ];
        let bytes = serialize_tree(&entries);
        assert_eq!(parse_tree(&bytes).unwrap(), entries);
    }

    #[test]
    fn serialize_sorts() {
        let entries = vec![
            PackfileTreeEntry::new(FileMode::Regular, "b", oid(1)),
            PackfileTreeEntry::new(FileMode::Tree, "a", oid(2)),
        ];
        let parsed = parse_tree(&serialize_tree(&entries)).unwrap();
        assert_eq!(parsed[0].file_name, "a");
        assert_eq!(parsed[1].file_name, "b");
    }

    #[test]
    fn empty_tree() {
        assert!(parse_tree(b"").unwrap().is_empty());
        assert!(serialize_tree(&[]).is_empty());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            parse_tree(b"100644"),
            Err(ObjectError::InvalidTreeEntry { offset: 0, .. })
        ));
        assert!(matches!(
            parse_tree(b"100644 name"),
            Err(ObjectError::InvalidTreeEntry { .. })
        ));
        let mut truncated = b"100644 name\0".to_vec();
        truncated.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            parse_tree(&truncated),
            Err(ObjectError::InvalidTreeEntry { offset: 12, .. })
        ));
        let mut no_name = b"100644 \0".to_vec();
        no_name.extend_from_slice(&[0u8; 20]);
        assert!(parse_tree(&no_name).is_err());
    }
}
