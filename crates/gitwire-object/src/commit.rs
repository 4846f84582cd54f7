use bstr::{BStr, BString, ByteSlice};
use gitwire_hash::ObjectId;

use crate::{Identity, ObjectError};

/// Decoded commit content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackfileCommit {
    pub tree: ObjectId,
    /// Parent ids in header order; empty for a root commit.
    pub parents: Vec<ObjectId>,
    pub author: Identity,
    pub committer: Identity,
    /// Headers this type does not model (`encoding`, `gpgsig`, `mergetag`, ...).
    /// Continuation lines are joined with `\n`.
    pub fields: Vec<(BString, BString)>,
    pub message: BString,
}

impl PackfileCommit {
    /// Parse commit content (without the object header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut fields = Vec::new();

        let mut pos = 0;
        while pos < content.len() {
            if content[pos] == b'\n' {
                pos += 1;
                break;
            }
            let end = line_end(content, pos);
            let line = &content[pos..end];
            let (key, value) = match line.find_byte(b' ') {
                Some(sp) => (&line[..sp], &line[sp + 1..]),
                None => (line, &b""[..]),
            };

            match key {
                b"tree" => tree = Some(parse_id(key, value)?),
                b"parent" => parents.push(parse_id(key, value)?),
                b"author" => author = Some(Identity::parse(value)?),
                b"committer" => committer = Some(Identity::parse(value)?),
                _ => {
                    let mut joined = value.to_vec();
                    let mut next = end + 1;
                    while next < content.len() && content[next] == b' ' {
                        let cont = line_end(content, next);
                        joined.push(b'\n');
                        joined.extend_from_slice(&content[next + 1..cont]);
                        next = cont + 1;
                    }
                    fields.push((BString::from(key), BString::from(joined)));
                    pos = next;
                    continue;
                }
            }
            pos = end + 1;
        }

        Ok(Self {
            tree: tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?,
            parents,
            author: author.ok_or(ObjectError::MissingCommitField { field: "author" })?,
            committer: committer.ok_or(ObjectError::MissingCommitField { field: "committer" })?,
            fields,
            message: BString::from(content.get(pos..).unwrap_or_default()),
        })
    }

    /// Encode as commit content. A zero parent id is not written.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.message.len());
        push_header(&mut out, b"tree", self.tree.to_hex().as_bytes());
        for parent in self.parents.iter().filter(|p| !p.is_zero()) {
            push_header(&mut out, b"parent", parent.to_hex().as_bytes());
        }
        push_header(&mut out, b"author", &self.author.to_bytes());
        push_header(&mut out, b"committer", &self.committer.to_bytes());
        for (key, value) in &self.fields {
            push_header(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// First parent, if any.
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// Value of an unmodelled header.
    pub fn field(&self, key: &str) -> Option<&BStr> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_bstr())
    }
}

fn line_end(data: &[u8], from: usize) -> usize {
    data[from..]
        .find_byte(b'\n')
        .map_or(data.len(), |p| p + from)
}

fn parse_id(key: &[u8], value: &[u8]) -> Result<ObjectId, ObjectError> {
    ObjectId::from_hex_bytes(value).map_err(|e| {
        ObjectError::InvalidCommitHeader(format!("{}: {e}", BStr::new(key)))
    })
}

/// Write `key value\n`, continuing embedded newlines with a leading space.
fn push_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for (i, line) in value.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\n ");
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}
