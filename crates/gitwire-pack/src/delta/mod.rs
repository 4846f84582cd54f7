//! Delta instruction streams.
//!
//! A ref-delta body reconstructs a target object from a base:
//! ```text
//! [source_size: varint] [target_size: varint] [instruction]*
//! ```
//! - Copy:   `[1SSSOOOO] [offset bytes] [size bytes]`, a size of 0 means 0x10000
//! - Insert: `[0NNNNNNN] [N literal bytes]`, N in 1..=127
//!
//! Opcode 0 is reserved.

pub mod apply;
pub mod compute;

use gitwire_hash::ObjectId;

use crate::PackError;

/// One step of a delta, replayed strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaChange {
    /// Append literal bytes carried in the delta.
    Insert(Vec<u8>),
    /// Append `length` bytes of the base starting at `source_offset`.
    Copy { source_offset: usize, length: usize },
}

/// A decoded ref-delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Id of the base object the changes apply to.
    pub parent: ObjectId,
    pub expected_source_length: usize,
    pub target_length: usize,
    pub changes: Vec<DeltaChange>,
}

impl Delta {
    /// Decode a raw delta body whose base is `parent`.
    ///
    /// Decoding ends once `target_length` bytes are accounted for. A copy
    /// reaching past the declared source length, or past what is left of the
    /// target, ends the instruction list early instead of failing. Git
    /// servers have been seen to rely on this.
    pub fn decode(parent: ObjectId, data: &[u8]) -> Result<Self, PackError> {
        let (expected_source_length, mut pos) = read_varint(data, 0)?;
        let (target_length, next) = read_varint(data, pos)?;
        pos = next;

        let mut changes = Vec::new();
        let mut remaining = target_length;

        while remaining > 0 && pos < data.len() {
            let cmd = data[pos];
            pos += 1;

            if cmd & 0x80 != 0 {
                let mut offset = 0usize;
                for (bit, shift) in [(0x01, 0), (0x02, 8), (0x04, 16), (0x08, 24)] {
                    if cmd & bit != 0 {
                        offset |= usize::from(take(data, &mut pos, "copy offset")?) << shift;
                    }
                }
                let mut length = 0usize;
                for (bit, shift) in [(0x10, 0), (0x20, 8), (0x40, 16)] {
                    if cmd & bit != 0 {
                        length |= usize::from(take(data, &mut pos, "copy size")?) << shift;
                    }
                }
                if length == 0 {
                    length = 0x10000;
                }

                let in_source = offset
                    .checked_add(length)
                    .is_some_and(|end| end <= expected_source_length);
                if !in_source || length > remaining {
                    break;
                }
                changes.push(DeltaChange::Copy {
                    source_offset: offset,
                    length,
                });
                remaining -= length;
            } else if cmd != 0 {
                let n = usize::from(cmd);
                if pos + n > data.len() {
                    return Err(invalid(pos, "truncated insert data"));
                }
                if n > remaining {
                    return Err(invalid(pos - 1, "insert overruns target size"));
                }
                changes.push(DeltaChange::Insert(data[pos..pos + n].to_vec()));
                pos += n;
                remaining -= n;
            } else {
                return Err(invalid(pos - 1, "reserved opcode 0"));
            }
        }

        Ok(Self {
            parent,
            expected_source_length,
            target_length,
            changes,
        })
    }

    /// Encode back to a raw delta body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = write_varint(self.expected_source_length);
        out.extend_from_slice(&write_varint(self.target_length));
        for change in &self.changes {
            match change {
                DeltaChange::Insert(bytes) => {
                    for chunk in bytes.chunks(MAX_INSERT) {
                        encode_insert(&mut out, chunk);
                    }
                }
                DeltaChange::Copy {
                    source_offset,
                    length,
                } => encode_copy(&mut out, *source_offset, *length),
            }
        }
        out
    }
}

/// Longest literal one insert opcode can carry.
pub const MAX_INSERT: usize = 0x7f;
/// Longest span one copy opcode can carry.
pub const MAX_COPY: usize = 0x00ff_ffff;

fn invalid(offset: usize, reason: &str) -> PackError {
    PackError::InvalidDelta {
        offset: offset as u64,
        reason: reason.into(),
    }
}

fn take(data: &[u8], pos: &mut usize, what: &str) -> Result<u8, PackError> {
    let byte = *data
        .get(*pos)
        .ok_or_else(|| invalid(*pos, &format!("truncated {what}")))?;
    *pos += 1;
    Ok(byte)
}

/// Read a 7-bit little-endian varint at `pos`, returning the value and the next position.
pub fn read_varint(data: &[u8], mut pos: usize) -> Result<(usize, usize), PackError> {
    let start = pos;
    let mut value = 0usize;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| invalid(start, "truncated size header"))?;
        pos += 1;
        if shift >= usize::BITS {
            return Err(invalid(start, "size header overflows"));
        }
        value |= usize::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
    }
}

pub fn write_varint(mut value: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return buf;
        }
        buf.push(byte | 0x80);
    }
}

/// Append a copy opcode, splitting spans longer than [`MAX_COPY`].
pub fn encode_copy(out: &mut Vec<u8>, mut offset: usize, mut length: usize) {
    while length > 0 {
        let chunk = length.min(MAX_COPY);
        let size = if chunk == 0x10000 { 0 } else { chunk };
        let cmd_at = out.len();
        out.push(0x80);
        let mut cmd = 0x80u8;
        for (i, bit) in [0x01u8, 0x02, 0x04, 0x08].into_iter().enumerate() {
            let byte = ((offset >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                cmd |= bit;
                out.push(byte);
            }
        }
        for (i, bit) in [0x10u8, 0x20, 0x40].into_iter().enumerate() {
            let byte = ((size >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                cmd |= bit;
                out.push(byte);
            }
        }
        out[cmd_at] = cmd;
        offset += chunk;
        length -= chunk;
    }
}

/// Append an insert opcode. `literal` must be 1..=127 bytes.
pub fn encode_insert(out: &mut Vec<u8>, literal: &[u8]) {
    debug_assert!(!literal.is_empty() && literal.len() <= MAX_INSERT);
    out.push(literal.len() as u8);
    out.extend_from_slice(literal);
}
