//! Pack entry headers: a 3-bit type and a little-endian base-128 size.
//!
//! ```text
//! byte 0:   [C TTT SSSS]   C = more bytes follow, T = type, S = size bits 0..4
//! byte n:   [C SSSSSSS]    size bits 4+7(n-1) ..
//! ```

use std::io::Read;

use gitwire_object::ObjectType;

use crate::PackError;

/// Read one entry header from `reader`.
///
/// `index` is only used to label errors.
pub fn read_entry_header<R: Read>(reader: &mut R, index: u32) -> Result<(ObjectType, u64), PackError> {
    let mut byte = read_byte(reader)?;
    let object_type = ObjectType::from_wire(byte >> 4);
    let mut size = u64::from(byte & 0x0f);
    let mut shift = 4u32;

    while byte & 0x80 != 0 {
        byte = read_byte(reader)?;
        let bits = u64::from(byte & 0x7f);
        let shifted = bits
            .checked_shl(shift)
            .filter(|shifted| shifted >> shift == bits)
            .ok_or_else(|| PackError::CorruptEntry {
                index,
                reason: "size varint overflows 64 bits".into(),
            })?;
        size |= shifted;
        shift += 7;
    }

    Ok((object_type, size))
}

fn read_byte<R: Read>(reader: &mut R) -> Result<u8, PackError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => PackError::Truncated("entry header"),
        _ => PackError::from(e),
    })?;
    Ok(buf[0])
}

/// Encode an entry header for `object_type` with an inflated `size`.
pub fn encode_entry_header(object_type: ObjectType, size: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    let mut rest = size >> 4;
    let mut byte = (object_type.wire_value() << 4) | (size & 0x0f) as u8;

    while rest > 0 {
        buf.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    buf.push(byte);
    buf
}
