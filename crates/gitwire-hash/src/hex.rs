//! Lowercase hex encoding for object ids and checksums.

use crate::HashError;

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Value of a single ASCII hex digit, either case.
pub const fn nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Write the hex form of `bytes` into `out`, which must hold `2 * bytes.len()` bytes.
pub fn encode_into(bytes: &[u8], out: &mut [u8]) -> Result<(), HashError> {
    if out.len() < bytes.len() * 2 {
        return Err(HashError::InvalidHexLength {
            expected: bytes.len() * 2,
            actual: out.len(),
        });
    }
    for (pair, &b) in out.chunks_exact_mut(2).zip(bytes) {
        pair[0] = DIGITS[usize::from(b >> 4)];
        pair[1] = DIGITS[usize::from(b & 0x0f)];
    }
    Ok(())
}

pub fn to_hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(char::from(DIGITS[usize::from(b >> 4)]));
        s.push(char::from(DIGITS[usize::from(b & 0x0f)]));
    }
    s
}

/// Decode `hex` into `out`. The input must be exactly `2 * out.len()` digits.
pub fn decode_into(hex: &[u8], out: &mut [u8]) -> Result<(), HashError> {
    if hex.len() != out.len() * 2 {
        return Err(HashError::InvalidHexLength {
            expected: out.len() * 2,
            actual: hex.len(),
        });
    }
    for (i, slot) in out.iter_mut().enumerate() {
        let hi = digit_at(hex, i * 2)?;
        let lo = digit_at(hex, i * 2 + 1)?;
        *slot = (hi << 4) | lo;
    }
    Ok(())
}

fn digit_at(hex: &[u8], position: usize) -> Result<u8, HashError> {
    nibble(hex[position]).ok_or(HashError::InvalidHex {
        position,
        character: char::from(hex[position]),
    })
}

/// Decode an even-length hex string into a fresh buffer.
pub fn decode(hex: &str) -> Result<Vec<u8>, HashError> {
    if hex.len() % 2 != 0 {
        return Err(HashError::InvalidHexLength {
            expected: hex.len() + 1,
            actual: hex.len(),
        });
    }
    let mut out = vec![0u8; hex.len() / 2];
    decode_into(hex.as_bytes(), &mut out)?;
    Ok(out)
}

/// True when every byte is a hex digit.
pub fn is_hex(s: &[u8]) -> bool {
    s.iter().all(|&b| nibble(b).is_some())
}
