//! Replay a decoded delta against its base.

use super::{Delta, DeltaChange};
use crate::PackError;

/// Rebuild the target bytes described by `delta` from `base`.
///
/// `base` must be exactly `delta.expected_source_length` bytes. Every copy
/// is bounds-checked against it.
pub fn apply_delta(base: &[u8], delta: &Delta) -> Result<Vec<u8>, PackError> {
    if base.len() != delta.expected_source_length {
        return Err(PackError::DeltaSourceSize {
            expected: delta.expected_source_length,
            actual: base.len(),
        });
    }

    let mut output = Vec::with_capacity(delta.target_length);
    for change in &delta.changes {
        match change {
            DeltaChange::Insert(bytes) => output.extend_from_slice(bytes),
            DeltaChange::Copy {
                source_offset,
                length,
            } => {
                if *length == 0 {
                    return Err(PackError::ZeroLengthCopy);
                }
                let span = source_offset
                    .checked_add(*length)
                    .and_then(|end| base.get(*source_offset..end))
                    .ok_or(PackError::DeltaCopyOutOfBounds {
                        offset: *source_offset,
                        length: *length,
                        base_len: base.len(),
                    })?;
                output.extend_from_slice(span);
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitwire_hash::ObjectId;

    fn delta(source_len: usize, changes: Vec<DeltaChange>) -> Delta {
        let target_length = changes
            .iter()
            .map(|c| match c {
                DeltaChange::Insert(b) => b.len(),
                DeltaChange::Copy { length, .. } => *length,
            })
            .sum();
        Delta {
            parent: ObjectId::ZERO,
            expected_source_length: source_len,
            target_length,
            changes,
        }
    }

    #[test]
    fn copy_then_insert() {
        let base = b"Hello, World!";
        let d = delta(
            base.len(),
            vec![
                DeltaChange::Copy {
                    source_offset: 0,
                    length: 7,
                },
                DeltaChange::Insert(b"Rust!".to_vec()),
            ],
        );
        assert_eq!(apply_delta(base, &d).unwrap(), b"Hello, Rust!");
    }

    #[test]
    fn changes_replay_in_order() {
        let base = b"abcdef";
        let d = delta(
            6,
            vec![
                DeltaChange::Copy {
                    source_offset: 3,
                    length: 3,
                },
                DeltaChange::Insert(b"-".to_vec()),
                DeltaChange::Copy {
                    source_offset: 0,
                    length: 3,
                },
            ],
        );
        assert_eq!(apply_delta(base, &d).unwrap(), b"def-abc");
    }

    #[test]
    fn base_length_must_match() {
        let d = delta(10, vec![DeltaChange::Insert(b"x".to_vec())]);
        assert!(matches!(
            apply_delta(b"short", &d),
            Err(PackError::DeltaSourceSize {
                expected: 10,
                actual: 5
            })
        ));
    }

    #[test]
    fn out_of_bounds_copy_is_an_error() {
        let d = delta(
            4,
            vec![DeltaChange::Copy {
                source_offset: 2,
                length: 5,
            }],
        );
        assert!(matches!(
            apply_delta(b"abcd", &d),
            Err(PackError::DeltaCopyOutOfBounds {
                offset: 2,
                length: 5,
                base_len: 4
            })
        ));

        let overflow = delta(
            4,
            vec![DeltaChange::Copy {
                source_offset: usize::MAX,
                length: 2,
            }],
        );
        assert!(apply_delta(b"abcd", &overflow).is_err());
    }

    #[test]
    fn zero_length_copy_is_an_error() {
        let d = delta(
            4,
            vec![DeltaChange::Copy {
                source_offset: 0,
                length: 0,
            }],
        );
        assert!(matches!(apply_delta(b"abcd", &d), Err(PackError::ZeroLengthCopy)));
    }

    #[test]
    fn empty_delta_yields_empty_target() {
        assert!(apply_delta(b"", &delta(0, Vec::new())).unwrap().is_empty());
    }
}
