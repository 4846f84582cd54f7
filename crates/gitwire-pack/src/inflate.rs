//! Zlib inflation for pack entries.
//!
//! Each entry is its own zlib stream followed directly by the next entry's
//! header, so inflation must consume exactly the compressed bytes and no
//! more. Working on a [`BufRead`] lets us hand back the unused tail of the
//! buffer.

use std::cell::RefCell;
use std::io::BufRead;

use flate2::{Decompress, FlushDecompress, Status};

use crate::PackError;

/// Upper bound on pooled inflaters kept per thread.
const MAX_POOLED: usize = 4;

/// Cap on up-front allocation; the declared size comes off the wire.
const INITIAL_CAPACITY_LIMIT: usize = 1 << 20;

thread_local! {
    static INFLATERS: RefCell<Vec<Decompress>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` with a reset zlib inflater borrowed from a per-thread pool.
///
/// The inflater goes back to the pool when `f` returns and must not be
/// kept beyond it.
pub fn with_inflater<T>(f: impl FnOnce(&mut Decompress) -> T) -> T {
    let mut inflater = INFLATERS
        .with(|pool| pool.borrow_mut().pop())
        .unwrap_or_else(|| Decompress::new(true));
    let result = f(&mut inflater);
    inflater.reset(true);
    INFLATERS.with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() < MAX_POOLED {
            pool.push(inflater);
        }
    });
    result
}

/// Inflate one zlib stream from `reader` that must expand to exactly `size` bytes.
///
/// On success the reader is positioned on the first byte after the stream,
/// including its Adler-32 trailer.
pub fn inflate_exact<R: BufRead>(reader: &mut R, size: usize) -> Result<Vec<u8>, PackError> {
    with_inflater(|inflater| {
        let mut out = Vec::with_capacity(size.min(INITIAL_CAPACITY_LIMIT) + 1);
        loop {
            if out.len() == out.capacity() {
                out.reserve((size + 1 - out.len()).min(INITIAL_CAPACITY_LIMIT));
            }

            let input = reader.fill_buf()?;
            let at_eof = input.is_empty();
            let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
            let status = inflater
                .decompress_vec(input, &mut out, FlushDecompress::None)
                .map_err(|e| PackError::Decompress(e.to_string()))?;
            let consumed = (inflater.total_in() - in_before) as usize;
            let produced = inflater.total_out() - out_before;
            reader.consume(consumed);

            if out.len() > size {
                return Err(PackError::SizeMismatch {
                    expected: size as u64,
                    actual: out.len() as u64,
                });
            }
            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError if consumed == 0 && produced == 0 => {
                    if at_eof {
                        return Err(PackError::Truncated("compressed object data"));
                    }
                    return Err(PackError::Decompress("inflate made no progress".into()));
                }
                Status::Ok | Status::BufError => {}
            }
        }

        if out.len() != size {
            return Err(PackError::SizeMismatch {
                expected: size as u64,
                actual: out.len() as u64,
            });
        }
        Ok(out)
    })
}
