//! Produce delta bodies between two buffers.
//!
//! Indexes fixed-size blocks of the source, then walks the target: a
//! block hit becomes a copy extended as far as the bytes keep matching,
//! everything else becomes inserts.

use std::collections::HashMap;

use super::{encode_copy, encode_insert, write_varint, MAX_INSERT};

const BLOCK_SIZE: usize = 16;

/// Compute a raw delta body turning `source` into `target`.
pub fn compute_delta(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = write_varint(source.len());
    out.extend_from_slice(&write_varint(target.len()));

    let index = block_index(source);
    let mut pending = Vec::new();
    let mut pos = 0;

    while pos < target.len() {
        let hit = target
            .get(pos..pos + BLOCK_SIZE)
            .and_then(|block| index.get(block))
            .copied();
        if let Some(src_offset) = hit {
            flush_inserts(&mut out, &mut pending);
            let len = match_len(source, src_offset, target, pos);
            encode_copy(&mut out, src_offset, len);
            pos += len;
            continue;
        }

        pending.push(target[pos]);
        pos += 1;
        if pending.len() == MAX_INSERT {
            flush_inserts(&mut out, &mut pending);
        }
    }
    flush_inserts(&mut out, &mut pending);
    out
}

fn block_index(source: &[u8]) -> HashMap<&[u8], usize> {
    let mut index = HashMap::new();
    for (i, block) in source.chunks_exact(BLOCK_SIZE).enumerate() {
        index.entry(block).or_insert(i * BLOCK_SIZE);
    }
    index
}

fn match_len(source: &[u8], src: usize, target: &[u8], tgt: usize) -> usize {
    source[src..]
        .iter()
        .zip(&target[tgt..])
        .take_while(|(a, b)| a == b)
        .count()
}

fn flush_inserts(out: &mut Vec<u8>, pending: &mut Vec<u8>) {
    for chunk in pending.chunks(MAX_INSERT) {
        encode_insert(out, chunk);
    }
    pending.clear();
}
