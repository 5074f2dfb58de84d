//! The Fossil binary delta format: a compact description of how to turn a
//! source byte sequence into a target one, used to store most blobs as
//! deltas against a nearby version rather than as raw content.
//!
//! Wire shape (§4.2 of the core design):
//!
//! ```text
//! delta      := size NL op* checksum ';'
//! size       := INTEGER
//! op         := copy | insert
//! copy       := INTEGER '@' INTEGER ','
//! insert     := INTEGER ':' TEXT
//! checksum   := INTEGER
//! INTEGER    := base64-style big-endian digits (see `varint`)
//! ```

mod checksum;
mod error;
mod index;
mod varint;

pub use error::Error;

use index::{ChunkIndex, CHUNK};

/// Build a delta that turns `source` into `target`.
///
/// A copy-op is only emitted when its encoded size is smaller than the
/// literal it would replace; otherwise the matched bytes are folded into
/// the surrounding literal run.
pub fn create(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(target.len() / 4 + 16);
    varint::put_int(target.len() as u32, &mut out);
    out.push(b'\n');

    let index = ChunkIndex::build(source);
    let mut literal_start = 0usize;
    let mut pos = 0usize;

    let flush_literal = |out: &mut Vec<u8>, lit: &[u8]| {
        if lit.is_empty() {
            return;
        }
        varint::put_int(lit.len() as u32, out);
        out.push(b':');
        out.extend_from_slice(lit);
    };

    while pos < target.len() {
        let candidate = if target.len() - pos >= CHUNK {
            index.best_match(target, pos)
        } else {
            None
        };

        match candidate {
            Some((src_off, len)) if copy_op_is_worth_it(len) => {
                flush_literal(&mut out, &target[literal_start..pos]);
                varint::put_int(len as u32, &mut out);
                out.push(b'@');
                varint::put_int(src_off as u32, &mut out);
                out.push(b',');
                pos += len;
                literal_start = pos;
            }
            _ => {
                pos += 1;
            }
        }
    }
    flush_literal(&mut out, &target[literal_start..]);

    varint::put_int(checksum::checksum(target), &mut out);
    out.push(b';');

    out
}

/// A copy-op `N@M,` costs at least 3 encoded bytes; only worth it once the
/// match is longer than a trivially small literal run would have cost.
fn copy_op_is_worth_it(match_len: usize) -> bool {
    match_len > 8
}

/// Apply `delta` (as produced by [`create`]) to `source`, reconstructing
/// the target bytes.
pub fn apply(source: &[u8], delta: &[u8]) -> Result<Vec<u8>, Error> {
    let mut pos = 0usize;
    let (declared_size, consumed) =
        varint::get_int(delta).ok_or(Error::InvalidSize(0))?;
    pos += consumed;
    if delta.get(pos) != Some(&b'\n') {
        return Err(Error::InvalidSeparator(pos));
    }
    pos += 1;

    let mut out = Vec::with_capacity(declared_size as usize);

    loop {
        let (n, consumed) = varint::get_int(&delta[pos..]).ok_or(Error::InvalidSize(pos))?;
        pos += consumed;
        match delta.get(pos) {
            Some(b'@') => {
                pos += 1;
                let (m, consumed) =
                    varint::get_int(&delta[pos..]).ok_or(Error::InvalidSize(pos))?;
                pos += consumed;
                if delta.get(pos) != Some(&b',') {
                    return Err(Error::InvalidSeparator(pos));
                }
                pos += 1;

                let (n, m) = (n as usize, m as usize);
                if m.checked_add(n).map(|end| end > source.len()).unwrap_or(true) {
                    return Err(Error::CopyOutOfBounds {
                        offset: m,
                        len: n,
                        source_len: source.len(),
                    });
                }
                out.extend_from_slice(&source[m..m + n]);
            }
            Some(b':') => {
                pos += 1;
                let n = n as usize;
                if pos + n > delta.len() {
                    return Err(Error::InvalidSize(pos));
                }
                out.extend_from_slice(&delta[pos..pos + n]);
                pos += n;
            }
            Some(b';') => {
                // `n` here is actually the checksum value; `;` is the
                // terminator that closes the whole delta.
                if out.len() != declared_size as usize {
                    return Err(Error::SizeMismatch {
                        declared: declared_size as usize,
                        produced: out.len(),
                    });
                }
                let actual = checksum::checksum(&out);
                if actual != n {
                    return Err(Error::ChecksumMismatch {
                        expected: n,
                        actual,
                    });
                }
                return Ok(out);
            }
            Some(_) => return Err(Error::InvalidOperator(pos)),
            None => return Err(Error::InvalidTerminator),
        }
    }
}

/// Read the declared target size out of a delta header without applying
/// it, used by the blob store to size-check before a full resolve.
pub fn output_size(delta: &[u8]) -> Result<usize, Error> {
    let (size, _) = varint::get_int(delta).ok_or(Error::InvalidSize(0))?;
    Ok(size as usize)
}
