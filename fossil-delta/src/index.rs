//! A chunk index over the source buffer used to find candidate copy
//! offsets while building a delta.
//!
//! Every 16-byte window of the source is hashed and recorded; `create`
//! then looks up the target's own windows in this index and extends any
//! hit into the longest possible match.

use std::collections::HashMap;

pub const CHUNK: usize = 16;

pub struct ChunkIndex<'a> {
    source: &'a [u8],
    by_hash: HashMap<u64, Vec<u32>>,
}

impl<'a> ChunkIndex<'a> {
    pub fn build(source: &'a [u8]) -> Self {
        let mut by_hash: HashMap<u64, Vec<u32>> = HashMap::new();
        if source.len() >= CHUNK {
            for offset in 0..=(source.len() - CHUNK) {
                let h = hash_chunk(&source[offset..offset + CHUNK]);
                by_hash.entry(h).or_default().push(offset as u32);
            }
        }
        Self { source, by_hash }
    }

    /// Find the longest match in `source` for the window starting at
    /// `target[pos..]`, extended left and right around the matched chunk.
    /// Returns `(source_offset, match_len)`.
    pub fn best_match(&self, target: &[u8], pos: usize) -> Option<(usize, usize)> {
        if pos + CHUNK > target.len() {
            return None;
        }
        let window = &target[pos..pos + CHUNK];
        let h = hash_chunk(window);
        let candidates = self.by_hash.get(&h)?;

        let mut best: Option<(usize, usize)> = None;
        for &cand in candidates {
            let cand = cand as usize;
            if &self.source[cand..cand + CHUNK] != window {
                continue; // hash collision
            }

            let mut left = 0usize;
            while left < cand && left < pos && self.source[cand - left - 1] == target[pos - left - 1] {
                left += 1;
            }

            let mut right = CHUNK;
            while cand + right < self.source.len()
                && pos + right < target.len()
                && self.source[cand + right] == target[pos + right]
            {
                right += 1;
            }

            let len = left + right;
            let src_start = cand - left;
            if best.map(|(_, blen)| len > blen).unwrap_or(true) {
                best = Some((src_start, len));
            }
        }
        best
    }
}

fn hash_chunk(bytes: &[u8]) -> u64 {
    // FNV-1a, good enough to bucket 16-byte windows; correctness never
    // relies on it (every candidate is verified byte-for-byte).
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_match_extended_both_ways() {
        let source = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let target = b"xxxx456789abcdefghijklmnopqrstuvwxxxxxx";
        let idx = ChunkIndex::build(source);
        // target[4..] starts with "456789abcdefghij" (16 bytes) which
        // matches source at offset 4.
        let (off, len) = idx.best_match(target, 4).unwrap();
        assert_eq!(off, 4);
        assert!(len >= CHUNK);
    }
}
