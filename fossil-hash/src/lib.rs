//! Hash algorithms, zlib framing and fossilize escaping.
//!
//! The lowest layer of the core: every other crate in the workspace goes
//! through here to turn bytes into addresses, to compress blobs for
//! storage, or to escape text into a single card line.

mod digest;
mod error;
mod fossilize;
mod hasher;
mod policy;
mod zlib;

pub use digest::{Digest, HashKind};
pub use error::Error;
pub use fossilize::{defossilize, fossilize};
pub use hasher::{Md5Hasher, Sha1Hasher, Sha3Hasher};
pub use policy::HashPolicy;
pub use zlib::{compress, decompress, looks_compressed};

/// Partial-hash lookup result shape shared with `fossil-storage`; kept
/// here since it's purely a function of hash-family string lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMatch {
    Exact(HashKind),
    /// `prefix.len()` is a valid abbreviation length (>= 4).
    Prefix,
    TooShort,
}

/// Classify `candidate` as either a full hash of a known kind or a usable
/// prefix abbreviation (§4.1, §8 S6).
pub fn classify_hash_str(candidate: &str) -> HashMatch {
    if let Some(kind) = HashKind::from_hex_len(candidate.len()) {
        return HashMatch::Exact(kind);
    }
    if candidate.len() >= 4 && candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
        HashMatch::Prefix
    } else {
        HashMatch::TooShort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_full_and_partial_hashes() {
        let sha1 = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
        assert_eq!(
            classify_hash_str(sha1),
            HashMatch::Exact(HashKind::Sha1)
        );
        assert_eq!(classify_hash_str("beef"), HashMatch::Prefix);
        assert_eq!(classify_hash_str("be"), HashMatch::TooShort);
    }
}
