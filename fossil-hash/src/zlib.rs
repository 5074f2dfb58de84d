//! zlib framing used for raw blob storage: a 4-byte big-endian uncompressed
//! length prefix followed by a standard zlib stream.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::Error;

const ZLIB_MAGIC: [u8; 2] = [0x78, 0x9c];

/// Compress `content`, prefixing the result with `content.len()` as a
/// 4-byte big-endian integer.
pub fn compress(content: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(content.len() / 2 + 8);
    out.extend_from_slice(&(content.len() as u32).to_be_bytes());

    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(content)?;
    out.extend(enc.finish()?);
    Ok(out)
}

/// Inverse of [`compress`]: strips the size prefix and inflates the rest,
/// verifying the declared size matches what was produced.
pub fn decompress(framed: &[u8]) -> Result<Vec<u8>, Error> {
    if framed.len() < 4 {
        return Err(Error::Zlib(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "zlib frame shorter than size prefix",
        )));
    }
    let declared = u32::from_be_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize;
    let mut dec = ZlibDecoder::new(&framed[4..]);
    let mut out = Vec::with_capacity(declared);
    dec.read_to_end(&mut out)?;
    if out.len() != declared {
        return Err(Error::Zlib(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "zlib frame declared {declared} bytes but produced {}",
                out.len()
            ),
        )));
    }
    Ok(out)
}

/// Probe whether `raw` looks like a zlib-framed blob (size prefix followed
/// by the zlib magic bytes), without doing the (possibly expensive)
/// inflate.
pub fn looks_compressed(raw: &[u8]) -> bool {
    raw.len() >= 6 && raw[4] == ZLIB_MAGIC[0] && (raw[5] & 0x0f) == (ZLIB_MAGIC[1] & 0x0f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let content = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let framed = compress(&content).unwrap();
        assert!(looks_compressed(&framed));
        let out = decompress(&framed).unwrap();
        assert_eq!(out, content);
    }

    #[test]
    fn rejects_truncated_frame() {
        let content = b"short";
        let mut framed = compress(content).unwrap();
        framed.truncate(framed.len() - 2);
        assert!(decompress(&framed).is_err());
    }
}
