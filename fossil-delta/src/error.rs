use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("delta: expected a separator ('@', ',', ':' or ';') at offset {0}")]
    InvalidSeparator(usize),

    #[error("delta: malformed size field at offset {0}")]
    InvalidSize(usize),

    #[error("delta: unrecognized operator at offset {0}")]
    InvalidOperator(usize),

    #[error("delta: missing trailing ';' terminator")]
    InvalidTerminator,

    #[error("delta: produced {produced} bytes but header declared {declared}")]
    SizeMismatch { declared: usize, produced: usize },

    #[error("delta: trailing checksum mismatch (expected {expected:08x}, got {actual:08x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("delta: copy source offset {offset} + length {len} exceeds source size {source_len}")]
    CopyOutOfBounds {
        offset: usize,
        len: usize,
        source_len: usize,
    },
}
