use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("sqlite: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("hash/codec: {0}")]
    Hash(#[from] fossil_hash::Error),

    #[error("delta: {0}")]
    Delta(#[from] fossil_delta::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found")]
    NotFound,

    #[error("{0} is already checked out for statement reuse")]
    Misuse(String),

    #[error("blob {0} is a phantom (content not yet present)")]
    Phantom(i64),

    #[error("ambiguous hash prefix {0:?} matches {1} blobs")]
    Ambiguous(String, usize),

    #[error("consistency: {0}")]
    Consistency(String),

    #[error("refusing to deltify: {0}")]
    DeltifyRefused(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
