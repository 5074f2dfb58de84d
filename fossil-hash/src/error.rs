use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("zlib: {0}")]
    Zlib(#[from] std::io::Error),

    #[error("hex decode: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("hash length {0} does not correspond to a known hash kind")]
    UnknownHashLen(usize),

    #[error("sha1 collision attack pattern detected in input")]
    Sha1CollisionDetected,
}
