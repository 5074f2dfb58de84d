use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] fossil_storage::Error),
    #[error("no path found between rid {from} and rid {to}")]
    NoPath { from: i64, to: i64 },
}
