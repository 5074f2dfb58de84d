use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] fossil_storage::Error),
    #[error(transparent)]
    Deck(#[from] fossil_deck::Error),
    #[error(transparent)]
    Core(#[from] fossil_core::Error),
    #[error("crosslink consistency check failed: {0}")]
    Consistency(String),
    #[error("malformed date card: {0}")]
    BadDate(String),
}
