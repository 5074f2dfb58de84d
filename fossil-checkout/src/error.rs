use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] fossil_storage::Error),
    #[error(transparent)]
    Deck(#[from] fossil_deck::Error),
    #[error(transparent)]
    Crosslink(#[from] fossil_crosslink::Error),
    #[error(transparent)]
    Path(#[from] fossil_path::Error),
    #[error(transparent)]
    Core(#[from] fossil_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("nothing to do")]
    Noop,
    #[error("merge conflict in {0}")]
    Conflict(String),
    #[error("path escapes the checkout root: {0}")]
    PathEscape(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Misuse(String),
}
