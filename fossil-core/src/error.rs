use thiserror::Error;

/// The engine's single closed error enumeration (§7). Every public
/// operation across the workspace returns `Result<T, Error>`; lower
/// layers are folded in via `#[from]` rather than boxed, so a caller
/// can always match exhaustively on [`ErrorKind`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("out of memory")]
    Oom,
    #[error("misuse: {0}")]
    Misuse(String),
    #[error("value out of range: {0}")]
    Range(String),
    #[error("access denied: {0}")]
    Access(String),
    #[error("not a repository")]
    NotARepo,
    #[error("not a checkout")]
    NotACheckout,
    #[error("repository schema version {found} is incompatible with {expected}")]
    RepoVersion { found: u32, expected: u32 },
    #[error("checkout fingerprint does not match repository")]
    RepoMismatch,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("operation is a no-op")]
    Noop,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("refusing to diff binary content")]
    DiffBinary,
    #[error("diff contains only whitespace changes")]
    DiffWhitespaceOnly,

    #[error(transparent)]
    Hash(#[from] fossil_hash::Error),
    #[error(transparent)]
    Delta(#[from] fossil_delta::Error),
    #[error(transparent)]
    Storage(#[from] fossil_storage::Error),
    #[error(transparent)]
    Deck(#[from] fossil_deck::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A cheap, `Copy` classification of an [`Error`], independent of its
/// payload. This is what gets latched onto [`crate::Context`]'s error
/// state — a caller inspecting "what kind of thing went wrong" shouldn't
/// need to hold onto (or re-match) the full error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Oom,
    Misuse,
    Range,
    Access,
    Io,
    NotFound,
    AlreadyExists,
    Consistency,
    NotARepo,
    NotACheckout,
    RepoVersion,
    RepoMismatch,
    ChecksumMismatch,
    Db,
    Type,
    Syntax,
    Ambiguous,
    Phantom,
    Conflict,
    Noop,
    Unsupported,
    DiffBinary,
    DiffWhitespaceOnly,
    DeltaInvalidSeparator,
    DeltaInvalidSize,
    DeltaInvalidOperator,
    DeltaInvalidTerminator,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Oom => ErrorKind::Oom,
            Error::Misuse(_) => ErrorKind::Misuse,
            Error::Range(_) => ErrorKind::Range,
            Error::Access(_) => ErrorKind::Access,
            Error::NotARepo => ErrorKind::NotARepo,
            Error::NotACheckout => ErrorKind::NotACheckout,
            Error::RepoVersion { .. } => ErrorKind::RepoVersion,
            Error::RepoMismatch => ErrorKind::RepoMismatch,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Noop => ErrorKind::Noop,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::DiffBinary => ErrorKind::DiffBinary,
            Error::DiffWhitespaceOnly => ErrorKind::DiffWhitespaceOnly,
            Error::Io(_) => ErrorKind::Io,

            Error::Hash(e) => match e {
                fossil_hash::Error::Zlib(_) => ErrorKind::Io,
                fossil_hash::Error::Hex(_) => ErrorKind::Syntax,
                fossil_hash::Error::UnknownHashLen(_) => ErrorKind::Range,
                fossil_hash::Error::Sha1CollisionDetected => ErrorKind::ChecksumMismatch,
            },

            Error::Delta(e) => match e {
                fossil_delta::Error::InvalidSeparator(_) => ErrorKind::DeltaInvalidSeparator,
                fossil_delta::Error::InvalidSize(_) => ErrorKind::DeltaInvalidSize,
                fossil_delta::Error::InvalidOperator(_) => ErrorKind::DeltaInvalidOperator,
                fossil_delta::Error::InvalidTerminator => ErrorKind::DeltaInvalidTerminator,
                fossil_delta::Error::SizeMismatch { .. } => ErrorKind::DeltaInvalidSize,
                fossil_delta::Error::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
                fossil_delta::Error::CopyOutOfBounds { .. } => ErrorKind::Consistency,
            },

            Error::Storage(e) => match e {
                fossil_storage::Error::Db(_) => ErrorKind::Db,
                fossil_storage::Error::Hash(_) => ErrorKind::ChecksumMismatch,
                fossil_storage::Error::Delta(_) => ErrorKind::Consistency,
                fossil_storage::Error::Io(_) => ErrorKind::Io,
                fossil_storage::Error::NotFound => ErrorKind::NotFound,
                fossil_storage::Error::Misuse(_) => ErrorKind::Misuse,
                fossil_storage::Error::Phantom(_) => ErrorKind::Phantom,
                fossil_storage::Error::Ambiguous(_, _) => ErrorKind::Ambiguous,
                fossil_storage::Error::Consistency(_) => ErrorKind::Consistency,
                fossil_storage::Error::DeltifyRefused(_) => ErrorKind::Consistency,
            },

            Error::Deck(e) => match e {
                fossil_deck::Error::Syntax(_, _) => ErrorKind::Syntax,
                fossil_deck::Error::Type(_, _) => ErrorKind::Type,
                fossil_deck::Error::MissingRequired(_) => ErrorKind::Type,
                fossil_deck::Error::Range(_, _) => ErrorKind::Range,
                fossil_deck::Error::UnknownType => ErrorKind::Type,
                fossil_deck::Error::ZCardMismatch => ErrorKind::ChecksumMismatch,
                fossil_deck::Error::RCardMismatch => ErrorKind::ChecksumMismatch,
                fossil_deck::Error::DuplicatePath(_) => ErrorKind::Consistency,
            },
        }
    }
}
