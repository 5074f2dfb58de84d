use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("syntax error at line {0}: {1}")]
    Syntax(usize, String),

    #[error("card {0} is not permitted on a {1:?} artifact")]
    Type(char, crate::ArtifactType),

    #[error("required card {0} is missing")]
    MissingRequired(char),

    #[error("card {0} field out of range: {1}")]
    Range(char, String),

    #[error("could not infer an artifact type from the cards present")]
    UnknownType,

    #[error("Z-card hash mismatch")]
    ZCardMismatch,

    #[error("R-card checksum mismatch")]
    RCardMismatch,

    #[error("duplicate path in F-card list: {0}")]
    DuplicatePath(String),
}
