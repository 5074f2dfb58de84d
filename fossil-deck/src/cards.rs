//! Typed shapes of the individual cards. A [`crate::Deck`] holds one of
//! these per card kind it carries; the set actually populated is what the
//! legality table in `validate.rs` checks against the artifact's type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Regular,
    Executable,
    Symlink,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Regular => "",
            Permission::Executable => "x",
            Permission::Symlink => "l",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "x" => Permission::Executable,
            "l" => Permission::Symlink,
            _ => Permission::Regular,
        }
    }
}

/// One F-card: a file entry in a checkin manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FCard {
    pub path: String,
    /// `None` marks a deletion in a delta manifest.
    pub hash: Option<String>,
    pub perm: Permission,
    /// Present when this entry is a rename of a baseline entry.
    pub prior_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSign {
    Add,
    Cancel,
    Propagate,
}

impl TagSign {
    pub fn as_char(self) -> char {
        match self {
            TagSign::Add => '+',
            TagSign::Cancel => '-',
            TagSign::Propagate => '*',
        }
    }

    pub fn parse(c: char) -> Option<Self> {
        match c {
            '+' => Some(TagSign::Add),
            '-' => Some(TagSign::Cancel),
            '*' => Some(TagSign::Propagate),
            _ => None,
        }
    }
}

/// One T-card: a tag application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TCard {
    pub sign: TagSign,
    pub name: String,
    /// The artifact the tag applies to; `None` means "this artifact"
    /// (fossil's `*` self-reference shorthand).
    pub target: Option<String>,
    pub value: Option<String>,
}

/// One Q-card: a cherry-pick or backout marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QKind {
    CherryPick,
    Backout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QCard {
    pub kind: QKind,
    pub hash: String,
}

/// One J-card: a ticket (or wiki) field assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JCard {
    pub name: String,
    pub append: bool,
    pub value: String,
}
