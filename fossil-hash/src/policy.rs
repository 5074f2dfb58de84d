use crate::digest::HashKind;

/// The repository-wide `hash-policy` setting (§6.7). Governs which family
/// is used to address *new* content; existing content is always accepted
/// under whichever family its stored hash length implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashPolicy {
    Sha1Only,
    Auto,
    Sha3Preferred,
    Sha3Only,
    ShunSha1,
}

impl HashPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "sha1-only" => Self::Sha1Only,
            "auto" => Self::Auto,
            "sha3-preferred" => Self::Sha3Preferred,
            "sha3-only" => Self::Sha3Only,
            "shun-sha1" => Self::ShunSha1,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1Only => "sha1-only",
            Self::Auto => "auto",
            Self::Sha3Preferred => "sha3-preferred",
            Self::Sha3Only => "sha3-only",
            Self::ShunSha1 => "shun-sha1",
        }
    }

    /// Which hash family new content should be stored under, given whether
    /// the repository already contains any SHA-1-addressed content.
    pub fn kind_for_new_content(self, repo_has_sha1_content: bool) -> HashKind {
        match self {
            Self::Sha1Only => HashKind::Sha1,
            Self::Auto => {
                if repo_has_sha1_content {
                    HashKind::Sha1
                } else {
                    HashKind::Sha3_256
                }
            }
            Self::Sha3Preferred | Self::Sha3Only | Self::ShunSha1 => HashKind::Sha3_256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_prefers_sha3_on_a_fresh_repository() {
        assert_eq!(
            HashPolicy::Auto.kind_for_new_content(false),
            HashKind::Sha3_256
        );
        assert_eq!(
            HashPolicy::Auto.kind_for_new_content(true),
            HashKind::Sha1
        );
    }

    #[test]
    fn round_trips_through_str() {
        for p in [
            HashPolicy::Sha1Only,
            HashPolicy::Auto,
            HashPolicy::Sha3Preferred,
            HashPolicy::Sha3Only,
            HashPolicy::ShunSha1,
        ] {
            assert_eq!(HashPolicy::parse(p.as_str()), Some(p));
        }
    }
}
