use crate::cards::{FCard, JCard, Permission, QCard, QKind, TCard, TagSign};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    Checkin,
    Cluster,
    Control,
    Wiki,
    Ticket,
    Attachment,
    Technote,
    Forum,
}

/// A parsed, structured control artifact.
///
/// Follows the teacher's preference for a small number of strongly-typed
/// aggregate records over many per-kind types: every field below is
/// optional or an (initially empty) list, and `validate` enforces which
/// combination of populated fields is legal for `artifact_type`.
#[derive(Debug, Clone)]
pub struct Deck {
    pub artifact_type: ArtifactType,

    // checkin / technote
    pub baseline: Option<String>,
    pub comment: Option<String>,
    pub date: Option<String>,
    pub f_cards: Vec<FCard>,
    pub p_cards: Vec<String>,
    pub q_cards: Vec<QCard>,
    pub r_card: Option<String>,
    pub t_cards: Vec<TCard>,
    pub user: Option<String>,
    pub branch_color: Option<String>,
    pub close_leaf: bool,

    // cluster
    pub m_cards: Vec<String>,

    // wiki
    pub wiki_title: Option<String>,
    pub wiki_parent: Option<String>,
    pub wiki_content: Option<Vec<u8>>,

    // ticket
    pub ticket_uuid: Option<String>,
    pub j_cards: Vec<JCard>,

    // attachment
    pub attach_name: Option<String>,
    pub attach_target: Option<String>,
    pub attach_src: Option<String>,

    // forum
    pub forum_thread_root: Option<String>,
    pub forum_in_reply_to: Option<String>,
    pub forum_mimetype: Option<String>,

    /// Set once the deck has been hashed (after `save` or after parsing a
    /// blob whose hash the caller already knows).
    pub self_hash: Option<String>,

    /// `true` once this deck was produced by `Deck::parse`, meaning its
    /// F-card list is exactly what was on the wire (no baseline merge
    /// applied yet).
    pub(crate) is_delta_manifest: bool,
}

impl Deck {
    pub fn new(artifact_type: ArtifactType) -> Self {
        Self {
            artifact_type,
            baseline: None,
            comment: None,
            date: None,
            f_cards: Vec::new(),
            p_cards: Vec::new(),
            q_cards: Vec::new(),
            r_card: None,
            t_cards: Vec::new(),
            user: None,
            branch_color: None,
            close_leaf: false,
            m_cards: Vec::new(),
            wiki_title: None,
            wiki_parent: None,
            wiki_content: None,
            ticket_uuid: None,
            j_cards: Vec::new(),
            attach_name: None,
            attach_target: None,
            attach_src: None,
            forum_thread_root: None,
            forum_in_reply_to: None,
            forum_mimetype: None,
            self_hash: None,
            is_delta_manifest: false,
        }
    }

    pub fn is_delta_manifest(&self) -> bool {
        self.artifact_type == ArtifactType::Checkin && self.baseline.is_some()
    }

    /// Add (append) an F-card. Keeps no ordering promise by itself —
    /// `unshuffle` is what sorts the list before serialization.
    pub fn add_f_card(&mut self, card: FCard) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'F')?;
        self.f_cards.push(card);
        Ok(())
    }

    pub fn add_p_card(&mut self, hash: String) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'P')?;
        self.p_cards.push(hash);
        Ok(())
    }

    pub fn add_t_card(&mut self, card: TCard) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'T')?;
        self.t_cards.push(card);
        Ok(())
    }

    pub fn add_q_card(&mut self, card: QCard) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'Q')?;
        self.q_cards.push(card);
        Ok(())
    }

    pub fn add_j_card(&mut self, card: JCard) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'J')?;
        self.j_cards.push(card);
        Ok(())
    }

    pub fn add_m_card(&mut self, hash: String) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'M')?;
        self.m_cards.push(hash);
        Ok(())
    }

    pub fn set_comment(&mut self, text: String) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'C')?;
        self.comment = Some(text);
        Ok(())
    }

    pub fn set_date(&mut self, date: String) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'D')?;
        self.date = Some(date);
        Ok(())
    }

    pub fn set_user(&mut self, user: String) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'U')?;
        self.user = Some(user);
        Ok(())
    }

    pub fn set_baseline(&mut self, hash: String) -> Result<(), Error> {
        crate::validate::require_type(self.artifact_type, 'B')?;
        self.baseline = Some(hash);
        Ok(())
    }

    /// F-card lookup honoring delta-manifest baseline fallback.
    ///
    /// Binary-searches this deck's own (sorted) F-card list; on a miss,
    /// asks `loader` for the baseline manifest's raw bytes, parses it,
    /// and searches there. Name comparisons can be made case-insensitive
    /// by the caller via `case_insensitive`.
    pub fn find_file(
        &self,
        path: &str,
        case_insensitive: bool,
        loader: &impl BaselineLoader,
    ) -> Result<Option<FCard>, Error> {
        let cmp = |a: &str, b: &str| {
            if case_insensitive {
                a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
            } else {
                a.cmp(b)
            }
        };

        if let Ok(idx) = self.f_cards.binary_search_by(|f| cmp(&f.path, path)) {
            return Ok(Some(self.f_cards[idx].clone()));
        }

        if let Some(baseline_hash) = &self.baseline {
            if let Some(bytes) = loader.load_baseline_bytes(baseline_hash) {
                let baseline = crate::parse::parse(&bytes)?;
                if let Ok(idx) = baseline
                    .f_cards
                    .binary_search_by(|f| cmp(&f.path, path))
                {
                    return Ok(Some(baseline.f_cards[idx].clone()));
                }
            }
        }

        Ok(None)
    }

    /// All files visible at this version: this deck's own (non-null)
    /// F-cards plus, for a delta manifest, whatever the baseline has that
    /// this deck didn't touch.
    pub fn effective_files(&self, loader: &impl BaselineLoader) -> Result<Vec<FCard>, Error> {
        if self.baseline.is_none() {
            return Ok(self
                .f_cards
                .iter()
                .filter(|f| f.hash.is_some())
                .cloned()
                .collect());
        }

        let mut merged: std::collections::BTreeMap<String, FCard> = std::collections::BTreeMap::new();
        if let Some(bytes) = loader.load_baseline_bytes(self.baseline.as_ref().unwrap()) {
            let baseline = crate::parse::parse(&bytes)?;
            for f in baseline.effective_files(loader)? {
                merged.insert(f.path.clone(), f);
            }
        }
        for f in &self.f_cards {
            match &f.hash {
                Some(_) => {
                    merged.insert(f.path.clone(), f.clone());
                }
                None => {
                    merged.remove(&f.path);
                }
            }
        }
        Ok(merged.into_values().collect())
    }
}

pub trait BaselineLoader {
    fn load_baseline_bytes(&self, hash: &str) -> Option<Vec<u8>>;
}

/// A loader that never resolves anything; useful when the caller knows no
/// delta manifest is in play.
pub struct NoBaseline;

impl BaselineLoader for NoBaseline {
    fn load_baseline_bytes(&self, _hash: &str) -> Option<Vec<u8>> {
        None
    }
}

pub(crate) fn permission_token(p: Permission) -> &'static str {
    p.as_str()
}

pub(crate) fn tag_sign_char(sign: TagSign) -> char {
    sign.as_char()
}

pub(crate) fn q_kind_char(kind: QKind) -> char {
    match kind {
        QKind::CherryPick => '+',
        QKind::Backout => '-',
    }
}
