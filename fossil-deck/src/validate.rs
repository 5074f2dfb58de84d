//! The card legality table (§3.2/§4.5): which cards a given artifact type
//! may, and must, carry. `require_type` is consulted by every `Deck`
//! setter/adder so illegal combinations are rejected at construction time
//! rather than only at serialize time.

use crate::deck::ArtifactType;
use crate::error::Error;
use crate::Deck;

struct Rule {
    required: &'static [char],
    optional: &'static [char],
}

fn rule(ty: ArtifactType) -> Rule {
    use ArtifactType::*;
    match ty {
        Checkin => Rule {
            required: &['C', 'D', 'U'],
            optional: &['B', 'F', 'P', 'Q', 'R', 'T'],
        },
        Cluster => Rule {
            required: &['M'],
            optional: &['T'],
        },
        Control => Rule {
            required: &['D', 'T', 'U'],
            optional: &['C'],
        },
        Wiki => Rule {
            required: &['D', 'L', 'U'],
            optional: &['C', 'P', 'W'],
        },
        Ticket => Rule {
            required: &['D', 'J', 'U'],
            optional: &['K'],
        },
        Attachment => Rule {
            required: &['D', 'N', 'A'],
            optional: &['C', 'U', 'K'],
        },
        Technote => Rule {
            required: &['D', 'U', 'W'],
            optional: &['C', 'T', 'N'],
        },
        Forum => Rule {
            required: &['D', 'U', 'W'],
            optional: &['G', 'H', 'N'],
        },
    }
}

/// Rejects `card` outright if `ty` never permits it, whether as required
/// or optional. Called from every `Deck::add_*`/`set_*` method.
pub(crate) fn require_type(ty: ArtifactType, card: char) -> Result<(), Error> {
    let r = rule(ty);
    if r.required.contains(&card) || r.optional.contains(&card) {
        Ok(())
    } else {
        Err(Error::Type(card, ty))
    }
}

/// Full structural check run just before serialization: every required
/// card present, and the F-card list free of duplicate paths.
pub fn validate(deck: &Deck) -> Result<(), Error> {
    let r = rule(deck.artifact_type);
    for &card in r.required {
        let present = match card {
            'B' => deck.baseline.is_some(),
            'C' => deck.comment.is_some(),
            'D' => deck.date.is_some(),
            'F' => !deck.f_cards.is_empty(),
            'J' => !deck.j_cards.is_empty(),
            'L' => deck.wiki_title.is_some(),
            'M' => !deck.m_cards.is_empty(),
            'N' => deck.attach_name.is_some() || deck.forum_mimetype.is_some(),
            'A' => deck.attach_target.is_some(),
            'P' => !deck.p_cards.is_empty(),
            'Q' => !deck.q_cards.is_empty(),
            'R' => deck.r_card.is_some(),
            'T' => !deck.t_cards.is_empty(),
            'U' => deck.user.is_some(),
            'W' => deck.wiki_content.is_some(),
            'K' => deck.ticket_uuid.is_some(),
            other => return Err(Error::Type(other, deck.artifact_type)),
        };
        if !present {
            return Err(Error::MissingRequired(card));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for f in &deck.f_cards {
        if !seen.insert(f.path.as_str()) {
            return Err(Error::DuplicatePath(f.path.clone()));
        }
    }

    Ok(())
}

pub(crate) fn infer_type(
    has_m: bool,
    has_w_and_l: bool,
    has_j: bool,
    has_attach: bool,
    has_t_only: bool,
    has_c_or_f: bool,
) -> Option<ArtifactType> {
    if has_m {
        Some(ArtifactType::Cluster)
    } else if has_attach {
        Some(ArtifactType::Attachment)
    } else if has_j {
        Some(ArtifactType::Ticket)
    } else if has_w_and_l {
        Some(ArtifactType::Wiki)
    } else if has_c_or_f {
        Some(ArtifactType::Checkin)
    } else if has_t_only {
        Some(ArtifactType::Control)
    } else {
        None
    }
}
