//! Canonical on-disk serialization (§3.2, §8 properties 1-2): cards are
//! unshuffled into a fixed letter order, list-valued cards are sorted
//! (parents are the one list whose order is meaningful and preserved),
//! and the artifact is closed with an `R`-card (checkin file-list digest)
//! and a trailing `Z`-card (whole-artifact digest) so that
//! `parse(serialize(d)) == d` bit-for-bit.

use crate::cards::{FCard, JCard, Permission, QCard, TCard};
use crate::deck::{permission_token, q_kind_char, tag_sign_char, ArtifactType, Deck};
use crate::error::Error;
use fossil_hash::{fossilize, HashKind, Md5Hasher, Sha1Hasher, Sha3Hasher};

fn write_token(out: &mut Vec<u8>, raw: &str) {
    out.extend_from_slice(&fossilize(raw.as_bytes()));
}

fn write_line(out: &mut Vec<u8>, card: char, fields: &[&str]) {
    out.push(card as u8);
    for f in fields {
        out.push(b' ');
        write_token(out, f);
    }
    out.push(b'\n');
}

fn sorted_f_cards(deck: &Deck) -> Vec<FCard> {
    let mut v = deck.f_cards.clone();
    v.sort_by(|a, b| a.path.cmp(&b.path));
    v
}

fn sorted_j_cards(deck: &Deck) -> Vec<JCard> {
    let mut v = deck.j_cards.clone();
    v.sort_by(|a, b| a.name.cmp(&b.name));
    v
}

fn sorted_m_cards(deck: &Deck) -> Vec<String> {
    let mut v = deck.m_cards.clone();
    v.sort();
    v
}

fn sorted_q_cards(deck: &Deck) -> Vec<QCard> {
    let mut v = deck.q_cards.clone();
    v.sort_by(|a, b| a.hash.cmp(&b.hash));
    v
}

fn sorted_t_cards(deck: &Deck) -> Vec<TCard> {
    let mut v = deck.t_cards.clone();
    v.sort_by(|a, b| a.name.cmp(&b.name));
    v
}

/// MD5 digest of the unshuffled F-card list: `path\0hash\0perm` per entry,
/// concatenated. Computed freshly here rather than trusted from the
/// caller, mirroring the teacher's preference for derived fields being
/// recomputed rather than carried as mutable state.
fn compute_r_card(files: &[FCard]) -> String {
    let mut hasher = Md5Hasher::new();
    for f in files {
        hasher.input(f.path.as_bytes());
        hasher.input(&[0]);
        hasher.input(f.hash.as_deref().unwrap_or("").as_bytes());
        hasher.input(&[0]);
        hasher.input(permission_token(f.perm).as_bytes());
        hasher.input(&[0]);
    }
    hasher.finalize().to_string()
}

fn hash_over(bytes: &[u8], kind: HashKind) -> Result<String, Error> {
    match kind {
        HashKind::Sha1 => {
            let digest = Sha1Hasher::hash(bytes).map_err(|_| Error::ZCardMismatch)?;
            Ok(digest.to_string())
        }
        HashKind::Sha3_256 => Ok(Sha3Hasher::hash(bytes).to_string()),
    }
}

fn attach_fields<'a>(deck: &'a Deck, name: &'a str) -> Vec<&'a str> {
    let mut fields = vec![name];
    if let Some(t) = &deck.attach_target {
        fields.push(t);
    }
    if let Some(s) = &deck.attach_src {
        fields.push(s);
    }
    fields
}

/// Render every card but `Z`, recomputing `R` for checkins along the way.
fn render_body(deck: &Deck) -> Result<Vec<u8>, Error> {
    crate::validate::validate(deck)?;

    let f_cards = sorted_f_cards(deck);
    let j_cards = sorted_j_cards(deck);
    let m_cards = sorted_m_cards(deck);
    let q_cards = sorted_q_cards(deck);
    let t_cards = sorted_t_cards(deck);

    let mut out = Vec::new();

    if let Some(name) = &deck.attach_name {
        write_line(&mut out, 'A', &attach_fields(deck, name));
    }
    if let Some(baseline) = &deck.baseline {
        write_line(&mut out, 'B', &[baseline]);
    }
    if let Some(c) = &deck.comment {
        write_line(&mut out, 'C', &[c]);
    }
    if let Some(d) = &deck.date {
        write_line(&mut out, 'D', &[d]);
    }
    for f in &f_cards {
        let mut fields: Vec<&str> = vec![&f.path];
        if let Some(h) = &f.hash {
            fields.push(h);
            if f.perm != Permission::Regular || f.prior_name.is_some() {
                fields.push(permission_token(f.perm));
            }
            if let Some(prior) = &f.prior_name {
                fields.push(prior);
            }
        }
        write_line(&mut out, 'F', &fields);
    }
    if let Some(g) = &deck.forum_thread_root {
        write_line(&mut out, 'G', &[g]);
    }
    if let Some(h) = &deck.forum_in_reply_to {
        write_line(&mut out, 'H', &[h]);
    }
    for j in &j_cards {
        let name_field = if j.append {
            format!("+{}", j.name)
        } else {
            j.name.clone()
        };
        write_line(&mut out, 'J', &[&name_field, &j.value]);
    }
    if let Some(k) = &deck.ticket_uuid {
        write_line(&mut out, 'K', &[k]);
    }
    if let Some(title) = &deck.wiki_title {
        write_line(&mut out, 'L', &[title]);
    }
    for m in &m_cards {
        write_line(&mut out, 'M', &[m]);
    }
    if deck.artifact_type != ArtifactType::Attachment {
        if let Some(name) = &deck.attach_name {
            write_line(&mut out, 'N', &[name]);
        }
    }
    if let Some(mime) = &deck.forum_mimetype {
        write_line(&mut out, 'N', &[mime]);
    }
    if !deck.p_cards.is_empty() {
        let refs: Vec<&str> = deck.p_cards.iter().map(|s| s.as_str()).collect();
        write_line(&mut out, 'P', &refs);
    }
    for q in &q_cards {
        let field = format!("{}{}", q_kind_char(q.kind), q.hash);
        write_line(&mut out, 'Q', &[&field]);
    }
    if deck.artifact_type == ArtifactType::Checkin {
        write_line(&mut out, 'R', &[&compute_r_card(&f_cards)]);
    } else if let Some(r) = &deck.r_card {
        write_line(&mut out, 'R', &[r]);
    }
    for t in &t_cards {
        let name_field = format!("{}{}", tag_sign_char(t.sign), t.name);
        let target = t.target.clone().unwrap_or_else(|| "*".to_string());
        match &t.value {
            Some(v) => write_line(&mut out, 'T', &[&name_field, &target, v]),
            None => write_line(&mut out, 'T', &[&name_field, &target]),
        }
    }
    if let Some(u) = &deck.user {
        write_line(&mut out, 'U', &[u]);
    }
    if let Some(content) = &deck.wiki_content {
        out.push(b'W');
        out.push(b' ');
        out.extend_from_slice(content.len().to_string().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(content);
        out.push(b'\n');
    }

    Ok(out)
}

/// Render `deck` to its canonical byte form, recomputing `R` (for
/// checkins) and appending `Z` over everything written before it.
pub fn serialize(deck: &Deck, hash_kind: HashKind) -> Result<Vec<u8>, Error> {
    let mut out = render_body(deck)?;
    let trailer_hash = hash_over(&out, hash_kind)?;
    write_line(&mut out, 'Z', &[&trailer_hash]);
    Ok(out)
}

/// Verify a parsed deck's `R` and `Z` cards against a freshly recomputed
/// digest of its own canonical form. `hash_kind` is inferred from the
/// length of the `Z`-card the deck was parsed with.
pub fn verify(deck: &Deck) -> Result<(), Error> {
    if deck.artifact_type == ArtifactType::Checkin && !deck.f_cards.is_empty() {
        if let Some(actual) = &deck.r_card {
            let expected = compute_r_card(&sorted_f_cards(deck));
            if actual != &expected {
                return Err(Error::RCardMismatch);
            }
        }
    }

    let claimed = match &deck.self_hash {
        Some(z) => z.clone(),
        None => return Ok(()),
    };
    let kind = HashKind::from_hex_len(claimed.len()).ok_or(Error::ZCardMismatch)?;

    let body = render_body(deck)?;
    let expected_z = hash_over(&body, kind)?;
    if expected_z != claimed {
        return Err(Error::ZCardMismatch);
    }
    Ok(())
}
