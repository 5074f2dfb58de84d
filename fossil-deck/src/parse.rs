//! Line-oriented card parser (§4.5).
//!
//! Every card but `W` is exactly one line: a single uppercase letter, a
//! space, and zero or more space-separated fossilized tokens. `W` is the
//! one card whose value is raw (unescaped) content, so it carries its own
//! length prefix and is the only card the parser treats as binary.

use crate::cards::{FCard, JCard, Permission, QCard, QKind, TCard, TagSign};
use crate::deck::{ArtifactType, Deck};
use crate::error::Error;
use fossil_hash::defossilize;

fn token_to_string(tok: &[u8]) -> String {
    String::from_utf8_lossy(&defossilize(tok)).into_owned()
}

struct Lines<'a> {
    buf: &'a [u8],
    pos: usize,
    line_no: usize,
}

impl<'a> Lines<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, line_no: 0 }
    }

    /// Returns the next line's bytes (without the trailing `\n`).
    fn next_line(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let rest = &self.buf[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let line = &rest[..end];
        self.pos += end + 1;
        self.line_no += 1;
        Some(line)
    }

    /// Consume exactly `n` raw bytes (for a `W` card body), then the
    /// trailing newline that must follow it.
    fn take_raw(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return None;
        }
        let raw = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        if self.buf.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
        }
        Some(raw)
    }
}

/// Parse one control artifact from its on-disk byte representation.
///
/// Does not verify `R`/`Z` hashes — call [`crate::serialize::verify`] for
/// that once the artifact's own hash is known to the caller.
pub fn parse(buf: &[u8]) -> Result<Deck, Error> {
    let mut lines = Lines::new(buf);

    let mut has_comment = false;
    let mut has_f = false;
    let mut has_j = false;
    let mut has_attach = false;
    let mut has_t = false;
    let mut has_wiki = false;

    // Checkin is just the starting placeholder; corrected once every line
    // has been read and the card set determines the real type.
    let mut deck = Deck::new(ArtifactType::Checkin);

    while let Some(line) = lines.next_line() {
        if line.is_empty() {
            continue;
        }
        let card = line[0] as char;
        if line.len() < 2 || line[1] != b' ' {
            if line.len() == 1 {
                // bare single-letter line with no fields (not used by any
                // card kind we emit, but tolerated as empty-field form)
            } else {
                return Err(Error::Syntax(lines.line_no, format!("malformed {card}-card")));
            }
        }
        let rest = if line.len() >= 2 { &line[2..] } else { &[] };
        let fields: Vec<&[u8]> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(|&b| b == b' ').collect()
        };

        match card {
            'B' => {
                let hash = fields.first().ok_or(Error::Syntax(lines.line_no, "B card missing hash".into()))?;
                deck.baseline = Some(token_to_string(hash));
            }
            'C' => {
                let text = fields.first().ok_or(Error::Syntax(lines.line_no, "C card missing text".into()))?;
                deck.comment = Some(token_to_string(text));
                has_comment = true;
            }
            'D' => {
                let date = fields.first().ok_or(Error::Syntax(lines.line_no, "D card missing date".into()))?;
                deck.date = Some(token_to_string(date));
            }
            'F' => {
                let path = fields.first().ok_or(Error::Syntax(lines.line_no, "F card missing path".into()))?;
                let hash = fields.get(1).map(|t| token_to_string(t));
                let perm = fields
                    .get(2)
                    .map(|t| Permission::parse(&token_to_string(t)))
                    .unwrap_or(Permission::Regular);
                let prior_name = fields.get(3).map(|t| token_to_string(t));
                deck.f_cards.push(FCard {
                    path: token_to_string(path),
                    hash,
                    perm,
                    prior_name,
                });
                has_f = true;
            }
            'P' => {
                for tok in &fields {
                    deck.p_cards.push(token_to_string(tok));
                }
            }
            'Q' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "Q card missing hash".into()))?;
                let s = token_to_string(tok);
                let (kind, hash) = match s.chars().next() {
                    Some('+') => (QKind::CherryPick, s[1..].to_string()),
                    Some('-') => (QKind::Backout, s[1..].to_string()),
                    _ => return Err(Error::Syntax(lines.line_no, "Q card missing +/- sign".into())),
                };
                deck.q_cards.push(QCard { kind, hash });
            }
            'R' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "R card missing hex".into()))?;
                deck.r_card = Some(token_to_string(tok));
            }
            'T' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "T card missing tag".into()))?;
                let raw = token_to_string(tok);
                let mut chars = raw.chars();
                let sign = chars
                    .next()
                    .and_then(TagSign::parse)
                    .ok_or(Error::Syntax(lines.line_no, "T card bad sign".into()))?;
                let name: String = chars.collect();
                let target = fields.get(1).map(|t| token_to_string(t)).filter(|s| s != "*");
                let value = fields.get(2).map(|t| token_to_string(t));
                deck.t_cards.push(TCard { sign, name, target, value });
                has_t = true;
            }
            'U' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "U card missing user".into()))?;
                deck.user = Some(token_to_string(tok));
            }
            'Z' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "Z card missing hex".into()))?;
                deck.self_hash = Some(token_to_string(tok));
            }
            'M' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "M card missing hash".into()))?;
                deck.m_cards.push(token_to_string(tok));
            }
            'L' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "L card missing title".into()))?;
                deck.wiki_title = Some(token_to_string(tok));
                has_wiki = true;
            }
            'W' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "W card missing size".into()))?;
                let size: usize = token_to_string(tok)
                    .parse()
                    .map_err(|_| Error::Range('W', "non-numeric size".into()))?;
                let raw = lines
                    .take_raw(size)
                    .ok_or(Error::Syntax(lines.line_no, "W card truncated body".into()))?;
                deck.wiki_content = Some(raw.to_vec());
                has_wiki = true;
            }
            'K' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "K card missing uuid".into()))?;
                deck.ticket_uuid = Some(token_to_string(tok));
            }
            'J' => {
                let name_tok = fields.first().ok_or(Error::Syntax(lines.line_no, "J card missing name".into()))?;
                let raw_name = token_to_string(name_tok);
                let (append, name) = match raw_name.strip_prefix('+') {
                    Some(rest) => (true, rest.to_string()),
                    None => (false, raw_name),
                };
                let value = fields.get(1).map(|t| token_to_string(t)).unwrap_or_default();
                deck.j_cards.push(JCard { name, append, value });
                has_j = true;
            }
            'A' => {
                let name = fields.first().ok_or(Error::Syntax(lines.line_no, "A card missing name".into()))?;
                let target = fields.get(1).map(|t| token_to_string(t));
                let src = fields.get(2).map(|t| token_to_string(t));
                deck.attach_name = Some(token_to_string(name));
                deck.attach_target = target;
                deck.attach_src = src;
                has_attach = true;
            }
            'N' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "N card missing value".into()))?;
                deck.forum_mimetype = Some(token_to_string(tok));
            }
            'G' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "G card missing hash".into()))?;
                deck.forum_thread_root = Some(token_to_string(tok));
            }
            'H' => {
                let tok = fields.first().ok_or(Error::Syntax(lines.line_no, "H card missing hash".into()))?;
                deck.forum_in_reply_to = Some(token_to_string(tok));
            }
            other => {
                return Err(Error::Syntax(lines.line_no, format!("unknown card '{other}'")));
            }
        }
    }

    let has_m = !deck.m_cards.is_empty();
    let ty = crate::validate::infer_type(
        has_m,
        has_wiki,
        has_j,
        has_attach,
        has_t && !has_comment && !has_f,
        has_comment || has_f,
    )
    .ok_or(Error::UnknownType)?;
    deck.artifact_type = ty;
    deck.is_delta_manifest = ty == ArtifactType::Checkin && deck.baseline.is_some();

    crate::validate::validate(&deck)?;
    Ok(deck)
}
