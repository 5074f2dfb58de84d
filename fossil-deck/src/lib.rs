//! The deck model (§3.2, §4.5): typed card records, the legality table
//! that says which cards an artifact type may carry, and a parser/
//! serializer pair between that typed form and Fossil's line-oriented
//! wire format.

pub mod cards;
mod deck;
mod error;
mod parse;
mod serialize;
mod validate;

pub use cards::{FCard, JCard, Permission, QCard, QKind, TCard, TagSign};
pub use deck::{ArtifactType, BaselineLoader, Deck, NoBaseline};
pub use error::Error;
pub use parse::parse;
pub use serialize::{serialize, verify};
pub use validate::validate;

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_hash::HashKind;

    fn sample_checkin() -> Deck {
        let mut d = Deck::new(ArtifactType::Checkin);
        d.set_comment("initial import".into()).unwrap();
        d.set_date("2024-01-01T00:00:00.000Z".into()).unwrap();
        d.set_user("alice".into()).unwrap();
        d.add_f_card(FCard {
            path: "src/main.rs".into(),
            hash: Some("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".into()),
            perm: Permission::Regular,
            prior_name: None,
        })
        .unwrap();
        d.add_f_card(FCard {
            path: "README.md".into(),
            hash: Some("d41d8cd98f00b204e9800998ecf8427ed41d8cd9".into()),
            perm: Permission::Regular,
            prior_name: None,
        })
        .unwrap();
        d
    }

    #[test]
    fn checkin_round_trips_through_parse_and_serialize() {
        let deck = sample_checkin();
        let bytes = serialize(&deck, HashKind::Sha1).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.artifact_type, ArtifactType::Checkin);
        assert_eq!(parsed.comment, deck.comment);
        assert_eq!(parsed.f_cards.len(), 2);
        // f-cards come back sorted lexicographically, not insertion order
        assert_eq!(parsed.f_cards[0].path, "README.md");
        assert_eq!(parsed.f_cards[1].path, "src/main.rs");
    }

    #[test]
    fn serialize_is_deterministic_regardless_of_insertion_order() {
        let mut a = Deck::new(ArtifactType::Checkin);
        a.set_comment("c".into()).unwrap();
        a.set_date("d".into()).unwrap();
        a.set_user("u".into()).unwrap();
        a.add_f_card(FCard { path: "b.txt".into(), hash: Some("x".into()), perm: Permission::Regular, prior_name: None }).unwrap();
        a.add_f_card(FCard { path: "a.txt".into(), hash: Some("y".into()), perm: Permission::Regular, prior_name: None }).unwrap();

        let mut b = Deck::new(ArtifactType::Checkin);
        b.set_comment("c".into()).unwrap();
        b.set_date("d".into()).unwrap();
        b.set_user("u".into()).unwrap();
        b.add_f_card(FCard { path: "a.txt".into(), hash: Some("y".into()), perm: Permission::Regular, prior_name: None }).unwrap();
        b.add_f_card(FCard { path: "b.txt".into(), hash: Some("x".into()), perm: Permission::Regular, prior_name: None }).unwrap();

        assert_eq!(serialize(&a, HashKind::Sha1).unwrap(), serialize(&b, HashKind::Sha1).unwrap());
    }

    #[test]
    fn verify_detects_tampered_comment() {
        let deck = sample_checkin();
        let bytes = serialize(&deck, HashKind::Sha1).unwrap();
        let mut parsed = parse(&bytes).unwrap();
        parsed.comment = Some("tampered".into());
        assert_eq!(verify(&parsed), Err(Error::ZCardMismatch));
    }

    #[test]
    fn rejects_card_not_legal_for_artifact_type() {
        let mut d = Deck::new(ArtifactType::Cluster);
        assert_eq!(
            d.set_comment("nope".into()),
            Err(Error::Type('C', ArtifactType::Cluster))
        );
    }

    #[test]
    fn rejects_missing_required_card() {
        let mut d = Deck::new(ArtifactType::Checkin);
        d.set_comment("c".into()).unwrap();
        d.set_date("d".into()).unwrap();
        // no U card
        assert_eq!(validate(&d), Err(Error::MissingRequired('U')));
    }

    #[test]
    fn duplicate_f_card_paths_are_rejected_at_validate() {
        let mut d = sample_checkin();
        d.f_cards.push(FCard {
            path: "README.md".into(),
            hash: Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into()),
            perm: Permission::Regular,
            prior_name: None,
        });
        assert_eq!(validate(&d), Err(Error::DuplicatePath("README.md".into())));
    }

    #[test]
    fn wiki_content_with_embedded_newlines_round_trips() {
        let mut d = Deck::new(ArtifactType::Wiki);
        d.set_date("2024-01-01T00:00:00.000Z".into()).unwrap();
        d.set_user("bob".into()).unwrap();
        d.wiki_title = Some("Home".into());
        d.wiki_content = Some(b"line one\nline two\n\x00binary".to_vec());

        let bytes = serialize(&d, HashKind::Sha3_256).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.wiki_content, d.wiki_content);
        assert_eq!(parsed.artifact_type, ArtifactType::Wiki);
    }

    #[test]
    fn delta_manifest_find_file_falls_back_to_baseline() {
        let baseline = sample_checkin();
        let baseline_bytes = serialize(&baseline, HashKind::Sha1).unwrap();

        struct FixedLoader(Vec<u8>);
        impl BaselineLoader for FixedLoader {
            fn load_baseline_bytes(&self, _hash: &str) -> Option<Vec<u8>> {
                Some(self.0.clone())
            }
        }

        let mut delta = Deck::new(ArtifactType::Checkin);
        delta.set_comment("second commit".into()).unwrap();
        delta.set_date("2024-01-02T00:00:00.000Z".into()).unwrap();
        delta.set_user("alice".into()).unwrap();
        delta.set_baseline("deadbeef".into()).unwrap();

        let loader = FixedLoader(baseline_bytes);
        let found = delta.find_file("README.md", false, &loader).unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().path, "README.md");
    }
}
