//! The crosslink session (§4.6): begin/end brackets around derived-table
//! maintenance triggered by artifact insertion. Every write goes through
//! `Database::with_stmt`, the storage crate's one public query surface —
//! crosslink has no back-door access to the raw connection.

use std::collections::HashSet;

use fossil_core::Context;
use fossil_deck::{ArtifactType, Deck, TagSign};
use fossil_hash::HashPolicy;
use fossil_storage::{BlobStore, Database};

use crate::date::parse_date;
use crate::error::Error;

fn artifact_type_name(ty: ArtifactType) -> &'static str {
    match ty {
        ArtifactType::Checkin => "checkin",
        ArtifactType::Cluster => "cluster",
        ArtifactType::Control => "control",
        ArtifactType::Wiki => "wiki",
        ArtifactType::Ticket => "ticket",
        ArtifactType::Attachment => "attachment",
        ArtifactType::Technote => "technote",
        ArtifactType::Forum => "forum",
    }
}

/// Tag-application kind stored in `tagxref.tagtype`: 0 = cancel, 1 = add
/// (single artifact), 2 = propagating.
fn tagxref_type(sign: TagSign) -> i64 {
    match sign {
        TagSign::Cancel => 0,
        TagSign::Add => 1,
        TagSign::Propagate => 2,
    }
}

pub struct Session<'a> {
    db: &'a Database,
    inserted: Vec<(i64, &'static str)>,
}

impl<'a> Session<'a> {
    pub fn begin(db: &'a Database) -> Result<Self, Error> {
        db.begin()?;
        Ok(Self { db, inserted: Vec::new() })
    }

    /// Update every derived table for one freshly inserted artifact.
    /// Listeners are not fired here — only at [`Session::end`], in
    /// insertion order, per §5's ordering guarantee.
    pub fn crosslink(&mut self, rid: i64, uuid: &str, deck: &Deck) -> Result<(), Error> {
        let outcome = match deck.artifact_type {
            ArtifactType::Checkin => self.crosslink_checkin(rid, uuid, deck),
            ArtifactType::Control => self.crosslink_tags(rid, uuid, deck),
            ArtifactType::Ticket => self.crosslink_ticket(rid, deck),
            ArtifactType::Wiki | ArtifactType::Technote | ArtifactType::Forum => {
                self.crosslink_event(rid, deck, artifact_type_name(deck.artifact_type))
            }
            ArtifactType::Attachment | ArtifactType::Cluster => Ok(()),
        };

        if let Err(e) = outcome {
            tracing::warn!(rid, error = %e, "crosslink failed, poisoning session");
            self.db.poison();
            return Err(e);
        }

        self.inserted.push((rid, artifact_type_name(deck.artifact_type)));
        Ok(())
    }

    fn filename_id(&self, path: &str) -> Result<i64, Error> {
        self.db
            .with_stmt(
                "INSERT INTO repo.filename(name) VALUES (?1) ON CONFLICT(name) DO UPDATE SET name = name RETURNING fnid",
                |stmt| stmt.query_row([path], |r| r.get(0)).map_err(Into::into),
            )
            .map_err(Error::from)
    }

    fn crosslink_checkin(&mut self, rid: i64, uuid: &str, deck: &Deck) -> Result<(), Error> {
        let mtime = deck.date.as_deref().map(parse_date).transpose()?.unwrap_or(0.0);
        self.db.with_stmt(
            "INSERT INTO repo.event(objid, etype, mtime, user, comment) VALUES (?1, 'ci', ?2, ?3, ?4)
             ON CONFLICT(objid) DO UPDATE SET mtime = excluded.mtime, user = excluded.user, comment = excluded.comment",
            |stmt| {
                stmt.execute(rusqlite::params![rid, mtime, deck.user, deck.comment])
                    .map_err(Into::into)
            },
        )?;

        let blobs = BlobStore::new(self.db, HashPolicy::Auto);
        let mut parent_rids = Vec::new();
        for (i, parent_hash) in deck.p_cards.iter().enumerate() {
            let pid = blobs.find_rid(parent_hash)?;
            parent_rids.push(pid);
            self.db.with_stmt(
                "INSERT OR REPLACE INTO repo.plink(pid, cid, isprim) VALUES (?1, ?2, ?3)",
                |stmt| {
                    stmt.execute(rusqlite::params![pid, rid, i == 0]).map_err(Into::into)
                },
            )?;
        }

        for f in &deck.f_cards {
            let fnid = self.filename_id(&f.path)?;
            let pfnid = match &f.prior_name {
                Some(prior) => self.filename_id(prior)?,
                None => fnid,
            };
            let fid = match &f.hash {
                Some(h) => blobs.find_rid(h)?,
                None => 0, // deletion
            };
            let pid = parent_rids.first().copied().unwrap_or(0);
            self.db.with_stmt(
                "INSERT INTO repo.mlink(mid, fid, pid, fnid, pfnid, perm) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                |stmt| {
                    stmt.execute(rusqlite::params![rid, fid, pid, fnid, pfnid, f.perm.as_str()])
                        .map_err(Into::into)
                },
            )?;
        }

        // this checkin becomes a leaf; its parents no longer are (they
        // now have at least one child)
        self.db.with_stmt("INSERT OR IGNORE INTO repo.leaf(rid) VALUES (?1)", |stmt| {
            stmt.execute([rid]).map_err(Into::into)
        })?;
        for pid in &parent_rids {
            self.db.with_stmt("DELETE FROM repo.leaf WHERE rid = ?1", |stmt| {
                stmt.execute([*pid]).map_err(Into::into)
            })?;
        }

        self.inherit_propagated_tags(rid, &parent_rids, mtime)?;
        self.crosslink_tags(rid, uuid, deck)
    }

    /// Before applying this checkin's own T-cards, pull forward every
    /// propagating tag still active on its parents (§4.6: propagation
    /// runs on insert of the child, not only from the tag's origin
    /// commit). A parent whose own copy of the tag was itself cancelled
    /// no longer carries `tagtype = 2` for it, so the cancel stops the
    /// walk here without any extra bookkeeping. Inserted with `DO
    /// NOTHING` so a later own T-card (handled by `crosslink_tags`,
    /// which runs right after and uses `DO UPDATE`) always wins.
    fn inherit_propagated_tags(&self, rid: i64, parent_rids: &[i64], mtime: f64) -> Result<(), Error> {
        let mut seen: HashSet<i64> = HashSet::new();
        for &parent in parent_rids {
            let active: Vec<(i64, Option<String>, i64)> = self.db.with_stmt(
                "SELECT tagid, value, srcid FROM repo.tagxref WHERE rid = ?1 AND tagtype = 2",
                |stmt| {
                    let rows = stmt
                        .query_map([parent], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
                        .map_err(fossil_storage::Error::from)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
                },
            )?;

            for (tagid, value, srcid) in active {
                if !seen.insert(tagid) {
                    continue;
                }
                self.db.with_stmt(
                    "INSERT INTO repo.tagxref(tagid, rid, value, mtime, tagtype, srcid)
                     VALUES (?1, ?2, ?3, ?4, 2, ?5)
                     ON CONFLICT(tagid, rid) DO NOTHING",
                    |stmt| {
                        stmt.execute(rusqlite::params![tagid, rid, value, mtime, srcid])
                            .map_err(Into::into)
                    },
                )?;
            }
        }
        Ok(())
    }

    fn tag_id(&self, name: &str) -> Result<i64, Error> {
        self.db
            .with_stmt(
                "INSERT INTO repo.tag(tagname) VALUES (?1) ON CONFLICT(tagname) DO UPDATE SET tagname = tagname RETURNING tagid",
                |stmt| stmt.query_row([name], |r| r.get(0)).map_err(Into::into),
            )
            .map_err(Error::from)
    }

    /// Apply this artifact's T-cards, then propagate `Propagate`-signed
    /// tags to descendant checkins until an explicit `Cancel` of the same
    /// tag is reached (§4.6's "add does not propagate past a later
    /// cancel").
    fn crosslink_tags(&mut self, rid: i64, uuid: &str, deck: &Deck) -> Result<(), Error> {
        let mtime = deck.date.as_deref().map(parse_date).transpose()?.unwrap_or(0.0);
        let blobs = BlobStore::new(self.db, HashPolicy::Auto);

        for t in &deck.t_cards {
            let tagid = self.tag_id(&t.name)?;
            let target_rid = match &t.target {
                Some(target) => blobs.find_rid(target)?,
                None => rid,
            };
            let tagtype = tagxref_type(t.sign);

            self.db.with_stmt(
                "INSERT INTO repo.tagxref(tagid, rid, value, mtime, tagtype, srcid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(tagid, rid) DO UPDATE SET value = excluded.value, mtime = excluded.mtime,
                   tagtype = excluded.tagtype, srcid = excluded.srcid",
                |stmt| {
                    stmt.execute(rusqlite::params![tagid, target_rid, t.value, mtime, tagtype, rid])
                        .map_err(Into::into)
                },
            )?;

            if matches!(t.sign, TagSign::Propagate) {
                self.propagate_tag(tagid, target_rid, rid, &t.value, mtime)?;
            }
        }

        let _ = uuid;
        Ok(())
    }

    fn propagate_tag(
        &self,
        tagid: i64,
        from_rid: i64,
        srcid: i64,
        value: &Option<String>,
        mtime: f64,
    ) -> Result<(), Error> {
        let mut visited: HashSet<i64> = HashSet::new();
        let mut frontier = vec![from_rid];
        visited.insert(from_rid);

        while let Some(current) = frontier.pop() {
            let children: Vec<i64> = self.db.with_stmt(
                "SELECT cid FROM repo.plink WHERE pid = ?1",
                |stmt| {
                    let rows = stmt.query_map([current], |r| r.get(0)).map_err(fossil_storage::Error::from)?;
                    rows.collect::<rusqlite::Result<Vec<i64>>>().map_err(Into::into)
                },
            )?;

            for child in children {
                if !visited.insert(child) {
                    continue;
                }
                let cancelled: Option<i64> = self.db.with_stmt(
                    "SELECT tagtype FROM repo.tagxref WHERE tagid = ?1 AND rid = ?2",
                    |stmt| {
                        stmt.query_row([tagid, child], |r| r.get(0))
                            .optional_relaxed()
                            .map_err(Into::into)
                    },
                )?;
                if cancelled == Some(0) {
                    // explicit cancel: stop walking past this child
                    continue;
                }
                self.db.with_stmt(
                    "INSERT INTO repo.tagxref(tagid, rid, value, mtime, tagtype, srcid)
                     VALUES (?1, ?2, ?3, ?4, 2, ?5)
                     ON CONFLICT(tagid, rid) DO UPDATE SET value = excluded.value, mtime = excluded.mtime,
                       tagtype = excluded.tagtype, srcid = excluded.srcid",
                    |stmt| {
                        stmt.execute(rusqlite::params![tagid, child, value, mtime, srcid])
                            .map_err(Into::into)
                    },
                )?;
                frontier.push(child);
            }
        }
        Ok(())
    }

    fn crosslink_ticket(&mut self, rid: i64, deck: &Deck) -> Result<(), Error> {
        let uuid = deck
            .ticket_uuid
            .clone()
            .ok_or_else(|| Error::Consistency("ticket artifact missing K-card".into()))?;
        let mtime = deck.date.as_deref().map(parse_date).transpose()?.unwrap_or(0.0);

        self.db.with_stmt(
            "INSERT INTO repo.ticket(tkt_uuid, tkt_mtime) VALUES (?1, ?2)
             ON CONFLICT(tkt_uuid) DO UPDATE SET tkt_mtime = excluded.tkt_mtime",
            |stmt| {
                stmt.execute(rusqlite::params![uuid, mtime]).map_err(Into::into)
            },
        )?;

        for j in &deck.j_cards {
            self.db.with_stmt(
                "INSERT INTO repo.ticketchng(tkt_uuid, tkt_mtime, field, value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tkt_uuid, tkt_mtime, field) DO UPDATE SET value = excluded.value",
                |stmt| {
                    stmt.execute(rusqlite::params![uuid, mtime, j.name, j.value])
                        .map_err(Into::into)
                },
            )?;
        }

        self.db.with_stmt(
            "INSERT INTO repo.event(objid, etype, mtime, user, comment) VALUES (?1, 'ticket', ?2, ?3, NULL)
             ON CONFLICT(objid) DO UPDATE SET mtime = excluded.mtime, user = excluded.user",
            |stmt| {
                stmt.execute(rusqlite::params![rid, mtime, deck.user])
                    .map_err(Into::into)
            },
        )?;
        Ok(())
    }

    fn crosslink_event(&mut self, rid: i64, deck: &Deck, etype: &str) -> Result<(), Error> {
        let mtime = deck.date.as_deref().map(parse_date).transpose()?.unwrap_or(0.0);
        let comment = deck.wiki_title.clone();
        self.db.with_stmt(
            "INSERT INTO repo.event(objid, etype, mtime, user, comment) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(objid) DO UPDATE SET mtime = excluded.mtime, user = excluded.user, comment = excluded.comment",
            |stmt| {
                stmt.execute(rusqlite::params![rid, etype, mtime, deck.user, comment])
                    .map_err(Into::into)
            },
        )?;
        Ok(())
    }

    /// Batched consistency checks run once, just before commit: every
    /// leaf must correspond to a checkin with no recorded children.
    fn run_consistency_checks(&self) -> Result<(), Error> {
        let orphan_leaf: Option<i64> = self.db.with_stmt(
            "SELECT leaf.rid FROM repo.leaf
             JOIN repo.plink ON plink.pid = leaf.rid
             LIMIT 1",
            |stmt| stmt.query_row([], |r| r.get(0)).optional_relaxed().map_err(Into::into),
        )?;
        if let Some(rid) = orphan_leaf {
            return Err(Error::Consistency(format!("rid {rid} is marked a leaf but has children")));
        }
        Ok(())
    }

    /// End the session: run consistency checks, then fire every
    /// registered listener (in registration order) for each artifact
    /// inserted this session. Any failure rolls back the whole session.
    pub fn end(self, ctx: &Context) -> Result<(), Error> {
        if let Err(e) = self.run_consistency_checks() {
            self.db.poison();
            self.db.end()?;
            return Err(e);
        }

        for &(rid, kind) in &self.inserted {
            if let Err(e) = ctx.notify_artifact_inserted(rid, kind) {
                self.db.poison();
                self.db.end()?;
                return Err(Error::Core(e));
            }
        }

        self.db.end()?;
        Ok(())
    }
}

trait OptionalRelaxed<T> {
    fn optional_relaxed(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalRelaxed<T> for rusqlite::Result<T> {
    fn optional_relaxed(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_core::{Config, Context};
    use fossil_deck::{FCard, Permission, TCard};

    fn repo() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db
    }

    fn put(db: &Database, content: &[u8]) -> String {
        let blobs = BlobStore::new(db, HashPolicy::Auto);
        blobs.put(content, None, false).unwrap().1
    }

    fn ctx() -> Context {
        Context::new(Config::new(std::path::PathBuf::from("/tmp/does-not-matter")))
    }

    #[test]
    fn checkin_crosslink_populates_event_mlink_and_leaf() {
        let db = repo();
        let file_hash = put(&db, b"hello world");

        let mut deck = Deck::new(ArtifactType::Checkin);
        deck.set_comment("initial import".into()).unwrap();
        deck.set_date("2024-01-02T00:00:00Z".into()).unwrap();
        deck.set_user("alice".into()).unwrap();
        deck.add_f_card(FCard {
            path: "README.md".into(),
            hash: Some(file_hash),
            perm: Permission::Regular,
            prior_name: None,
        })
        .unwrap();

        let ci_uuid = put(&db, b"checkin-manifest-bytes");
        let rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&ci_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();

        let mut session = Session::begin(&db).unwrap();
        session.crosslink(rid, &ci_uuid, &deck).unwrap();
        session.end(&ctx()).unwrap();

        let is_leaf: i64 = db
            .with_stmt("SELECT count(*) FROM repo.leaf WHERE rid = ?1", |stmt| {
                stmt.query_row([rid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        assert_eq!(is_leaf, 1);

        let mlink_count: i64 = db
            .with_stmt("SELECT count(*) FROM repo.mlink WHERE mid = ?1", |stmt| {
                stmt.query_row([rid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        assert_eq!(mlink_count, 1);

        let event_etype: String = db
            .with_stmt("SELECT etype FROM repo.event WHERE objid = ?1", |stmt| {
                stmt.query_row([rid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        assert_eq!(event_etype, "ci");
    }

    #[test]
    fn adding_a_child_checkin_removes_the_parent_from_leaf() {
        let db = repo();
        let root_uuid = put(&db, b"root-manifest");
        let root_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&root_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();

        {
            let mut session = Session::begin(&db).unwrap();
            session
                .crosslink(root_rid, &root_uuid, &Deck::new(ArtifactType::Checkin))
                .unwrap();
            session.end(&ctx()).unwrap();
        }

        let child_uuid = put(&db, b"child-manifest");
        let child_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&child_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();

        let mut child_deck = Deck::new(ArtifactType::Checkin);
        child_deck.add_p_card(root_uuid.clone()).unwrap();

        let mut session = Session::begin(&db).unwrap();
        session.crosslink(child_rid, &child_uuid, &child_deck).unwrap();
        session.end(&ctx()).unwrap();

        let parent_is_leaf: i64 = db
            .with_stmt("SELECT count(*) FROM repo.leaf WHERE rid = ?1", |stmt| {
                stmt.query_row([root_rid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        assert_eq!(parent_is_leaf, 0);

        let child_is_leaf: i64 = db
            .with_stmt("SELECT count(*) FROM repo.leaf WHERE rid = ?1", |stmt| {
                stmt.query_row([child_rid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        assert_eq!(child_is_leaf, 1);
    }

    #[test]
    fn propagating_tag_stops_at_an_explicit_cancel() {
        let db = repo();

        let root_uuid = put(&db, b"root");
        let root_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&root_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        let mut root_deck = Deck::new(ArtifactType::Checkin);
        root_deck
            .add_t_card(TCard {
                sign: TagSign::Propagate,
                name: "sym-release".into(),
                target: None,
                value: None,
            })
            .unwrap();

        {
            let mut session = Session::begin(&db).unwrap();
            session.crosslink(root_rid, &root_uuid, &root_deck).unwrap();
            session.end(&ctx()).unwrap();
        }

        let mid_uuid = put(&db, b"mid");
        let mid_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&mid_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        let mut mid_deck = Deck::new(ArtifactType::Checkin);
        mid_deck.add_p_card(root_uuid.clone()).unwrap();
        mid_deck
            .add_t_card(TCard {
                sign: TagSign::Cancel,
                name: "sym-release".into(),
                target: None,
                value: None,
            })
            .unwrap();

        {
            let mut session = Session::begin(&db).unwrap();
            session.crosslink(mid_rid, &mid_uuid, &mid_deck).unwrap();
            session.end(&ctx()).unwrap();
        }

        let leaf_uuid = put(&db, b"leaf");
        let leaf_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&leaf_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        let mut leaf_deck = Deck::new(ArtifactType::Checkin);
        leaf_deck.add_p_card(mid_uuid.clone()).unwrap();

        let mut session = Session::begin(&db).unwrap();
        session.crosslink(leaf_rid, &leaf_uuid, &leaf_deck).unwrap();
        session.end(&ctx()).unwrap();

        let tagged_on_leaf: i64 = db
            .with_stmt(
                "SELECT count(*) FROM repo.tagxref
                 JOIN repo.tag ON tag.tagid = tagxref.tagid
                 WHERE tag.tagname = 'sym-release' AND tagxref.rid = ?1 AND tagxref.tagtype != 0",
                |stmt| stmt.query_row([leaf_rid], |r| r.get(0)).map_err(Into::into),
            )
            .unwrap();
        assert_eq!(tagged_on_leaf, 0);
    }

    #[test]
    fn propagating_tag_reaches_a_child_committed_afterward() {
        let db = repo();

        let root_uuid = put(&db, b"root");
        let root_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&root_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        let mut root_deck = Deck::new(ArtifactType::Checkin);
        root_deck
            .add_t_card(TCard {
                sign: TagSign::Propagate,
                name: "sym-release".into(),
                target: None,
                value: None,
            })
            .unwrap();

        {
            let mut session = Session::begin(&db).unwrap();
            session.crosslink(root_rid, &root_uuid, &root_deck).unwrap();
            session.end(&ctx()).unwrap();
        }

        // ordinary commit order: the child is crosslinked after the tag
        // already exists on its parent.
        let child_uuid = put(&db, b"child");
        let child_rid = db
            .with_stmt("SELECT rid FROM repo.blob WHERE uuid = ?1", |stmt| {
                stmt.query_row([&child_uuid], |r| r.get(0)).map_err(Into::into)
            })
            .unwrap();
        let mut child_deck = Deck::new(ArtifactType::Checkin);
        child_deck.add_p_card(root_uuid.clone()).unwrap();

        let mut session = Session::begin(&db).unwrap();
        session.crosslink(child_rid, &child_uuid, &child_deck).unwrap();
        session.end(&ctx()).unwrap();

        let tagged_on_child: i64 = db
            .with_stmt(
                "SELECT count(*) FROM repo.tagxref
                 JOIN repo.tag ON tag.tagid = tagxref.tagid
                 WHERE tag.tagname = 'sym-release' AND tagxref.rid = ?1 AND tagxref.tagtype = 2",
                |stmt| stmt.query_row([child_rid], |r| r.get(0)).map_err(Into::into),
            )
            .unwrap();
        assert_eq!(tagged_on_child, 1);
    }
}
