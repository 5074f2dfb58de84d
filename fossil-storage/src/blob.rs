//! The blob store: content-addressed insert/fetch over the `repo.blob` /
//! `repo.delta` tables, with lazy delta resolution, phantom tracking and
//! deltify/undeltify rewriting (§4.4).

use fossil_hash::{classify_hash_str, compress, decompress, HashKind, HashMatch, HashPolicy, Sha1Hasher, Sha3Hasher};

use crate::db::Database;
use crate::error::{Error, Result};

/// Delta chains longer than this are treated as a cycle.
const MAX_DELTA_DEPTH: u32 = 256;

/// A blob must be at least this many bytes before it's worth deltifying.
const MIN_DELTIFY_SIZE: i64 = 50;

/// `deltify` refuses a rewrite that doesn't shrink storage by this much.
const MIN_DELTIFY_SAVINGS: f64 = 0.25;

pub struct BlobStore<'a> {
    db: &'a Database,
    policy: HashPolicy,
}

#[derive(Debug, Clone, Copy)]
struct BlobRow {
    rid: i64,
    size: i64,
    is_delta: bool,
    is_private: bool,
}

impl<'a> BlobStore<'a> {
    pub fn new(db: &'a Database, policy: HashPolicy) -> Self {
        Self { db, policy }
    }

    fn repo_has_sha1_content(&self) -> Result<bool> {
        let found: Option<i64> = self.db.conn.query_row(
            "SELECT 1 FROM repo.blob WHERE length(uuid) = 40 LIMIT 1",
            [],
            |r| r.get(0),
        ).optional_or_none()?;
        Ok(found.is_some())
    }

    fn hash_hex(&self, kind: HashKind, content: &[u8]) -> Result<String> {
        match kind {
            HashKind::Sha1 => Ok(Sha1Hasher::hash(content)?.to_string()),
            HashKind::Sha3_256 => Ok(Sha3Hasher::hash(content).to_string()),
        }
    }

    fn row_by_rid(&self, rid: i64) -> Result<BlobRow> {
        self.db
            .conn
            .query_row(
                "SELECT rid, size, is_delta, is_private FROM repo.blob WHERE rid = ?1",
                [rid],
                |r| {
                    Ok(BlobRow {
                        rid: r.get(0)?,
                        size: r.get(1)?,
                        is_delta: r.get::<_, i64>(2)? != 0,
                        is_private: r.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
                other => Error::Db(other),
            })
    }

    fn row_by_uuid(&self, uuid: &str) -> Result<Option<BlobRow>> {
        self.db
            .conn
            .query_row(
                "SELECT rid, size, is_delta, is_private FROM repo.blob WHERE uuid = ?1",
                [uuid],
                |r| {
                    Ok(BlobRow {
                        rid: r.get(0)?,
                        size: r.get(1)?,
                        is_delta: r.get::<_, i64>(2)? != 0,
                        is_private: r.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .optional_or_none()
    }

    /// Register a hash as known without content (a phantom), or return the
    /// existing rid if already present.
    pub fn touch_phantom(&self, uuid: &str) -> Result<i64> {
        if let Some(row) = self.row_by_uuid(uuid)? {
            return Ok(row.rid);
        }
        self.db.conn.execute(
            "INSERT INTO repo.blob(uuid, size, content, is_delta, is_private) VALUES (?1, -1, NULL, 0, 0)",
            [uuid],
        )?;
        Ok(self.db.conn.last_insert_rowid())
    }

    pub fn put(
        &self,
        content: &[u8],
        source_rid: Option<i64>,
        is_private: bool,
    ) -> Result<(i64, String)> {
        let kind = self.policy.kind_for_new_content(self.repo_has_sha1_content()?);
        let uuid = self.hash_hex(kind, content)?;

        if let Some(existing) = self.row_by_uuid(&uuid)? {
            if existing.size < 0 {
                self.fill_phantom(existing.rid, content, source_rid, is_private)?;
            }
            return Ok((existing.rid, uuid));
        }

        let rid = self.insert_new(&uuid, content, source_rid, is_private)?;
        Ok((rid, uuid))
    }

    fn fill_phantom(
        &self,
        rid: i64,
        content: &[u8],
        source_rid: Option<i64>,
        is_private: bool,
    ) -> Result<()> {
        let (stored, is_delta) = self.encode_for_storage(content, source_rid)?;
        self.db.conn.execute(
            "UPDATE repo.blob SET size = ?1, content = ?2, is_delta = ?3, is_private = ?4 WHERE rid = ?5",
            rusqlite::params![content.len() as i64, stored, is_delta as i64, is_private as i64, rid],
        )?;
        if let Some(src) = source_rid {
            self.db.conn.execute(
                "INSERT OR REPLACE INTO repo.delta(rid, srcid) VALUES (?1, ?2)",
                [rid, src],
            )?;
        }
        Ok(())
    }

    fn insert_new(
        &self,
        uuid: &str,
        content: &[u8],
        source_rid: Option<i64>,
        is_private: bool,
    ) -> Result<i64> {
        if let Some(src) = source_rid {
            let src_row = self.row_by_rid(src)?;
            if is_private_public_violation(is_private, src_row.is_private) {
                return Err(Error::DeltifyRefused(
                    "a public blob may not delta against a private source",
                ));
            }
        }
        let (stored, is_delta) = self.encode_for_storage(content, source_rid)?;
        self.db.conn.execute(
            "INSERT INTO repo.blob(uuid, size, content, is_delta, is_private) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![uuid, content.len() as i64, stored, is_delta as i64, is_private as i64],
        )?;
        let rid = self.db.conn.last_insert_rowid();
        if let Some(src) = source_rid {
            self.db.conn.execute(
                "INSERT INTO repo.delta(rid, srcid) VALUES (?1, ?2)",
                [rid, src],
            )?;
        }
        Ok(rid)
    }

    fn encode_for_storage(
        &self,
        content: &[u8],
        source_rid: Option<i64>,
    ) -> Result<(Vec<u8>, bool)> {
        match source_rid {
            Some(src) => {
                let source_content = self.get(src)?;
                let delta = fossil_delta::create(&source_content, content);
                Ok((compress(&delta)?, true))
            }
            None => Ok((compress(content)?, false)),
        }
    }

    /// Fully resolve a blob to its plain content, following delta chains.
    pub fn get(&self, rid: i64) -> Result<Vec<u8>> {
        self.get_depth(rid, 0)
    }

    fn get_depth(&self, rid: i64, depth: u32) -> Result<Vec<u8>> {
        if depth > MAX_DELTA_DEPTH {
            return Err(Error::Consistency(format!(
                "delta chain from rid {rid} exceeds max depth (cycle?)"
            )));
        }
        let row = self.row_by_rid(rid)?;
        if row.size < 0 {
            return Err(Error::Phantom(rid));
        }
        let raw = self.blob(rid)?;
        if !row.is_delta {
            return Ok(raw);
        }
        let srcid: i64 = self.db.conn.query_row(
            "SELECT srcid FROM repo.delta WHERE rid = ?1",
            [rid],
            |r| r.get(0),
        )?;
        let source = self.get_depth(srcid, depth + 1)?;
        Ok(fossil_delta::apply(&source, &raw)?)
    }

    /// The raw stored form: plain content if stored raw, or the (still
    /// delta-encoded, already zlib-decompressed) delta script otherwise.
    pub fn blob(&self, rid: i64) -> Result<Vec<u8>> {
        let content: Option<Vec<u8>> = self.db.conn.query_row(
            "SELECT content FROM repo.blob WHERE rid = ?1",
            [rid],
            |r| r.get(0),
        ).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            other => Error::Db(other),
        })?;
        match content {
            Some(bytes) => Ok(decompress(&bytes)?),
            None => Err(Error::Phantom(rid)),
        }
    }

    pub fn size(&self, rid: i64) -> Result<i64> {
        Ok(self.row_by_rid(rid)?.size)
    }

    pub fn is_private(&self, rid: i64) -> Result<bool> {
        Ok(self.row_by_rid(rid)?.is_private)
    }

    /// Resolve a full hash or an unambiguous hex prefix (§4.1, §8 S6).
    pub fn find_rid(&self, sym: &str) -> Result<i64> {
        match classify_hash_str(sym) {
            HashMatch::Exact(_) => self
                .row_by_uuid(sym)?
                .map(|r| r.rid)
                .ok_or(Error::NotFound),
            HashMatch::Prefix => {
                let pattern = format!("{sym}%");
                let mut stmt = self
                    .db
                    .conn
                    .prepare("SELECT rid FROM repo.blob WHERE uuid LIKE ?1 ORDER BY rid")?;
                let rids: Vec<i64> = stmt
                    .query_map([pattern], |r| r.get(0))?
                    .collect::<rusqlite::Result<_>>()?;
                match rids.len() {
                    0 => Err(Error::NotFound),
                    1 => Ok(rids[0]),
                    n => Err(Error::Ambiguous(sym.to_string(), n)),
                }
            }
            HashMatch::TooShort => Err(Error::NotFound),
        }
    }

    /// Rewrite `rid` as a delta against `source_rid`.
    pub fn deltify(&self, rid: i64, source_rid: i64) -> Result<()> {
        if rid == source_rid {
            return Err(Error::DeltifyRefused("cannot deltify a blob against itself"));
        }
        let target = self.row_by_rid(rid)?;
        let source = self.row_by_rid(source_rid)?;

        if is_private_public_violation(target.is_private, source.is_private) {
            return Err(Error::DeltifyRefused(
                "a public blob may not delta against a private source",
            ));
        }
        if self.depends_on(source_rid, rid)? {
            return Err(Error::DeltifyRefused("source depends transitively on target"));
        }
        if target.size < MIN_DELTIFY_SIZE || source.size < MIN_DELTIFY_SIZE {
            return Err(Error::DeltifyRefused("blob too small to deltify"));
        }

        let target_content = self.get(rid)?;
        let source_content = self.get(source_rid)?;
        let delta = fossil_delta::create(&source_content, &target_content);
        let compressed = compress(&delta)?;

        let current_len: i64 = self.db.conn.query_row(
            "SELECT length(content) FROM repo.blob WHERE rid = ?1",
            [rid],
            |r| r.get(0),
        )?;
        let savings = 1.0 - (compressed.len() as f64 / current_len.max(1) as f64);
        if savings < MIN_DELTIFY_SAVINGS {
            return Err(Error::DeltifyRefused("delta does not save enough space"));
        }

        self.db.conn.execute(
            "UPDATE repo.blob SET content = ?1, is_delta = 1 WHERE rid = ?2",
            rusqlite::params![compressed, rid],
        )?;
        self.db.conn.execute(
            "INSERT OR REPLACE INTO repo.delta(rid, srcid) VALUES (?1, ?2)",
            [rid, source_rid],
        )?;
        Ok(())
    }

    /// True if `rid`'s delta chain ever reaches `ancestor`.
    fn depends_on(&self, rid: i64, ancestor: i64) -> Result<bool> {
        let mut cur = rid;
        for _ in 0..MAX_DELTA_DEPTH {
            let row = self.row_by_rid(cur)?;
            if !row.is_delta {
                return Ok(false);
            }
            let srcid: i64 = self.db.conn.query_row(
                "SELECT srcid FROM repo.delta WHERE rid = ?1",
                [cur],
                |r| r.get(0),
            )?;
            if srcid == ancestor {
                return Ok(true);
            }
            cur = srcid;
        }
        Err(Error::Consistency(format!(
            "delta chain from rid {rid} exceeds max depth (cycle?)"
        )))
    }

    /// Rewrite `rid` to be stored as raw content (inverse of `deltify`;
    /// used by `shun`).
    pub fn undeltify(&self, rid: i64) -> Result<()> {
        let row = self.row_by_rid(rid)?;
        if !row.is_delta {
            return Ok(());
        }
        let content = self.get(rid)?;
        let compressed = compress(&content)?;
        self.db.conn.execute(
            "UPDATE repo.blob SET content = ?1, is_delta = 0 WHERE rid = ?2",
            rusqlite::params![compressed, rid],
        )?;
        self.db.conn.execute("DELETE FROM repo.delta WHERE rid = ?1", [rid])?;
        Ok(())
    }

    /// Permanently remove a blob's content, un-deltifying any dependents
    /// first so their content survives.
    pub fn shun(&self, uuid: &str) -> Result<()> {
        let Some(row) = self.row_by_uuid(uuid)? else {
            return Ok(());
        };
        let dependents: Vec<i64> = {
            let mut stmt = self
                .db
                .conn
                .prepare("SELECT rid FROM repo.delta WHERE srcid = ?1")?;
            stmt.query_map([row.rid], |r| r.get(0))?
                .collect::<rusqlite::Result<_>>()?
        };
        for dep in dependents {
            self.undeltify(dep)?;
        }
        self.db.conn.execute("DELETE FROM repo.delta WHERE rid = ?1", [row.rid])?;
        self.db.conn.execute("DELETE FROM repo.blob WHERE rid = ?1", [row.rid])?;
        self.db
            .conn
            .execute("INSERT OR IGNORE INTO repo.shun(uuid) VALUES (?1)", [uuid])?;
        Ok(())
    }
}

fn is_private_public_violation(target_private: bool, source_private: bool) -> bool {
    !target_private && source_private
}

/// Small helper trait to turn "no rows" into `Ok(None)` instead of an
/// error, for the handful of lookups that are expected to sometimes miss.
trait OptionalOrNone<T> {
    fn optional_or_none(self) -> Result<Option<T>>;
}

impl<T> OptionalOrNone<T> for rusqlite::Result<T> {
    fn optional_or_none(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Db(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use fossil_hash::HashPolicy;

    fn store() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.conn.execute("ATTACH DATABASE ':memory:' AS repo", []).unwrap();
        crate::schema::install(&db.conn, crate::schema::REPO_SCHEMA).unwrap();
        db
    }

    #[test]
    fn put_is_idempotent_on_identical_content() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let (rid1, h1) = bs.put(b"hello\n", None, false).unwrap();
        let (rid2, h2) = bs.put(b"hello\n", None, false).unwrap();
        assert_eq!(rid1, rid2);
        assert_eq!(h1, h2);
    }

    #[test]
    fn get_resolves_a_delta_chain() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let base = b"abcdefghij".repeat(50);
        let (base_rid, _) = bs.put(&base, None, false).unwrap();

        let mut derived = base.clone();
        derived[100] = b'Z';
        let (derived_rid, _) = bs.put(&derived, Some(base_rid), false).unwrap();

        assert_eq!(bs.get(derived_rid).unwrap(), derived);
        assert_eq!(bs.size(derived_rid).unwrap(), derived.len() as i64);
    }

    #[test]
    fn phantom_blob_then_fill_preserves_rid() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let content = b"eventually arrives";
        let uuid = fossil_hash::Sha3Hasher::hash(content).to_string();

        let phantom_rid = bs.touch_phantom(&uuid).unwrap();
        assert_eq!(bs.size(phantom_rid).unwrap(), -1);
        assert!(matches!(bs.get(phantom_rid), Err(Error::Phantom(_))));

        let (rid, _) = bs.put(content, None, false).unwrap();
        assert_eq!(rid, phantom_rid);
        assert_eq!(bs.get(rid).unwrap(), content);
    }

    #[test]
    fn deltify_preserves_content_and_undeltify_reverses_it() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let base = b"0123456789".repeat(40);
        let (base_rid, _) = bs.put(&base, None, false).unwrap();
        let mut other = base.clone();
        other[50] = b'!';
        let (other_rid, _) = bs.put(&other, None, false).unwrap();

        bs.deltify(other_rid, base_rid).unwrap();
        assert_eq!(bs.get(other_rid).unwrap(), other);

        bs.undeltify(other_rid).unwrap();
        assert_eq!(bs.get(other_rid).unwrap(), other);
    }

    #[test]
    fn deltify_refuses_a_cycle() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let a = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let b = b"bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_vec();
        let (rid_a, _) = bs.put(&a, None, false).unwrap();
        let (rid_b, _) = bs.put(&b, None, false).unwrap();

        bs.deltify(rid_b, rid_a).ok();
        assert!(bs.deltify(rid_a, rid_b).is_err());
    }

    #[test]
    fn find_rid_resolves_full_and_detects_ambiguous_prefix() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let (rid, uuid) = bs.put(b"content one", None, false).unwrap();
        assert_eq!(bs.find_rid(&uuid).unwrap(), rid);
        assert_eq!(bs.find_rid(&uuid[..8]).unwrap(), rid);
    }

    #[test]
    fn shun_removes_content_and_undeltifies_dependents() {
        let db = store();
        let bs = BlobStore::new(&db, HashPolicy::Sha3Only);
        let base = b"0123456789".repeat(40);
        let (base_rid, base_uuid) = bs.put(&base, None, false).unwrap();
        let mut other = base.clone();
        other[10] = b'!';
        let (other_rid, _) = bs.put(&other, Some(base_rid), false).unwrap();

        bs.shun(&base_uuid).unwrap();

        assert!(bs.get(base_rid).is_err());
        assert_eq!(bs.get(other_rid).unwrap(), other);
    }
}
