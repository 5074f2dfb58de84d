//! Commit (§4.7): build a new checkin manifest from the current vfile
//! state, store its content and itself as blobs, crosslink it into the
//! repository indices, and advance the checkout to the new version.

use std::path::Path;

use fossil_core::Context;
use fossil_crosslink::Session;
use fossil_deck::{ArtifactType, Deck, FCard, Permission, TCard, TagSign};
use fossil_hash::{HashKind, HashPolicy};
use fossil_storage::{BlobStore, Database, RepoConfig};

use crate::error::Error;
use crate::vfile::{clear_vfile, insert_vfile_row, load_vfile, ChangeStatus, VFile};

#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub comment: String,
    pub user: String,
    pub branch: Option<String>,
    pub close_leaf: bool,
    pub allow_conflicts: bool,
}

pub struct CommitResult {
    pub rid: i64,
    pub hash: String,
}

fn conflict_marker_present(content: &[u8]) -> bool {
    let text = String::from_utf8_lossy(content);
    text.contains("<<<<<<< BEGIN MERGE CONFLICT")
}

/// Commit the checked-out tree's current vfile state as a new child of
/// `parent_rid`. `root` is the checkout root used to read file content
/// for anything marked changed. `parent_rid` is `None` for the very
/// first checkin in a repository (spec §8 S1), in which case a commit
/// with an empty file set is not a no-op.
pub fn commit(
    db: &Database,
    ctx: &Context,
    root: &Path,
    parent_rid: Option<i64>,
    req: &CommitRequest,
) -> Result<CommitResult, Error> {
    if req.comment.trim().is_empty() {
        return Err(Error::Misuse("commit message is required".into()));
    }
    if req.user.trim().is_empty() {
        return Err(Error::Misuse("user is required".into()));
    }

    let vfile_vid = parent_rid.unwrap_or(0);
    let rows = load_vfile(db, vfile_vid)?;
    let active: Vec<&VFile> = rows.iter().filter(|r| r.status != ChangeStatus::Removed).collect();
    let has_change = rows.iter().any(|r| r.status != ChangeStatus::Unchanged);
    if parent_rid.is_some() && !has_change {
        return Err(Error::Noop);
    }

    let blobs = BlobStore::new(db, HashPolicy::Auto);
    let cfg = RepoConfig::new(db);
    let forbid_delta_manifests = cfg.get_bool("forbid-delta-manifests", false)?;
    let unchanged_count = rows.iter().filter(|r| r.status == ChangeStatus::Unchanged).count();
    let use_delta_manifest = parent_rid.is_some() && !forbid_delta_manifests && unchanged_count > 0;

    db.begin()?;
    let outcome = (|| -> Result<CommitResult, Error> {
        let mut new_rows = Vec::with_capacity(active.len());

        for row in &active {
            let abs = root.join(&row.pathname);
            let (rid, hash) = match row.status {
                ChangeStatus::Unchanged => {
                    let rid = row.rid.ok_or_else(|| Error::Misuse(format!("missing rid for {}", row.pathname)))?;
                    let hash = blob_hash(db, rid)?;
                    (rid, hash)
                }
                _ => {
                    let content = std::fs::read(&abs)?;
                    if !req.allow_conflicts && conflict_marker_present(&content) {
                        return Err(Error::Conflict(row.pathname.clone()));
                    }
                    let (rid, hash) = blobs.put(&content, row.rid, false)?;
                    (rid, hash)
                }
            };

            new_rows.push(VFile {
                id: 0,
                vid: 0,
                chnged: false,
                deleted: false,
                isexe: row.isexe,
                islink: row.islink,
                rid: Some(rid),
                mrid: Some(rid),
                pathname: row.pathname.clone(),
                origname: row.origname.clone(),
                size: row.size,
                mtime: row.mtime,
                status: ChangeStatus::Unchanged,
            });

            let _ = hash;
        }

        let mut deck = Deck::new(ArtifactType::Checkin);
        deck.set_comment(req.comment.clone())?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        deck.set_date(fossil_crosslink::date::format_date(now))?;
        deck.set_user(req.user.clone())?;

        let parent_hash = parent_rid.map(|rid| blob_hash(db, rid)).transpose()?;
        if let Some(hash) = &parent_hash {
            deck.add_p_card(hash.clone())?;
            if use_delta_manifest {
                deck.set_baseline(hash.clone())?;
            }
        }

        for row in &new_rows {
            let is_new_or_changed = !use_delta_manifest
                || rows
                    .iter()
                    .find(|r| r.pathname == row.pathname)
                    .map(|r| r.status != ChangeStatus::Unchanged)
                    .unwrap_or(true);
            if !is_new_or_changed {
                continue;
            }

            let perm = if row.islink {
                Permission::Symlink
            } else if row.isexe {
                Permission::Executable
            } else {
                Permission::Regular
            };
            let hash = row.rid.map(|rid| blob_hash(db, rid)).transpose()?;
            deck.add_f_card(FCard {
                path: row.pathname.clone(),
                hash,
                perm,
                prior_name: row.origname.clone(),
            })?;
        }

        if use_delta_manifest {
            for removed in rows.iter().filter(|r| r.status == ChangeStatus::Removed) {
                deck.add_f_card(FCard {
                    path: removed.pathname.clone(),
                    hash: None,
                    perm: Permission::Regular,
                    prior_name: None,
                })?;
            }
        }

        if let Some(branch) = &req.branch {
            deck.add_t_card(TCard { sign: TagSign::Add, name: "branch".into(), target: None, value: Some(branch.clone()) })?;
            deck.add_t_card(TCard { sign: TagSign::Propagate, name: format!("sym-{branch}"), target: None, value: None })?;
        }
        if req.close_leaf {
            deck.add_t_card(TCard { sign: TagSign::Add, name: "closed".into(), target: None, value: None })?;
        }

        let bytes = fossil_deck::serialize(&deck, HashKind::Sha3_256)?;
        let (manifest_rid, manifest_hash) = blobs.put(&bytes, None, false)?;

        let mut session = Session::begin(db)?;
        session.crosslink(manifest_rid, &manifest_hash, &deck)?;
        session.end(ctx)?;

        clear_vfile(db, vfile_vid)?;
        for mut row in new_rows {
            row.vid = manifest_rid;
            insert_vfile_row(db, &row)?;
        }

        Ok(CommitResult { rid: manifest_rid, hash: manifest_hash })
    })();

    match outcome {
        Ok(result) => {
            db.end()?;
            Ok(result)
        }
        Err(e) => {
            db.poison();
            Err(e)
        }
    }
}

fn blob_hash(db: &Database, rid: i64) -> Result<String, Error> {
    db.with_stmt("SELECT uuid FROM repo.blob WHERE rid = ?1", |stmt| {
        stmt.query_row([rid], |r| r.get(0)).map_err(Into::into)
    })
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_core::Config;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn repo() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.attach_local(":memory:").unwrap();
        db
    }

    fn ctx() -> Context {
        Context::new(Config::new(PathBuf::from("/tmp/does-not-matter")))
    }

    fn root_manifest(db: &Database) -> i64 {
        let blobs = BlobStore::new(db, HashPolicy::Auto);
        let mut deck = Deck::new(ArtifactType::Checkin);
        deck.set_comment("root".into()).unwrap();
        deck.set_date("2024-01-01T00:00:00Z".into()).unwrap();
        deck.set_user("alice".into()).unwrap();
        let bytes = fossil_deck::serialize(&deck, HashKind::Sha3_256).unwrap();
        blobs.put(&bytes, None, false).unwrap().0
    }

    #[test]
    fn committing_with_no_changes_is_a_noop_error() {
        let db = repo();
        let ctx = ctx();
        let parent = root_manifest(&db);
        let dir = tempdir().unwrap();
        let req = CommitRequest { comment: "x".into(), user: "alice".into(), ..Default::default() };
        let err = commit(&db, &ctx, dir.path(), Some(parent), &req).unwrap_err();
        assert!(matches!(err, Error::Noop));
    }

    #[test]
    fn committing_a_new_file_advances_the_checkout() {
        let db = repo();
        let ctx = ctx();
        let parent = root_manifest(&db);
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();

        insert_vfile_row(
            &db,
            &VFile {
                id: 0,
                vid: parent,
                chnged: true,
                deleted: false,
                isexe: false,
                islink: false,
                rid: None,
                mrid: None,
                pathname: "a.txt".into(),
                origname: None,
                size: Some(6),
                mtime: Some(0),
                status: ChangeStatus::Added,
            },
        )
        .unwrap();

        let req = CommitRequest { comment: "add a".into(), user: "alice".into(), ..Default::default() };
        let result = commit(&db, &ctx, dir.path(), Some(parent), &req).unwrap();
        assert_ne!(result.rid, parent);

        let rows = load_vfile(&db, result.rid).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pathname, "a.txt");
    }

    #[test]
    fn committing_the_initial_empty_repo_creates_a_root_checkin() {
        let db = repo();
        let ctx = ctx();
        let dir = tempdir().unwrap();

        let req = CommitRequest { comment: "init".into(), user: "alice".into(), ..Default::default() };
        let result = commit(&db, &ctx, dir.path(), None, &req).unwrap();

        let rows = load_vfile(&db, result.rid).unwrap();
        assert!(rows.is_empty());
    }
}
