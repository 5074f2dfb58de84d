//! Revert (§4.7): restore specific files to their repository content,
//! un-queue pending add/remove, and undo pending renames.

use std::fs;
use std::path::Path;

use fossil_hash::HashPolicy;
use fossil_storage::{BlobStore, Database};

use crate::error::Error;
use crate::vfile::{load_vfile, update_vfile_status, ChangeStatus, VFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertAction {
    RestoredFromRepo,
    UnqueuedAdd,
    UnqueuedRemove,
    UndidRename,
    NothingToDo,
}

pub trait RevertReporter {
    fn report(&mut self, path: &str, action: RevertAction);
}

pub struct Silent;
impl RevertReporter for Silent {
    fn report(&mut self, _path: &str, _action: RevertAction) {}
}

/// Revert `paths` within checkout `vid` rooted at `root`. An empty
/// `paths` reverts every tracked file.
pub fn revert(db: &Database, root: &Path, vid: i64, paths: &[String], reporter: &mut dyn RevertReporter) -> Result<(), Error> {
    let rows = load_vfile(db, vid)?;
    let blobs = BlobStore::new(db, HashPolicy::Auto);

    for row in &rows {
        if !paths.is_empty() && !paths.iter().any(|p| p == &row.pathname) {
            continue;
        }
        revert_one(db, root, row, &blobs, reporter)?;
    }
    Ok(())
}

fn revert_one(
    db: &Database,
    root: &Path,
    row: &VFile,
    blobs: &BlobStore<'_>,
    reporter: &mut dyn RevertReporter,
) -> Result<(), Error> {
    let abs = root.join(&row.pathname);

    match row.status {
        ChangeStatus::Added if row.rid.is_none() => {
            db.with_stmt("DELETE FROM local.vfile WHERE id = ?1", |stmt| {
                stmt.execute([row.id]).map_err(Into::into)
            })?;
            reporter.report(&row.pathname, RevertAction::UnqueuedAdd);
        }
        ChangeStatus::Removed => {
            update_vfile_status(db, row.id, ChangeStatus::Unchanged, row.size, row.mtime)?;
            reporter.report(&row.pathname, RevertAction::UnqueuedRemove);
        }
        ChangeStatus::Unchanged => {
            reporter.report(&row.pathname, RevertAction::NothingToDo);
        }
        _ => {
            let had_rename = row.origname.is_some();
            if let Some(rid) = row.rid {
                let content = blobs.get(rid)?;
                if let Some(parent) = abs.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&abs, content)?;
            }
            update_vfile_status(db, row.id, ChangeStatus::Unchanged, row.size, row.mtime)?;
            reporter.report(
                &row.pathname,
                if had_rename { RevertAction::UndidRename } else { RevertAction::RestoredFromRepo },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_storage::BlobStore as Blobs;
    use tempfile::tempdir;

    fn repo() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.attach_local(":memory:").unwrap();
        db
    }

    #[test]
    fn reverting_an_edited_file_restores_repo_content() {
        let db = repo();
        let blobs = Blobs::new(&db, HashPolicy::Auto);
        let (rid, _hash) = blobs.put(b"original\n", None, false).unwrap();

        crate::vfile::insert_vfile_row(
            &db,
            &VFile {
                id: 0,
                vid: 1,
                chnged: true,
                deleted: false,
                isexe: false,
                islink: false,
                rid: Some(rid),
                mrid: Some(rid),
                pathname: "a.txt".into(),
                origname: None,
                size: Some(9),
                mtime: Some(0),
                status: ChangeStatus::Edited,
            },
        )
        .unwrap();

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"locally edited\n").unwrap();

        revert(&db, dir.path(), 1, &[], &mut Silent).unwrap();

        let content = std::fs::read(dir.path().join("a.txt")).unwrap();
        assert_eq!(content, b"original\n");
        let rows = load_vfile(&db, 1).unwrap();
        assert_eq!(rows[0].status, ChangeStatus::Unchanged);
    }
}
