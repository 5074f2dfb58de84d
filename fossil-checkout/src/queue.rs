//! Add/remove/rename queueing (§4.7): mutates `local.vfile` only. Nothing
//! here touches the repository — the effect is realized at the next
//! commit.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use fossil_storage::Database;

use crate::error::Error;
use crate::vfile::{insert_vfile_row, load_vfile, update_vfile_status, ChangeStatus, VFile};

const RESERVED_NAMES: &[&str] = &[".fslckout", "_FOSSIL_", ".fos"];

pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|e| Error::Misuse(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::Misuse(e.to_string()))
}

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Recursively walk `root`, queueing any file not already tracked in
/// `vid` and not matched by `ignore`. Returns the relative paths queued.
pub fn manage(db: &Database, root: &Path, vid: i64, ignore: &GlobSet) -> Result<Vec<String>, Error> {
    let tracked: std::collections::HashSet<String> =
        load_vfile(db, vid)?.into_iter().map(|r| r.pathname).collect();

    let mut queued = Vec::new();
    walk(db, root, root, vid, ignore, &tracked, &mut queued)?;
    Ok(queued)
}

fn walk(
    db: &Database,
    root: &Path,
    dir: &Path,
    vid: i64,
    ignore: &GlobSet,
    tracked: &std::collections::HashSet<String>,
    queued: &mut Vec<String>,
) -> Result<(), Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_reserved(&name) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if ignore.is_match(&relative) {
            continue;
        }

        let meta = entry.metadata()?;
        if meta.is_dir() {
            walk(db, root, &path, vid, ignore, tracked, queued)?;
            continue;
        }
        if tracked.contains(relative.as_str()) {
            continue;
        }

        #[cfg(unix)]
        let isexe = {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o111 != 0
        };
        #[cfg(not(unix))]
        let isexe = false;

        insert_vfile_row(
            db,
            &VFile {
                id: 0,
                vid,
                chnged: true,
                deleted: false,
                isexe,
                islink: meta.file_type().is_symlink(),
                rid: None,
                mrid: None,
                pathname: relative.clone(),
                origname: None,
                size: Some(meta.len() as i64),
                mtime: None,
                status: ChangeStatus::Added,
            },
        )?;
        queued.push(relative);
    }
    Ok(())
}

/// Queue `paths` for removal at the next commit. A file that was itself
/// only ever queued (never committed) is simply un-queued instead.
pub fn unmanage(db: &Database, vid: i64, paths: &[String]) -> Result<(), Error> {
    let rows = load_vfile(db, vid)?;
    for path in paths {
        let Some(row) = rows.iter().find(|r| r.pathname == *path) else {
            continue;
        };
        if row.status == ChangeStatus::Added && row.rid.is_none() {
            db.with_stmt("DELETE FROM local.vfile WHERE id = ?1", |stmt| {
                stmt.execute([row.id]).map_err(Into::into)
            })?;
        } else {
            update_vfile_status(db, row.id, ChangeStatus::Removed, row.size, row.mtime)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.attach_local(":memory:").unwrap();
        db
    }

    #[test]
    fn manage_queues_untracked_files_and_skips_ignored() {
        let db = repo();
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("keep.rs"), b"x").unwrap();
        std::fs::write(dir.path().join("scratch.tmp"), b"x").unwrap();

        let ignore = build_ignore_set(&["*.tmp".to_string()]).unwrap();
        let queued = manage(&db, dir.path(), 1, &ignore).unwrap();

        assert_eq!(queued, vec!["keep.rs".to_string()]);
    }

    #[test]
    fn unmanage_drops_never_committed_rows_entirely() {
        let db = repo();
        insert_vfile_row(
            &db,
            &VFile {
                id: 0,
                vid: 1,
                chnged: true,
                deleted: false,
                isexe: false,
                islink: false,
                rid: None,
                mrid: None,
                pathname: "new.txt".into(),
                origname: None,
                size: Some(0),
                mtime: None,
                status: ChangeStatus::Added,
            },
        )
        .unwrap();

        unmanage(&db, 1, &["new.txt".to_string()]).unwrap();
        assert!(load_vfile(&db, 1).unwrap().is_empty());
    }
}
