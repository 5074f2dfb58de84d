//! Change scan (§4.7): compares `local.vfile` against the working
//! directory and updates each row's status in place.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use fossil_storage::Database;

use crate::error::Error;
use crate::vfile::{load_vfile, update_vfile_status, ChangeStatus, VFile};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Recompute the content hash even when size and mtime both match the
    /// recorded row — catches edits that preserve size and land on the
    /// same second, at the cost of reading every file's content.
    pub hash_even_if_mtime_matches: bool,
}

fn blob_uuid(db: &Database, rid: i64) -> Result<Option<String>, Error> {
    db.with_stmt("SELECT uuid FROM repo.blob WHERE rid = ?1", |stmt| {
        match stmt.query_row([rid], |r| r.get(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    })
    .map_err(Error::from)
}

fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Runs the scan and returns the (possibly reclassified) rows. Each row's
/// `status` in storage is updated to match the return value.
pub fn scan_changes(db: &Database, root: &Path, vid: i64, opts: ScanOptions) -> Result<Vec<VFile>, Error> {
    let mut rows = load_vfile(db, vid)?;

    for row in rows.iter_mut() {
        let abs = root.join(&row.pathname);
        let new_status = match fs::symlink_metadata(&abs) {
            Err(_) => ChangeStatus::Removed,
            Ok(meta) => classify_present_file(db, row, &meta, &abs, opts)?,
        };

        if new_status != row.status {
            let (size, mtime) = match fs::symlink_metadata(&abs) {
                Ok(meta) => (Some(meta.len() as i64), Some(mtime_secs(&meta))),
                Err(_) => (None, None),
            };
            update_vfile_status(db, row.id, new_status, size, mtime)?;
            row.status = new_status;
        }
    }

    Ok(rows)
}

fn classify_present_file(
    db: &Database,
    row: &VFile,
    meta: &fs::Metadata,
    abs: &Path,
    opts: ScanOptions,
) -> Result<ChangeStatus, Error> {
    let is_link = meta.file_type().is_symlink();
    let is_exe = !is_link && meta.permissions().mode() & 0o111 != 0;
    let size = meta.len() as i64;
    let mtime = mtime_secs(meta);

    if is_link != row.islink {
        return Ok(ChangeStatus::SymlinkFlip);
    }
    if is_exe != row.isexe {
        return Ok(ChangeStatus::PermChanged);
    }
    if row.size != Some(size) {
        return Ok(ChangeStatus::Edited);
    }

    let must_hash = opts.hash_even_if_mtime_matches || row.mtime != Some(mtime);
    if !must_hash {
        return Ok(ChangeStatus::Unchanged);
    }

    let Some(rid) = row.rid else {
        return Ok(ChangeStatus::Edited);
    };
    let Some(recorded) = blob_uuid(db, rid)? else {
        return Ok(ChangeStatus::Edited);
    };
    let content = fs::read(abs)?;
    let current = match fossil_hash::HashKind::from_hex_len(recorded.len()) {
        Some(fossil_hash::HashKind::Sha1) => fossil_hash::Sha1Hasher::hash(&content)
            .map(|d| d.to_string())
            .unwrap_or_default(),
        _ => fossil_hash::Sha3Hasher::hash(&content).to_string(),
    };
    if recorded == current {
        Ok(ChangeStatus::Unchanged)
    } else {
        Ok(ChangeStatus::Edited)
    }
}
