//! Checkout extract (§4.7): load a manifest's effective file list and
//! realize it on disk, reconciling with whatever the working directory
//! already holds.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use fossil_deck::{ArtifactType, BaselineLoader, Deck, Permission};
use fossil_hash::HashPolicy;
use fossil_storage::{BlobStore, Database};

use crate::error::Error;
use crate::vfile::{clear_vfile, insert_vfile_row, set_vvar, ChangeStatus, VFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAnswer {
    Yes,
    No,
    Always,
    Never,
    Cancel,
}

/// Mediates destructive overwrites of locally modified, unmanaged files
/// during extract (§7).
pub trait Confirmer {
    fn confirm_overwrite(&mut self, path: &str) -> ConfirmAnswer;
}

/// Always overwrites; suitable for a fresh checkout of an empty directory.
pub struct AlwaysYes;

impl Confirmer for AlwaysYes {
    fn confirm_overwrite(&mut self, _path: &str) -> ConfirmAnswer {
        ConfirmAnswer::Yes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOptions {
    /// Write `manifest`, `manifest.uuid`, `manifest.tags` pseudo-files
    /// into the checkout root, as governed by the `manifest` setting.
    pub export_manifest_files: bool,
}

pub(crate) struct RepoBaselineLoader<'a> {
    db: &'a Database,
}

impl<'a> BaselineLoader for RepoBaselineLoader<'a> {
    fn load_baseline_bytes(&self, hash: &str) -> Option<Vec<u8>> {
        let blobs = BlobStore::new(self.db, HashPolicy::Auto);
        let rid = blobs.find_rid(hash).ok()?;
        blobs.get(rid).ok()
    }
}

pub(crate) fn repo_loader(db: &Database) -> RepoBaselineLoader<'_> {
    RepoBaselineLoader { db }
}

fn resolve_in_root(root: &Path, relative: &str) -> Result<PathBuf, Error> {
    if relative.starts_with('/') || relative.split('/').any(|seg| seg == "..") {
        return Err(Error::PathEscape(relative.to_string()));
    }
    Ok(root.join(relative))
}

fn write_file(abs: &Path, content: &[u8], perm: Permission) -> Result<(), Error> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)?;
    }

    match perm {
        Permission::Symlink => {
            let target = String::from_utf8_lossy(content).into_owned();
            let _ = fs::remove_file(abs);
            std::os::unix::fs::symlink(target, abs)?;
        }
        Permission::Regular | Permission::Executable => {
            fs::write(abs, content)?;
            let mut mode = 0o644;
            if matches!(perm, Permission::Executable) {
                mode = 0o755;
            }
            fs::set_permissions(abs, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

fn remove_empty_dirs_upward(root: &Path, file_path: &Path) {
    let mut dir = file_path.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        match fs::read_dir(d) {
            Ok(mut entries) if entries.next().is_none() => {
                let _ = fs::remove_dir(d);
                dir = d.parent();
            }
            _ => break,
        }
    }
}

/// Extract manifest `rid` into `root`. `previous` is the file set of the
/// checkout's current version (empty for a fresh checkout).
pub fn checkout(
    db: &Database,
    root: &Path,
    rid: i64,
    previous: &[VFile],
    confirmer: &mut dyn Confirmer,
    opts: CheckoutOptions,
) -> Result<Vec<VFile>, Error> {
    let blobs = BlobStore::new(db, HashPolicy::Auto);
    let manifest_bytes = blobs.get(rid)?;
    let deck = fossil_deck::parse(&manifest_bytes)?;
    if deck.artifact_type != ArtifactType::Checkin {
        return Err(Error::Misuse("checkout target is not a checkin artifact".into()));
    }

    let loader = RepoBaselineLoader { db };
    let files = deck.effective_files(&loader)?;
    let new_paths: std::collections::HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();

    for old in previous {
        if new_paths.contains(old.pathname.as_str()) {
            continue;
        }
        let abs = resolve_in_root(root, &old.pathname)?;
        if old.chnged {
            continue; // locally modified: leave it, per §4.7
        }
        if fs::remove_file(&abs).is_ok() {
            remove_empty_dirs_upward(root, &abs);
        }
    }

    clear_vfile(db, rid)?;
    let mut result = Vec::with_capacity(files.len());

    for f in &files {
        let Some(hash) = &f.hash else { continue };
        let abs = resolve_in_root(root, &f.path)?;

        if abs.exists() {
            let locally_modified = previous
                .iter()
                .find(|p| p.pathname == f.path)
                .map(|p| p.chnged)
                .unwrap_or(false);
            if locally_modified {
                match confirmer.confirm_overwrite(&f.path) {
                    ConfirmAnswer::No | ConfirmAnswer::Never => continue,
                    ConfirmAnswer::Cancel => return Err(Error::Cancelled),
                    ConfirmAnswer::Yes | ConfirmAnswer::Always => {}
                }
            }
        }

        let content = blobs.get(blobs.find_rid(hash)?)?;
        write_file(&abs, &content, f.perm)?;

        let mtime = FileTime::now();
        filetime::set_file_times(&abs, mtime, mtime).ok();

        let row = VFile {
            id: 0,
            vid: rid,
            chnged: false,
            deleted: false,
            isexe: matches!(f.perm, Permission::Executable),
            islink: matches!(f.perm, Permission::Symlink),
            rid: Some(blobs.find_rid(hash)?),
            mrid: Some(blobs.find_rid(hash)?),
            pathname: f.path.clone(),
            origname: f.prior_name.clone(),
            size: Some(content.len() as i64),
            mtime: Some(mtime.unix_seconds()),
            status: ChangeStatus::Unchanged,
        };
        insert_vfile_row(db, &row)?;
        result.push(row);
    }

    set_vvar(db, "checkout-version", &rid.to_string())?;

    if opts.export_manifest_files {
        export_pseudo_files(root, &manifest_bytes, &deck)?;
    }

    Ok(result)
}

fn export_pseudo_files(root: &Path, manifest_bytes: &[u8], deck: &Deck) -> Result<(), Error> {
    fs::write(root.join("manifest"), manifest_bytes)?;
    if let Some(hash) = &deck.self_hash {
        fs::write(root.join("manifest.uuid"), format!("{hash}\n"))?;
    }
    let tags: Vec<&str> = deck.t_cards.iter().map(|t| t.name.as_str()).collect();
    fs::write(root.join("manifest.tags"), tags.join("\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_deck::{ArtifactType, Deck, FCard};
    use tempfile::tempdir;

    fn repo() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.attach_local(":memory:").unwrap();
        db
    }

    #[test]
    fn fresh_checkout_writes_files_and_vfile_rows() {
        let db = repo();
        let blobs = BlobStore::new(&db, HashPolicy::Auto);
        let (file_rid, file_hash) = blobs.put(b"hello\n", None, false).unwrap();
        let _ = file_rid;

        let mut deck = Deck::new(ArtifactType::Checkin);
        deck.set_comment("c".into()).unwrap();
        deck.set_date("2024-01-01T00:00:00Z".into()).unwrap();
        deck.set_user("alice".into()).unwrap();
        deck.add_f_card(FCard {
            path: "README".into(),
            hash: Some(file_hash),
            perm: Permission::Regular,
            prior_name: None,
        })
        .unwrap();
        let bytes = fossil_deck::serialize(&deck, fossil_hash::HashKind::Sha3_256).unwrap();
        let (manifest_rid, _manifest_hash) = blobs.put(&bytes, None, false).unwrap();

        let dir = tempdir().unwrap();
        let rows = checkout(&db, dir.path(), manifest_rid, &[], &mut AlwaysYes, CheckoutOptions::default()).unwrap();

        assert_eq!(rows.len(), 1);
        let content = std::fs::read(dir.path().join("README")).unwrap();
        assert_eq!(content, b"hello\n");
    }

    #[test]
    fn path_escape_is_rejected() {
        let err = resolve_in_root(Path::new("/tmp/co"), "../../etc/passwd");
        assert!(err.is_err());
    }
}
