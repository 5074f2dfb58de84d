//! 3-way update (§4.7): merge the changes between the checkout's current
//! version and a target version, using their common ancestor as pivot.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use fossil_deck::{FCard, Permission};
use fossil_hash::HashPolicy;
use fossil_path::{shortest_path_or_err, PathMode};
use fossil_storage::{BlobStore, Database};

use crate::error::Error;
use crate::merge3::merge3;
use crate::vfile::load_vfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Unchanged,
    Added,
    Removed,
    UpdatedClean,
    UpdatedConflict,
    BinaryReplaced,
    LocallyModifiedKept,
}

pub trait UpdateReporter {
    fn report(&mut self, path: &str, outcome: UpdateOutcome);
}

pub struct Silent;
impl UpdateReporter for Silent {
    fn report(&mut self, _path: &str, _outcome: UpdateOutcome) {}
}

fn file_map(files: &[FCard]) -> HashMap<&str, &FCard> {
    files.iter().map(|f| (f.path.as_str(), f)).collect()
}

fn is_text(bytes: &[u8]) -> bool {
    bytes.iter().take(8000).all(|&b| b != 0)
}

fn lines_of(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes).lines().map(String::from).collect()
}

/// Merge `target` into the checkout currently at `current`, writing the
/// merged content into `root`. Both versions' effective file lists have
/// already been computed by the caller via `Deck::effective_files`.
pub fn update(
    db: &Database,
    root: &Path,
    current: i64,
    target: i64,
    current_files: &[FCard],
    target_files: &[FCard],
    reporter: &mut dyn UpdateReporter,
) -> Result<(), Error> {
    let blobs = BlobStore::new(db, HashPolicy::Auto);

    let pivot_rid = shortest_path_or_err(db, current, target, PathMode::Undirected)?
        .as_slice()
        .iter()
        .copied()
        .find(|rid| *rid != current && *rid != target)
        .unwrap_or(current);

    let pivot_manifest = blobs.get(pivot_rid)?;
    let pivot_deck = fossil_deck::parse(&pivot_manifest)?;
    let loader = crate::checkout::repo_loader(db);
    let pivot_files = pivot_deck.effective_files(&loader)?;

    let cur_map = file_map(current_files);
    let tgt_map = file_map(target_files);
    let piv_map = file_map(&pivot_files);

    let mut paths: Vec<&str> = cur_map.keys().chain(tgt_map.keys()).copied().collect();
    paths.sort_unstable();
    paths.dedup();

    let current_vfile = load_vfile(db, current)?;
    let locally_modified: std::collections::HashSet<&str> = current_vfile
        .iter()
        .filter(|f| f.chnged)
        .map(|f| f.pathname.as_str())
        .collect();

    for path in paths {
        let cur = cur_map.get(path).copied();
        let tgt = tgt_map.get(path).copied();
        let piv = piv_map.get(path).copied();
        let abs = root.join(path);
        let locally_mod = locally_modified.contains(path);

        match (cur, tgt) {
            (Some(_), None) => {
                if !locally_mod {
                    let _ = fs::remove_file(&abs);
                }
                reporter.report(path, UpdateOutcome::Removed);
            }
            (None, Some(t)) => {
                let hash = t.hash.clone().ok_or_else(|| Error::Misuse(format!("missing hash for {path}")))?;
                let content = blobs.get(blobs.find_rid(&hash)?)?;
                write_new(&abs, &content, t.perm)?;
                reporter.report(path, UpdateOutcome::Added);
            }
            (Some(c), Some(t)) => {
                if c.hash == t.hash {
                    reporter.report(path, UpdateOutcome::Unchanged);
                    continue;
                }
                if locally_mod {
                    reporter.report(path, UpdateOutcome::LocallyModifiedKept);
                    continue;
                }

                let target_hash = t.hash.clone().ok_or_else(|| Error::Misuse(format!("missing hash for {path}")))?;
                let target_content = blobs.get(blobs.find_rid(&target_hash)?)?;

                let pivot_hash = piv.and_then(|p| p.hash.clone());
                let changed_locally_since_pivot = pivot_hash.as_deref() != Some(c.hash.as_deref().unwrap_or(""));

                if !changed_locally_since_pivot {
                    write_new(&abs, &target_content, t.perm)?;
                    reporter.report(path, UpdateOutcome::UpdatedClean);
                    continue;
                }

                if !is_text(&target_content) {
                    write_new(&abs, &target_content, t.perm)?;
                    reporter.report(path, UpdateOutcome::BinaryReplaced);
                    continue;
                }

                let pivot_content = match &pivot_hash {
                    Some(h) => blobs.get(blobs.find_rid(h)?)?,
                    None => Vec::new(),
                };
                let local_content = fs::read(&abs).unwrap_or_default();

                let outcome = merge3(&lines_of(&pivot_content), &lines_of(&local_content), &lines_of(&target_content));
                let mut merged = outcome.lines.join("\n");
                merged.push('\n');
                fs::write(&abs, merged)?;

                reporter.report(
                    path,
                    if outcome.conflict {
                        UpdateOutcome::UpdatedConflict
                    } else {
                        UpdateOutcome::UpdatedClean
                    },
                );
            }
            (None, None) => unreachable!("path present in neither map"),
        }
    }

    Ok(())
}

fn write_new(abs: &Path, content: &[u8], perm: Permission) -> Result<(), Error> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(abs, content)?;
    if matches!(perm, Permission::Executable) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(abs, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_deck::{ArtifactType, Deck};
    use tempfile::tempdir;

    fn repo() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.attach_local(":memory:").unwrap();
        db
    }

    fn manifest(db: &Database, path: &str, content: &[u8], parent: Option<(i64, String)>) -> (i64, String, Vec<FCard>) {
        let blobs = BlobStore::new(db, HashPolicy::Auto);
        let (_, hash) = blobs.put(content, None, false).unwrap();
        let mut deck = Deck::new(ArtifactType::Checkin);
        deck.set_comment("c".into()).unwrap();
        deck.set_date("2024-01-01T00:00:00Z".into()).unwrap();
        deck.set_user("alice".into()).unwrap();
        deck.add_f_card(FCard { path: path.into(), hash: Some(hash), perm: Permission::Regular, prior_name: None })
            .unwrap();
        let parent_rid = parent.as_ref().map(|(rid, _)| *rid);
        if let Some((_, parent_hash)) = &parent {
            deck.add_p_card(parent_hash.clone()).unwrap();
        }
        let bytes = fossil_deck::serialize(&deck, fossil_hash::HashKind::Sha3_256).unwrap();
        let (rid, rid_hash) = blobs.put(&bytes, None, false).unwrap();
        if let Some(p) = parent_rid {
            db.with_stmt("INSERT INTO repo.plink(pid, cid, isprim) VALUES (?1, ?2, 1)", |stmt| {
                stmt.execute(rusqlite::params![p, rid]).map_err(Into::into)
            })
            .unwrap();
        }
        let files = deck.effective_files(&fossil_deck::NoBaseline).unwrap();
        (rid, rid_hash, files)
    }

    #[test]
    fn clean_update_writes_target_content_when_untouched_locally() {
        let db = repo();
        let (pivot_rid, pivot_hash, pivot_files) = manifest(&db, "a.txt", b"one\n", None);
        let (target_rid, _target_hash, target_files) = manifest(&db, "a.txt", b"two\n", Some((pivot_rid, pivot_hash)));

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"one\n").unwrap();

        update(&db, dir.path(), pivot_rid, target_rid, &pivot_files, &target_files, &mut Silent).unwrap();
        let content = std::fs::read(dir.path().join("a.txt")).unwrap();
        assert_eq!(content, b"two\n");
    }
}
