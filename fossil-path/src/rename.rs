//! Derived operation (§4.8): the set of file-rename events recorded along
//! a path between two commits, as `(old_fnid, new_fnid)` pairs.

use fossil_storage::Database;

use crate::chain::PathChain;
use crate::error::Error;

/// Every `mlink` row along the chain whose `pfnid` differs from its
/// `fnid` recorded a rename at that checkin. Order follows the chain;
/// duplicate pairs (the same rename recorded twice, e.g. from cherry-picks)
/// are collapsed.
pub fn find_filename_changes(db: &Database, chain: &PathChain) -> Result<Vec<(i64, i64)>, Error> {
    let mut out = Vec::new();

    for rid in chain.forward() {
        let pairs: Vec<(i64, i64)> = db.with_stmt(
            "SELECT pfnid, fnid FROM repo.mlink WHERE mid = ?1 AND pfnid != fnid",
            |stmt| {
                let rows = stmt.query_map([rid], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
            },
        )?;
        for pair in pairs {
            if !out.contains(&pair) {
                out.push(pair);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_at_second_commit_is_reported_once() {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();

        db.with_stmt(
            "INSERT INTO repo.mlink(mid, fid, pid, fnid, pfnid, perm) VALUES (?1, ?2, ?3, ?4, ?5, '')",
            |stmt| stmt.execute(rusqlite::params![1, 100, 0, 1, 1]).map_err(Into::into),
        )
        .unwrap();
        db.with_stmt(
            "INSERT INTO repo.mlink(mid, fid, pid, fnid, pfnid, perm) VALUES (?1, ?2, ?3, ?4, ?5, '')",
            |stmt| stmt.execute(rusqlite::params![2, 100, 100, 2, 1]).map_err(Into::into),
        )
        .unwrap();

        let chain = PathChain::new(vec![1, 2]);
        let changes = find_filename_changes(&db, &chain).unwrap();
        assert_eq!(changes, vec![(1, 2)]);
    }

    #[test]
    fn no_pfnid_fnid_difference_reports_nothing() {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.with_stmt(
            "INSERT INTO repo.mlink(mid, fid, pid, fnid, pfnid, perm) VALUES (?1, ?2, ?3, ?4, ?5, '')",
            |stmt| stmt.execute(rusqlite::params![1, 100, 0, 1, 1]).map_err(Into::into),
        )
        .unwrap();

        let chain = PathChain::new(vec![1]);
        assert!(find_filename_changes(&db, &chain).unwrap().is_empty());
    }
}
