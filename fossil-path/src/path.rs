use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use fossil_storage::Database;

use crate::chain::PathChain;
use crate::error::Error;
use crate::graph::{neighbors, PathMode};

/// Priority-queue BFS (§4.8): priority is step count, with primary-parent
/// edges preferred among equal-distance alternatives. Returns `None` if
/// `to` is unreachable from `from` in the given mode.
pub fn shortest_path(db: &Database, from: i64, to: i64, mode: PathMode) -> Result<Option<PathChain>, Error> {
    if from == to {
        return Ok(Some(PathChain::new(vec![from])));
    }

    let mut dist: HashMap<i64, u32> = HashMap::new();
    let mut prev: HashMap<i64, i64> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(from, 0);
    heap.push(Reverse((0u32, 0u8, from)));

    while let Some(Reverse((d, _, node))) = heap.pop() {
        if node == to {
            return Ok(Some(reconstruct(&prev, from, to)));
        }
        if d > *dist.get(&node).unwrap_or(&u32::MAX) {
            continue;
        }

        for (nbr, via_primary) in neighbors(db, node, mode)? {
            let nd = d + 1;
            if nd < *dist.get(&nbr).unwrap_or(&u32::MAX) {
                dist.insert(nbr, nd);
                prev.insert(nbr, node);
                heap.push(Reverse((nd, if via_primary { 0 } else { 1 }, nbr)));
            }
        }
    }

    Ok(None)
}

/// Convenience wrapper returning the error variant instead of `None`.
pub fn shortest_path_or_err(db: &Database, from: i64, to: i64, mode: PathMode) -> Result<PathChain, Error> {
    shortest_path(db, from, to, mode)?.ok_or(Error::NoPath { from, to })
}

fn reconstruct(prev: &HashMap<i64, i64>, from: i64, to: i64) -> PathChain {
    let mut rids = vec![to];
    let mut cur = to;
    while cur != from {
        cur = prev[&cur];
        rids.push(cur);
    }
    rids.reverse();
    PathChain::new(rids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fossil_storage::Database;

    fn repo_with_plinks(edges: &[(i64, i64, bool)]) -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        for &(pid, cid, isprim) in edges {
            db.with_stmt(
                "INSERT INTO repo.plink(pid, cid, isprim) VALUES (?1, ?2, ?3)",
                |stmt| stmt.execute(rusqlite::params![pid, cid, isprim]).map_err(Into::into),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn finds_direct_parent_child_path() {
        let db = repo_with_plinks(&[(1, 2, true)]);
        let chain = shortest_path(&db, 1, 2, PathMode::Undirected).unwrap().unwrap();
        assert_eq!(chain.as_slice(), &[1, 2]);
    }

    #[test]
    fn undirected_mode_finds_common_ancestor_path() {
        // 1 -> 2 -> 3, 1 -> 4 -> 3 (a merge): shortest undirected path
        // between 2 and 4 goes through 1 or 3, both length 3.
        let db = repo_with_plinks(&[(1, 2, true), (2, 3, true), (1, 4, true), (4, 3, false)]);
        let chain = shortest_path(&db, 2, 4, PathMode::Undirected).unwrap().unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn one_way_mode_rejects_ancestor_direction() {
        let db = repo_with_plinks(&[(1, 2, true)]);
        // 2 does not descend from... wait, 1 is the parent of 2, so 2
        // descends from 1, but 1 does not descend from 2.
        let result = shortest_path(&db, 2, 1, PathMode::OneWay).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn returns_none_for_disconnected_nodes() {
        let db = repo_with_plinks(&[(1, 2, true)]);
        db.with_stmt("INSERT INTO repo.plink(pid, cid, isprim) VALUES (?1, ?2, ?3)", |stmt| {
            stmt.execute(rusqlite::params![3, 4, true]).map_err(Into::into)
        })
        .unwrap();
        assert!(shortest_path(&db, 1, 4, PathMode::Undirected).unwrap().is_none());
    }
}
