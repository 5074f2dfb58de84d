//! Neighbor lookups over `repo.plink`, the only table this crate reads.

use fossil_storage::Database;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Follow both parent and child edges — used for ancestry / merge-base
    /// queries, where either endpoint may be the older one.
    Undirected,
    /// Follow child edges only, starting at the presumed ancestor — used
    /// for "does A descend from B".
    OneWay,
}

/// One step out of `rid`: the neighbor's rid, and whether the edge taken
/// was a primary-parent edge (preferred when breaking ties on distance).
pub(crate) fn neighbors(db: &Database, rid: i64, mode: PathMode) -> Result<Vec<(i64, bool)>, Error> {
    let mut out = Vec::new();

    let children: Vec<(i64, bool)> = db.with_stmt(
        "SELECT cid, isprim FROM repo.plink WHERE pid = ?1",
        |stmt| {
            let rows = stmt.query_map([rid], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)? != 0)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        },
    )?;
    out.extend(children);

    if matches!(mode, PathMode::Undirected) {
        let parents: Vec<(i64, bool)> = db.with_stmt(
            "SELECT pid, isprim FROM repo.plink WHERE cid = ?1",
            |stmt| {
                let rows = stmt.query_map([rid], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)? != 0)))?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
            },
        )?;
        out.extend(parents);
    }

    Ok(out)
}
