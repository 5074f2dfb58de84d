//! Materializes a [`PathChain`] into a `temp.ancestor(rid, seq)` table so
//! callers can join against it in plain SQL instead of re-walking the
//! chain in Rust for every query.

use fossil_storage::Database;

use crate::chain::PathChain;
use crate::error::Error;

pub fn write_ancestor_table(db: &Database, chain: &PathChain) -> Result<(), Error> {
    db.with_stmt("DROP TABLE IF EXISTS temp.ancestor", |stmt| {
        stmt.execute([]).map_err(Into::into)
    })?;
    db.with_stmt(
        "CREATE TEMP TABLE ancestor(rid INTEGER PRIMARY KEY, seq INTEGER NOT NULL)",
        |stmt| stmt.execute([]).map_err(Into::into),
    )?;

    for (seq, rid) in chain.forward().enumerate() {
        db.with_stmt("INSERT INTO temp.ancestor(rid, seq) VALUES (?1, ?2)", |stmt| {
            stmt.execute(rusqlite::params![rid, seq as i64]).map_err(Into::into)
        })?;
    }

    Ok(())
}
