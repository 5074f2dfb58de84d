//! The `local.vfile` tracking table (§3.3): one row per file in the
//! checked-out version, carrying enough state to drive change scan,
//! update and commit without re-reading the manifest each time.

use fossil_storage::Database;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Unchanged,
    Edited,
    Added,
    Removed,
    MergedMod,
    MergedAdd,
    IntegrateMod,
    IntegrateAdd,
    PermChanged,
    SymlinkFlip,
}

impl ChangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeStatus::Unchanged => "unchanged",
            ChangeStatus::Edited => "edited",
            ChangeStatus::Added => "added",
            ChangeStatus::Removed => "removed",
            ChangeStatus::MergedMod => "merged-mod",
            ChangeStatus::MergedAdd => "merged-add",
            ChangeStatus::IntegrateMod => "integrate-mod",
            ChangeStatus::IntegrateAdd => "integrate-add",
            ChangeStatus::PermChanged => "perm-changed",
            ChangeStatus::SymlinkFlip => "symlink-flip",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "edited" => ChangeStatus::Edited,
            "added" => ChangeStatus::Added,
            "removed" => ChangeStatus::Removed,
            "merged-mod" => ChangeStatus::MergedMod,
            "merged-add" => ChangeStatus::MergedAdd,
            "integrate-mod" => ChangeStatus::IntegrateMod,
            "integrate-add" => ChangeStatus::IntegrateAdd,
            "perm-changed" => ChangeStatus::PermChanged,
            "symlink-flip" => ChangeStatus::SymlinkFlip,
            _ => ChangeStatus::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VFile {
    pub id: i64,
    pub vid: i64,
    pub chnged: bool,
    pub deleted: bool,
    pub isexe: bool,
    pub islink: bool,
    pub rid: Option<i64>,
    pub mrid: Option<i64>,
    pub pathname: String,
    pub origname: Option<String>,
    pub size: Option<i64>,
    pub mtime: Option<i64>,
    pub status: ChangeStatus,
}

pub fn load_vfile(db: &Database, vid: i64) -> Result<Vec<VFile>, Error> {
    db.with_stmt(
        "SELECT id, vid, chnged, deleted, isexe, islink, rid, mrid, pathname, origname, size, mtime, status
         FROM local.vfile WHERE vid = ?1 ORDER BY pathname",
        |stmt| {
            let rows = stmt.query_map([vid], |r| {
                Ok(VFile {
                    id: r.get(0)?,
                    vid: r.get(1)?,
                    chnged: r.get::<_, i64>(2)? != 0,
                    deleted: r.get::<_, i64>(3)? != 0,
                    isexe: r.get::<_, i64>(4)? != 0,
                    islink: r.get::<_, i64>(5)? != 0,
                    rid: r.get(6)?,
                    mrid: r.get(7)?,
                    pathname: r.get(8)?,
                    origname: r.get(9)?,
                    size: r.get(10)?,
                    mtime: r.get(11)?,
                    status: ChangeStatus::parse(&r.get::<_, String>(12)?),
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        },
    )
    .map_err(Error::from)
}

pub fn clear_vfile(db: &Database, vid: i64) -> Result<(), Error> {
    db.with_stmt("DELETE FROM local.vfile WHERE vid = ?1", |stmt| {
        stmt.execute([vid]).map_err(Into::into)
    })?;
    Ok(())
}

pub fn insert_vfile_row(db: &Database, f: &VFile) -> Result<i64, Error> {
    db.with_stmt(
        "INSERT INTO local.vfile(vid, chnged, deleted, isexe, islink, rid, mrid, pathname, origname, size, mtime, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        |stmt| {
            stmt.execute(rusqlite::params![
                f.vid,
                f.chnged as i64,
                f.deleted as i64,
                f.isexe as i64,
                f.islink as i64,
                f.rid,
                f.mrid,
                f.pathname,
                f.origname,
                f.size,
                f.mtime,
                f.status.as_str(),
            ])
            .map_err(Into::into)
        },
    )?;
    db.with_stmt("SELECT last_insert_rowid()", |stmt| {
        stmt.query_row([], |r| r.get(0)).map_err(Into::into)
    })
    .map_err(Error::from)
}

pub fn update_vfile_status(db: &Database, id: i64, status: ChangeStatus, size: Option<i64>, mtime: Option<i64>) -> Result<(), Error> {
    db.with_stmt(
        "UPDATE local.vfile SET status = ?1, size = ?2, mtime = ?3 WHERE id = ?4",
        |stmt| {
            stmt.execute(rusqlite::params![status.as_str(), size, mtime, id])
                .map_err(Into::into)
        },
    )?;
    Ok(())
}

pub fn get_vvar(db: &Database, name: &str) -> Result<Option<String>, Error> {
    db.with_stmt("SELECT value FROM local.vvar WHERE name = ?1", |stmt| {
        match stmt.query_row([name], |r| r.get(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    })
    .map_err(Error::from)
}

pub fn set_vvar(db: &Database, name: &str, value: &str) -> Result<(), Error> {
    db.with_stmt(
        "INSERT INTO local.vvar(name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        |stmt| stmt.execute(rusqlite::params![name, value]).map_err(Into::into),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout_db() -> Database {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        db.attach_local(":memory:").unwrap();
        db
    }

    #[test]
    fn round_trips_a_vfile_row() {
        let db = checkout_db();
        let row = VFile {
            id: 0,
            vid: 1,
            chnged: false,
            deleted: false,
            isexe: false,
            islink: false,
            rid: Some(42),
            mrid: Some(42),
            pathname: "README.md".into(),
            origname: None,
            size: Some(11),
            mtime: Some(1000),
            status: ChangeStatus::Unchanged,
        };
        insert_vfile_row(&db, &row).unwrap();

        let loaded = load_vfile(&db, 1).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pathname, "README.md");
        assert_eq!(loaded[0].status, ChangeStatus::Unchanged);
    }

    #[test]
    fn vvar_round_trips() {
        let db = checkout_db();
        assert_eq!(get_vvar(&db, "checkout-root").unwrap(), None);
        set_vvar(&db, "checkout-root", "/home/x/proj").unwrap();
        assert_eq!(get_vvar(&db, "checkout-root").unwrap(), Some("/home/x/proj".into()));
    }
}
