//! Accessors over `repo.config` (repository-wide settings, §6.7) and
//! `local.vvar` (per-checkout scalars, §6.4).

use crate::db::Database;
use crate::error::Result;

pub struct RepoConfig<'a>(&'a Database);

impl<'a> RepoConfig<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self(db)
    }

    pub fn get(&self, name: &str) -> Result<Option<String>> {
        match self.0.conn.query_row(
            "SELECT value FROM repo.config WHERE name = ?1",
            [name],
            |r| r.get(0),
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_bool(&self, name: &str, default: bool) -> Result<bool> {
        Ok(match self.get(name)? {
            Some(v) => matches!(v.as_str(), "1" | "true" | "on" | "yes"),
            None => default,
        })
    }

    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        self.0.conn.execute(
            "INSERT INTO repo.config(name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            [name, value],
        )?;
        Ok(())
    }
}

pub struct CheckoutVars<'a>(&'a Database);

impl<'a> CheckoutVars<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self(db)
    }

    pub fn get(&self, name: &str) -> Result<Option<String>> {
        match self.0.conn.query_row(
            "SELECT value FROM local.vvar WHERE name = ?1",
            [name],
            |r| r.get(0),
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        self.0.conn.execute(
            "INSERT INTO local.vvar(name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            [name, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_config_round_trips_and_defaults() {
        let mut db = Database::open_memory().unwrap();
        db.attach_repo(":memory:").unwrap();
        let cfg = RepoConfig::new(&db);

        assert_eq!(cfg.get_bool("allow-symlinks", false).unwrap(), false);
        cfg.set("allow-symlinks", "1").unwrap();
        assert!(cfg.get_bool("allow-symlinks", false).unwrap());
        cfg.set("allow-symlinks", "0").unwrap();
        assert!(!cfg.get_bool("allow-symlinks", true).unwrap());
    }
}
