//! The physical database handle: an in-memory `main` connection with the
//! repository file (and, when present, the checkout file) ATTACHed under
//! fixed schema names. Every query in this crate addresses tables through
//! `repo.*` / `local.*`, regardless of which physical file was opened
//! first — mirrors the "uniform namespace" requirement of §4.3.

use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::schema;

pub struct Database {
    pub(crate) conn: Connection,
    txn_depth: RefCell<u32>,
    txn_poisoned: RefCell<bool>,
    checked_out: RefCell<HashSet<String>>,
    has_repo: bool,
    has_local: bool,
}

impl Database {
    /// Open a fresh in-memory `main` database with no attachments. Used
    /// by tests and by `create_repository` before the repo file exists.
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            txn_depth: RefCell::new(0),
            txn_poisoned: RefCell::new(false),
            checked_out: RefCell::new(HashSet::new()),
            has_repo: false,
            has_local: false,
        })
    }

    pub fn attach_repo(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_string_lossy().into_owned();
        self.conn
            .execute("ATTACH DATABASE ?1 AS repo", [path])?;
        schema::install(&self.conn, schema::REPO_SCHEMA)?;
        self.has_repo = true;
        Ok(())
    }

    pub fn attach_local(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_string_lossy().into_owned();
        self.conn
            .execute("ATTACH DATABASE ?1 AS local", [path])?;
        schema::install(&self.conn, schema::LOCAL_SCHEMA)?;
        self.has_local = true;
        Ok(())
    }

    pub fn has_repo(&self) -> bool {
        self.has_repo
    }

    pub fn has_local(&self) -> bool {
        self.has_local
    }

    /// Begin a pseudo-nested transaction: only depth 0 issues a real
    /// `BEGIN`. Returns the new depth.
    pub fn begin(&self) -> Result<u32> {
        let mut depth = self.txn_depth.borrow_mut();
        if *depth == 0 {
            self.conn.execute_batch("BEGIN")?;
            *self.txn_poisoned.borrow_mut() = false;
        }
        *depth += 1;
        Ok(*depth)
    }

    /// Mark the enclosing transaction for rollback. Sticky: any later
    /// `end` at any depth will roll back instead of commit.
    pub fn poison(&self) {
        *self.txn_poisoned.borrow_mut() = true;
    }

    /// End a pseudo-nested transaction level. Only depth 1 issues a real
    /// `COMMIT` (or `ROLLBACK` if poisoned). Levels above 1 are no-ops.
    pub fn end(&self) -> Result<()> {
        let mut depth = self.txn_depth.borrow_mut();
        if *depth == 0 {
            return Err(Error::Misuse("end() called with no open transaction".into()));
        }
        if *depth == 1 {
            if *self.txn_poisoned.borrow() {
                self.conn.execute_batch("ROLLBACK")?;
            } else {
                self.conn.execute_batch("COMMIT")?;
            }
            *self.txn_poisoned.borrow_mut() = false;
        }
        *depth -= 1;
        Ok(())
    }

    pub fn txn_depth(&self) -> u32 {
        *self.txn_depth.borrow()
    }

    /// Check out sole ownership of the prepared statement for `sql`,
    /// running `f` against it. Detects recursive checkout of the same SQL
    /// text and reports it as [`Error::Misuse`]; the statement is always
    /// "yielded" back (removed from the checked-out set) before
    /// returning, even on error.
    pub fn with_stmt<T>(
        &self,
        sql: &str,
        f: impl FnOnce(&mut rusqlite::CachedStatement) -> Result<T>,
    ) -> Result<T> {
        if !self.checked_out.borrow_mut().insert(sql.to_string()) {
            return Err(Error::Misuse(format!(
                "statement already checked out: {sql}"
            )));
        }
        let result = (|| {
            let mut stmt = self.conn.prepare_cached(sql)?;
            f(&mut stmt)
        })();
        self.checked_out.borrow_mut().remove(sql);
        result
    }

    pub fn clear_statement_cache(&self) {
        self.conn.flush_prepared_statement_cache();
        self.checked_out.borrow_mut().clear();
    }
}
