//! DDL for the repository and checkout schemas (§6.3, §6.4). Treated as a
//! fixed external contract: table and column names follow the published
//! Fossil repository schema so that a repository file produced here is
//! structurally identical to one Fossil itself would produce.

pub const REPO_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repo.blob(
  rid INTEGER PRIMARY KEY,
  uuid TEXT UNIQUE NOT NULL,
  size INTEGER NOT NULL,
  content BLOB,
  is_delta INTEGER NOT NULL DEFAULT 0,
  is_private INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS repo.delta(
  rid INTEGER PRIMARY KEY REFERENCES blob(rid),
  srcid INTEGER NOT NULL REFERENCES blob(rid)
);
CREATE INDEX IF NOT EXISTS repo.delta_srcid ON delta(srcid);
CREATE TABLE IF NOT EXISTS repo.shun(uuid TEXT PRIMARY KEY);
CREATE TABLE IF NOT EXISTS repo.config(name TEXT PRIMARY KEY, value TEXT);

CREATE TABLE IF NOT EXISTS repo.filename(fnid INTEGER PRIMARY KEY, name TEXT UNIQUE NOT NULL);
CREATE TABLE IF NOT EXISTS repo.mlink(
  mid INTEGER NOT NULL,
  fid INTEGER NOT NULL,
  pid INTEGER NOT NULL,
  fnid INTEGER NOT NULL,
  pfnid INTEGER NOT NULL DEFAULT 0,
  perm TEXT
);
CREATE INDEX IF NOT EXISTS repo.mlink_mid ON mlink(mid);
CREATE INDEX IF NOT EXISTS repo.mlink_fnid ON mlink(fnid);

CREATE TABLE IF NOT EXISTS repo.plink(
  pid INTEGER NOT NULL,
  cid INTEGER NOT NULL,
  isprim INTEGER NOT NULL,
  PRIMARY KEY(pid, cid)
);
CREATE INDEX IF NOT EXISTS repo.plink_cid ON plink(cid);

CREATE TABLE IF NOT EXISTS repo.leaf(rid INTEGER PRIMARY KEY);

CREATE TABLE IF NOT EXISTS repo.tag(tagid INTEGER PRIMARY KEY, tagname TEXT UNIQUE NOT NULL);
CREATE TABLE IF NOT EXISTS repo.tagxref(
  tagid INTEGER NOT NULL,
  rid INTEGER NOT NULL,
  value TEXT,
  mtime REAL,
  tagtype INTEGER NOT NULL,
  srcid INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY(tagid, rid)
);

CREATE TABLE IF NOT EXISTS repo.event(
  objid INTEGER PRIMARY KEY,
  etype TEXT NOT NULL,
  mtime REAL,
  user TEXT,
  comment TEXT
);

CREATE TABLE IF NOT EXISTS repo.ticket(
  tkt_uuid TEXT PRIMARY KEY,
  tkt_mtime REAL
);
CREATE TABLE IF NOT EXISTS repo.ticketchng(
  tkt_uuid TEXT NOT NULL,
  tkt_mtime REAL NOT NULL,
  field TEXT NOT NULL,
  value TEXT,
  PRIMARY KEY(tkt_uuid, tkt_mtime, field)
);
";

pub const LOCAL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS local.vvar(name TEXT PRIMARY KEY, value TEXT);

CREATE TABLE IF NOT EXISTS local.vfile(
  id INTEGER PRIMARY KEY,
  vid INTEGER NOT NULL,
  chnged INTEGER NOT NULL DEFAULT 0,
  deleted INTEGER NOT NULL DEFAULT 0,
  isexe INTEGER NOT NULL DEFAULT 0,
  islink INTEGER NOT NULL DEFAULT 0,
  rid INTEGER,
  mrid INTEGER,
  pathname TEXT NOT NULL,
  origname TEXT,
  size INTEGER,
  mtime INTEGER,
  status TEXT NOT NULL DEFAULT 'unchanged'
);
CREATE INDEX IF NOT EXISTS local.vfile_vid ON vfile(vid);
CREATE UNIQUE INDEX IF NOT EXISTS local.vfile_pathname ON vfile(vid, pathname);

CREATE TABLE IF NOT EXISTS local.vmerge(id INTEGER, merge INTEGER);
";

/// Run every statement in `sql` against `conn`. rusqlite's `execute_batch`
/// already splits on `;`, so this is mostly a readability wrapper kept
/// distinct from single-statement `execute` calls elsewhere.
pub fn install(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<()> {
    conn.execute_batch(sql)
}
