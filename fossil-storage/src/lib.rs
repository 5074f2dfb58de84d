//! The embedded relational storage backend (§4.3, §4.4): a single
//! physical file per repository and per checkout, attached under fixed
//! schema names onto one in-memory `main` connection, plus the
//! content-addressed blob store built on top of it.

mod blob;
mod config;
mod db;
mod error;
pub mod schema;

pub use blob::BlobStore;
pub use config::{CheckoutVars, RepoConfig};
pub use db::Database;
pub use error::{Error, Result};
