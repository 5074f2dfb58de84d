//! Derived-table maintenance (§4.6): every artifact accepted into the
//! blob store gets crosslinked into the queryable `repo.*` tables —
//! `filename`, `mlink`, `plink`, `leaf`, `tag`/`tagxref`, `event`,
//! `ticket`/`ticketchng` — inside one transaction bracket, with
//! registered [`fossil_core::CrosslinkListener`]s firing at the end in
//! registration order.

pub mod date;
mod error;
mod session;

pub use error::Error;
pub use session::Session;
