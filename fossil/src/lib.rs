//! Rust-native building blocks for a Fossil-SCM-compatible distributed
//! source-control engine.
//!
//! This crate doesn't provide a CLI or daemon; it's a base layer of
//! modules that re-implements Fossil's repository format and reasoning
//! (content-addressed storage, control-card artifacts, cross-linking,
//! shortest-path ancestry, checkout reconciliation) to build one on top
//! of.

#[doc(inline)]
pub use fossil_hash as hash;

#[doc(inline)]
pub use fossil_delta as delta;

#[doc(inline)]
pub use fossil_storage as storage;

#[doc(inline)]
pub use fossil_deck as deck;

#[doc(inline)]
pub use fossil_crosslink as crosslink;

#[doc(inline)]
pub use fossil_path as path;

#[doc(inline)]
pub use fossil_core as core;

#[doc(inline)]
pub use fossil_checkout as checkout;
