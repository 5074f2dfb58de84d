//! The umbrella crate tying the lower layers together: the closed
//! [`Error`] enumeration every public operation returns, the global
//! [`Config`] file loader (§6.5), and the process-scoped [`Context`]
//! handle (§3.4).

mod config;
mod context;
mod error;

pub use config::{locate as locate_global_config, Config};
pub use context::{Context, CrosslinkListener, ErrorState, PendingVerify};
pub use error::{Error, ErrorKind};
