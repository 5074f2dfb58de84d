//! Working-directory reconciliation (§4.7, §3.3): tracks the checked-out
//! version's file set in `local.vfile`, scans it against the filesystem,
//! extracts a version to disk, merges another version into it, and
//! commits the result as a new checkin.

mod checkout;
mod commit;
mod error;
mod merge3;
mod queue;
mod revert;
mod scan;
mod update;
mod vfile;

pub use checkout::{checkout, AlwaysYes, CheckoutOptions, ConfirmAnswer, Confirmer};
pub use commit::{commit, CommitRequest, CommitResult};
pub use error::Error;
pub use merge3::{merge3, MergeOutcome};
pub use queue::{build_ignore_set, manage, unmanage};
pub use revert::{revert, RevertAction, RevertReporter, Silent as SilentRevert};
pub use scan::{scan_changes, ScanOptions};
pub use update::{update, Silent as SilentUpdate, UpdateOutcome, UpdateReporter};
pub use vfile::{get_vvar, load_vfile, set_vvar, ChangeStatus, VFile};
