//! Course provisioning workflows for classdrive.
//!
//! This module provides the workflows that act on a remote store:
//! - Resolving a course folder by name
//! - Find-or-create of one artifact per roster entry
//! - Reconciling the grants of an artifact to a desired set
//! - Sharing a whole folder with the class
//! - Locking the grants of a folder's files after a deadline
//!
//! Every workflow runs sequentially and isolates per-item failures into a
//! report instead of aborting.

pub mod job;
pub mod lock;
pub mod provisioner;
pub mod reconciler;
pub mod report;
pub mod resolver;
pub mod share;

// Re-export main types
pub use job::{ProvisionJob, ProvisionOptions};
pub use lock::{lock_folder, FileLock, LockReport};
pub use provisioner::{find_artifact, provision, Provisioned};
pub use reconciler::{reconcile, GrantFailure, GrantOperation, ReconcileReport};
pub use report::{EntryOutcome, EntryStatus, RunReport};
pub use resolver::resolve_folder;
pub use share::{roster_grantees, share_folder};
