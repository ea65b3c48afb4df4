//! Remote store abstraction for classdrive.
//!
//! This module provides a trait-based interface over the handful of Drive
//! capabilities the course workflows need (file lookup, creation and the
//! permission list of a file), a Google Drive v3 implementation and an
//! in-memory implementation for tests and dry runs.
//!
//! # Design Principles
//! - Store isolation: no Drive-specific logic in the roster or workflow crates
//! - Parameterized queries: names are never spliced into query strings by hand
//! - Unified error semantics: every backend reports through `classdrive_common::Error`

pub mod gdrive;
pub mod memory;
pub mod query;
pub mod store;

pub use gdrive::{AuthConfig, AuthManager, DriveClient, TokenCache, TokenManager, Tokens};
pub use memory::MemoryDrive;
pub use query::{Clause, DriveQuery};
pub use store::{DriveFile, NewFile, NewPermission, Permission, RemoteStore};
