//! Common utilities and types shared across classdrive crates.
//!
//! This module provides the error type and the small identifier and role
//! types that flow between the Drive client, the roster model and the
//! provisioning workflows.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    ArtifactKind, FileId, PermissionId, Role, SecretString, DOCUMENT_MIME_TYPE,
    FOLDER_MIME_TYPE, SPREADSHEET_MIME_TYPE,
};
