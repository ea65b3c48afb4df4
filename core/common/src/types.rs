//! Common types used throughout classdrive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// MIME type Google Drive uses for Docs documents.
pub const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";
/// MIME type Google Drive uses for Sheets spreadsheets.
pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Remote identifier of a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Create a new FileId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidInput("FileId cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<uuid::Uuid> for FileId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.simple().to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of one sharing grant on a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(String);

impl PermissionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sharing role of a grant.
///
/// Serialized with the exact strings the Drive API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Owner,
    Organizer,
    FileOrganizer,
    Writer,
    Commenter,
    Reader,
}

impl Role {
    /// API string for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Organizer => "organizer",
            Role::FileOrganizer => "fileOrganizer",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
            Role::Reader => "reader",
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "owner" => Ok(Role::Owner),
            "organizer" => Ok(Role::Organizer),
            "fileorganizer" => Ok(Role::FileOrganizer),
            "writer" => Ok(Role::Writer),
            "commenter" => Ok(Role::Commenter),
            "reader" => Ok(Role::Reader),
            _ => Err(Error::InvalidInput(format!(
                "Unknown role '{}'. Use: fileOrganizer, writer, commenter or reader",
                s
            ))),
        }
    }
}

/// Kind of artifact provisioned for a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Document,
    Spreadsheet,
    Folder,
}

impl ArtifactKind {
    /// Drive MIME type used to create and look up this kind.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactKind::Document => DOCUMENT_MIME_TYPE,
            ArtifactKind::Spreadsheet => SPREADSHEET_MIME_TYPE,
            ArtifactKind::Folder => FOLDER_MIME_TYPE,
        }
    }

    /// Reverse lookup from a Drive MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            DOCUMENT_MIME_TYPE => Some(ArtifactKind::Document),
            SPREADSHEET_MIME_TYPE => Some(ArtifactKind::Spreadsheet),
            FOLDER_MIME_TYPE => Some(ArtifactKind::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Document => "document",
            ArtifactKind::Spreadsheet => "spreadsheet",
            ArtifactKind::Folder => "folder",
        };
        f.write_str(name)
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "document" | "doc" | "docs" => Ok(ArtifactKind::Document),
            "spreadsheet" | "sheet" | "sheets" => Ok(ArtifactKind::Spreadsheet),
            "folder" | "dir" => Ok(ArtifactKind::Folder),
            _ => Err(Error::InvalidInput(format!(
                "Unknown artifact kind '{}'. Use: document, spreadsheet or folder",
                s
            ))),
        }
    }
}

/// Secret string (tokens, client secrets) that zeroizes on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}
