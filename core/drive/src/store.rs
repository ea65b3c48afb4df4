//! Remote store trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use classdrive_common::{ArtifactKind, FileId, PermissionId, Result, Role, FOLDER_MIME_TYPE};

use crate::query::DriveQuery;

/// File or folder metadata as reported by the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: FileId,
    /// Display name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<FileId>,
    /// Trashed status.
    #[serde(default)]
    pub trashed: bool,
    /// Whether writers may re-share the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writers_can_share: Option<bool>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Artifact kind, if the MIME type is one classdrive provisions.
    pub fn kind(&self) -> Option<ArtifactKind> {
        ArtifactKind::from_mime_type(&self.mime_type)
    }
}

/// One sharing grant on a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    /// Grantee type (`user`, `group`, `domain`, `anyone`).
    #[serde(rename = "type", default = "default_grantee_type")]
    pub grantee_type: String,
    pub role: Role,
    /// Present for `user` and `group` grants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

fn default_grantee_type() -> String {
    "user".to_string()
}

impl Permission {
    /// Case-insensitive match against a grantee e-mail.
    pub fn is_for(&self, email: &str) -> bool {
        self.email_address
            .as_deref()
            .is_some_and(|addr| addr.eq_ignore_ascii_case(email))
    }
}

/// Request to create a file.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub kind: ArtifactKind,
    pub parent: FileId,
    /// Whether writers may re-share the file. Provisioned artifacts disable it.
    pub writers_can_share: bool,
}

/// Request to grant a user access to a file.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub email: String,
    pub role: Role,
    /// Send Drive's notification e-mail to the grantee.
    pub send_notification: bool,
}

impl NewPermission {
    /// Silent user grant.
    pub fn user(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
            send_notification: false,
        }
    }
}

/// Remote store trait for the course workflows.
///
/// All operations are async and independent: there is no batching and no
/// atomicity across calls. Implementations handle their own authentication.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the store name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// List every file matching the query, following pagination.
    async fn list_files(&self, query: &DriveQuery) -> Result<Vec<DriveFile>>;

    /// Create a file or folder.
    ///
    /// # Preconditions
    /// - Parent folder must exist
    ///
    /// # Errors
    /// - Parent not found
    /// - Network/authentication errors
    async fn create_file(&self, request: &NewFile) -> Result<DriveFile>;

    /// List every grant on a file, following pagination.
    async fn list_permissions(&self, file_id: &FileId) -> Result<Vec<Permission>>;

    /// Grant access to a file.
    async fn create_permission(
        &self,
        file_id: &FileId,
        request: &NewPermission,
    ) -> Result<Permission>;

    /// Remove one grant from a file.
    async fn delete_permission(&self, file_id: &FileId, permission_id: &PermissionId)
        -> Result<()>;

    /// Change the role of one grant.
    async fn update_permission(
        &self,
        file_id: &FileId,
        permission_id: &PermissionId,
        role: Role,
    ) -> Result<Permission>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_from_api_json() {
        let json = r#"{
            "id": "1abc",
            "name": "hw1_Lee_Ana",
            "mimeType": "application/vnd.google-apps.document",
            "parents": ["0folder"]
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id.as_str(), "1abc");
        assert_eq!(file.kind(), Some(ArtifactKind::Document));
        assert!(!file.is_folder());
        assert!(!file.trashed);
        assert_eq!(file.parents[0].as_str(), "0folder");
    }

    #[test]
    fn test_permission_from_api_json() {
        let json = r#"{
            "id": "0912",
            "type": "user",
            "role": "fileOrganizer",
            "emailAddress": "Ana@X.edu"
        }"#;

        let permission: Permission = serde_json::from_str(json).unwrap();
        assert_eq!(permission.role, Role::FileOrganizer);
        assert!(permission.is_for("ana@x.edu"));
        assert!(!permission.is_for("bob@x.edu"));
    }

    #[test]
    fn test_permission_without_email() {
        let json = r#"{"id": "anyoneWithLink", "type": "anyone", "role": "reader"}"#;
        let permission: Permission = serde_json::from_str(json).unwrap();
        assert_eq!(permission.grantee_type, "anyone");
        assert!(!permission.is_for("ana@x.edu"));
    }
}
