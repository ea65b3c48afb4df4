//! In-memory remote store for testing and dry runs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use classdrive_common::{ArtifactKind, Error, FileId, PermissionId, Result, Role, FOLDER_MIME_TYPE};

use crate::query::DriveQuery;
use crate::store::{DriveFile, NewFile, NewPermission, Permission, RemoteStore};

fn new_file_id() -> FileId {
    FileId::from(Uuid::new_v4())
}

/// Injected failures, keyed by the target of the call.
#[derive(Debug, Default)]
struct Failures {
    create_file: HashSet<String>,
    list_permissions: HashSet<FileId>,
    create_permission: HashSet<String>,
    delete_permission: HashSet<PermissionId>,
    update_permission: HashSet<PermissionId>,
}

#[derive(Debug, Default)]
struct State {
    /// Files in creation order.
    files: Vec<DriveFile>,
    permissions: HashMap<FileId, Vec<Permission>>,
    failures: Failures,
    mutations: usize,
    /// Grantees that were sent Drive's notification e-mail.
    notified: Vec<String>,
}

/// In-memory remote store.
///
/// Every created file is owned by `owner`. Failures can be injected per call
/// target to exercise the isolation policy of the workflows. All data is
/// lost on drop.
pub struct MemoryDrive {
    owner: String,
    state: RwLock<State>,
}

impl MemoryDrive {
    /// Create an empty store whose files are owned by `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::InvalidInput("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::InvalidInput("Memory store lock poisoned".to_string()))
    }

    fn insert_file(
        state: &mut State,
        owner: &str,
        name: &str,
        mime_type: &str,
        parent: Option<&FileId>,
        writers_can_share: Option<bool>,
    ) -> DriveFile {
        let file = DriveFile {
            id: new_file_id(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: parent.cloned().into_iter().collect(),
            trashed: false,
            writers_can_share,
        };

        let owner_grant = Permission {
            id: PermissionId::new(Uuid::new_v4().simple().to_string()),
            grantee_type: "user".to_string(),
            role: Role::Owner,
            email_address: Some(owner.to_string()),
        };

        state.permissions.insert(file.id.clone(), vec![owner_grant]);
        state.files.push(file.clone());
        file
    }

    /// Seed a folder without counting it as a mutation.
    pub fn seed_folder(&self, name: &str, parent: Option<&FileId>) -> FileId {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        Self::insert_file(&mut state, &self.owner, name, FOLDER_MIME_TYPE, parent, None).id
    }

    /// Seed an artifact without counting it as a mutation.
    pub fn seed_file(&self, name: &str, kind: ArtifactKind, parent: &FileId) -> FileId {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        Self::insert_file(&mut state, &self.owner, name, kind.mime_type(), Some(parent), None).id
    }

    /// Seed a grant without counting it as a mutation.
    pub fn seed_grant(&self, file_id: &FileId, email: &str, role: Role) -> PermissionId {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let id = PermissionId::new(Uuid::new_v4().simple().to_string());
        state
            .permissions
            .entry(file_id.clone())
            .or_default()
            .push(Permission {
                id: id.clone(),
                grantee_type: "user".to_string(),
                role,
                email_address: Some(email.to_string()),
            });
        id
    }

    /// Move a file to the trash.
    pub fn trash(&self, file_id: &FileId) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = state.files.iter_mut().find(|f| f.id == *file_id) {
            file.trashed = true;
        }
    }

    /// Make `create_file` fail for this name.
    pub fn fail_create_file(&self, name: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures.create_file.insert(name.to_string());
    }

    /// Make `list_permissions` fail for this file.
    pub fn fail_list_permissions(&self, file_id: &FileId) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures.list_permissions.insert(file_id.clone());
    }

    /// Make `create_permission` fail for this grantee (any file).
    pub fn fail_create_permission(&self, email: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state
            .failures
            .create_permission
            .insert(email.to_ascii_lowercase());
    }

    /// Make `delete_permission` fail for this grant.
    pub fn fail_delete_permission(&self, permission_id: &PermissionId) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures.delete_permission.insert(permission_id.clone());
    }

    /// Make `update_permission` fail for this grant.
    pub fn fail_update_permission(&self, permission_id: &PermissionId) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.failures.update_permission.insert(permission_id.clone());
    }

    /// Snapshot of all files, in creation order.
    pub fn files(&self) -> Vec<DriveFile> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.files.clone()
    }

    /// Snapshot of the grants on a file.
    pub fn permissions(&self, file_id: &FileId) -> Vec<Permission> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.permissions.get(file_id).cloned().unwrap_or_default()
    }

    /// Grantees whose grant requested a notification e-mail, in call order.
    pub fn notified(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.notified.clone()
    }

    /// Number of successful mutating calls (creates, deletes, updates).
    pub fn mutation_count(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.mutations
    }
}

#[async_trait]
impl RemoteStore for MemoryDrive {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_files(&self, query: &DriveQuery) -> Result<Vec<DriveFile>> {
        let state = self.read()?;
        Ok(state
            .files
            .iter()
            .filter(|file| query.matches(file))
            .cloned()
            .collect())
    }

    async fn create_file(&self, request: &NewFile) -> Result<DriveFile> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if state.failures.create_file.contains(&request.name) {
            return Err(Error::Network(format!(
                "Injected failure creating {}",
                request.name
            )));
        }

        let parent_is_folder = state
            .files
            .iter()
            .any(|f| f.id == request.parent && f.is_folder() && !f.trashed);
        if !parent_is_folder {
            return Err(Error::NotFound(format!(
                "Parent folder {} not found",
                request.parent
            )));
        }

        let file = Self::insert_file(
            state,
            &self.owner,
            &request.name,
            request.kind.mime_type(),
            Some(&request.parent),
            Some(request.writers_can_share),
        );
        state.mutations += 1;
        Ok(file)
    }

    async fn list_permissions(&self, file_id: &FileId) -> Result<Vec<Permission>> {
        let state = self.read()?;

        if state.failures.list_permissions.contains(file_id) {
            return Err(Error::Network(format!(
                "Injected failure listing permissions of {}",
                file_id
            )));
        }

        state
            .permissions
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("File {} not found", file_id)))
    }

    async fn create_permission(
        &self,
        file_id: &FileId,
        request: &NewPermission,
    ) -> Result<Permission> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if state
            .failures
            .create_permission
            .contains(&request.email.to_ascii_lowercase())
        {
            return Err(Error::Network(format!(
                "Injected failure granting {}",
                request.email
            )));
        }

        let permission = Permission {
            id: PermissionId::new(Uuid::new_v4().simple().to_string()),
            grantee_type: "user".to_string(),
            role: request.role,
            email_address: Some(request.email.clone()),
        };

        let grants = state
            .permissions
            .get_mut(file_id)
            .ok_or_else(|| Error::NotFound(format!("File {} not found", file_id)))?;

        // Drive upgrades an existing grant for the same user instead of duplicating it.
        match grants.iter_mut().find(|p| p.is_for(&request.email)) {
            Some(existing) if existing.role.is_owner() => {
                return Err(Error::InvalidInput(format!(
                    "{} already owns {}",
                    request.email, file_id
                )));
            }
            Some(existing) => {
                existing.role = request.role;
                let updated = existing.clone();
                state.mutations += 1;
                if request.send_notification {
                    state.notified.push(request.email.clone());
                }
                return Ok(updated);
            }
            None => grants.push(permission.clone()),
        }

        state.mutations += 1;
        if request.send_notification {
            state.notified.push(request.email.clone());
        }
        Ok(permission)
    }

    async fn delete_permission(
        &self,
        file_id: &FileId,
        permission_id: &PermissionId,
    ) -> Result<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if state.failures.delete_permission.contains(permission_id) {
            return Err(Error::Network(format!(
                "Injected failure deleting permission {}",
                permission_id
            )));
        }

        let grants = state
            .permissions
            .get_mut(file_id)
            .ok_or_else(|| Error::NotFound(format!("File {} not found", file_id)))?;

        let position = grants
            .iter()
            .position(|p| p.id == *permission_id)
            .ok_or_else(|| Error::NotFound(format!("Permission {} not found", permission_id)))?;

        if grants[position].role.is_owner() {
            return Err(Error::PermissionDenied(
                "The owner permission cannot be removed".to_string(),
            ));
        }

        grants.remove(position);
        state.mutations += 1;
        Ok(())
    }

    async fn update_permission(
        &self,
        file_id: &FileId,
        permission_id: &PermissionId,
        role: Role,
    ) -> Result<Permission> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if state.failures.update_permission.contains(permission_id) {
            return Err(Error::Network(format!(
                "Injected failure updating permission {}",
                permission_id
            )));
        }

        let grants = state
            .permissions
            .get_mut(file_id)
            .ok_or_else(|| Error::NotFound(format!("File {} not found", file_id)))?;

        let grant = grants
            .iter_mut()
            .find(|p| p.id == *permission_id)
            .ok_or_else(|| Error::NotFound(format!("Permission {} not found", permission_id)))?;

        if grant.role.is_owner() {
            return Err(Error::PermissionDenied(
                "The owner permission cannot be changed".to_string(),
            ));
        }

        grant.role = role;
        let updated = grant.clone();
        state.mutations += 1;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_create_and_find() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);

        let created = drive
            .create_file(&NewFile {
                name: "hw1_Lee_Ana".to_string(),
                kind: ArtifactKind::Document,
                parent: folder.clone(),
                writers_can_share: false,
            })
            .await
            .unwrap();

        assert_eq!(created.writers_can_share, Some(false));
        assert_eq!(drive.mutation_count(), 1);

        let found = drive
            .list_files(&DriveQuery::artifact("hw1_Lee_Ana", ArtifactKind::Document, &folder))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, created.id);

        let grants = drive.permissions(&created.id);
        assert_eq!(grants.len(), 1);
        assert!(grants[0].role.is_owner());
        assert!(grants[0].is_for("prof@x.edu"));
    }

    #[tokio::test]
    async fn test_memory_create_requires_parent_folder() {
        let drive = MemoryDrive::new("prof@x.edu");
        let result = drive
            .create_file(&NewFile {
                name: "orphan".to_string(),
                kind: ArtifactKind::Document,
                parent: FileId::new("missing").unwrap(),
                writers_can_share: false,
            })
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_owner_grant_is_protected() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        let owner = drive.permissions(&folder)[0].id.clone();

        let delete = drive.delete_permission(&folder, &owner).await;
        assert!(matches!(delete, Err(Error::PermissionDenied(_))));

        let update = drive.update_permission(&folder, &owner, Role::Reader).await;
        assert!(matches!(update, Err(Error::PermissionDenied(_))));
        assert_eq!(drive.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_injected_failures() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        let grant = drive.seed_grant(&folder, "ana@x.edu", Role::Writer);

        drive.fail_delete_permission(&grant);
        drive.fail_create_permission("Bob@x.edu");

        assert!(drive.delete_permission(&folder, &grant).await.is_err());
        assert!(drive
            .create_permission(&folder, &NewPermission::user("bob@x.edu", Role::Reader))
            .await
            .is_err());
        assert_eq!(drive.permissions(&folder).len(), 2);
    }

    #[tokio::test]
    async fn test_memory_regrant_updates_existing() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        drive.seed_grant(&folder, "ana@x.edu", Role::Reader);

        drive
            .create_permission(&folder, &NewPermission::user("ANA@x.edu", Role::Writer))
            .await
            .unwrap();

        let grants = drive.permissions(&folder);
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[1].role, Role::Writer);
    }

    #[tokio::test]
    async fn test_memory_records_notified_grantees() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);

        drive
            .create_permission(&folder, &NewPermission::user("ana@x.edu", Role::Writer))
            .await
            .unwrap();
        assert!(drive.notified().is_empty());

        let loud = NewPermission {
            send_notification: true,
            ..NewPermission::user("bob@x.edu", Role::Reader)
        };
        drive.create_permission(&folder, &loud).await.unwrap();
        assert_eq!(drive.notified(), vec!["bob@x.edu"]);
    }

    #[tokio::test]
    async fn test_memory_trashed_files_are_hidden() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        drive.trash(&folder);

        let found = drive.list_files(&DriveQuery::folder_named("CS101")).await.unwrap();
        assert!(found.is_empty());
    }
}
