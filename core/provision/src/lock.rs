//! Deadline lock: downgrade the grants on every artifact in a folder.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use classdrive_common::{Error, FileId, Result, Role};
use classdrive_drive::{DriveQuery, RemoteStore};

use crate::reconciler::{grant_label, GrantFailure, GrantOperation};

/// Result of locking one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLock {
    pub id: FileId,
    pub name: String,
    /// Grants moved to the target role.
    pub updated: usize,
    /// Grants already at the target role.
    pub unchanged: usize,
    pub failures: Vec<GrantFailure>,
}

/// Aggregate result of a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockReport {
    pub folder: FileId,
    pub role: Role,
    pub files: Vec<FileLock>,
}

impl LockReport {
    pub fn updated_count(&self) -> usize {
        self.files.iter().map(|f| f.updated).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.files.iter().map(|f| f.failures.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

impl fmt::Display for LockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Folder {}: {} files, {} grants set to {}, {} failed",
            self.folder,
            self.files.len(),
            self.updated_count(),
            self.role,
            self.failure_count()
        )?;
        for file in self.files.iter().filter(|file| !file.failures.is_empty()) {
            writeln!(f, "  {} ({})", file.name, file.id)?;
            for failure in &file.failures {
                writeln!(f, "      {}", failure)?;
            }
        }
        Ok(())
    }
}

/// Set every non-owner grant on the files directly inside `folder` to `role`.
///
/// Only files whose name contains `affix` are touched; all files when `affix`
/// is `None`. A file whose grants cannot be listed is reported and skipped.
///
/// # Errors
/// - `InvalidInput` if `role` is owner
/// - Remote errors from listing the folder contents
pub async fn lock_folder(
    store: &dyn RemoteStore,
    folder: &FileId,
    affix: Option<&str>,
    role: Role,
) -> Result<LockReport> {
    if role.is_owner() {
        return Err(Error::InvalidInput(
            "Grants cannot be locked to the owner role".to_string(),
        ));
    }

    let children = store.list_files(&DriveQuery::children_of(folder)).await?;
    let targets: Vec<_> = children
        .into_iter()
        .filter(|file| affix.map_or(true, |affix| file.name.contains(affix)))
        .collect();

    info!(
        "Locking {} files in folder {} to {}",
        targets.len(),
        folder,
        role
    );

    let mut report = LockReport {
        folder: folder.clone(),
        role,
        files: Vec::with_capacity(targets.len()),
    };

    for file in targets {
        let mut lock = FileLock {
            id: file.id,
            name: file.name,
            updated: 0,
            unchanged: 0,
            failures: Vec::new(),
        };

        let permissions = match store.list_permissions(&lock.id).await {
            Ok(permissions) => permissions,
            Err(e) => {
                warn!("Could not list grants of {}: {}", lock.name, e);
                lock.failures.push(GrantFailure::new(
                    GrantOperation::Update,
                    format!("all grants of {}", lock.name),
                    &e,
                ));
                report.files.push(lock);
                continue;
            }
        };

        for permission in permissions.iter().filter(|p| !p.role.is_owner()) {
            if permission.role == role {
                lock.unchanged += 1;
                continue;
            }
            match store.update_permission(&lock.id, &permission.id, role).await {
                Ok(_) => {
                    debug!("{} on {} is now {}", grant_label(permission), lock.name, role);
                    lock.updated += 1;
                }
                Err(e) => {
                    warn!("Could not lock {} on {}: {}", grant_label(permission), lock.name, e);
                    lock.failures.push(GrantFailure::new(
                        GrantOperation::Update,
                        grant_label(permission),
                        &e,
                    ));
                }
            }
        }

        report.files.push(lock);
    }

    info!(
        "Locked folder {}: {} grants updated, {} failed",
        folder,
        report.updated_count(),
        report.failure_count()
    );

    Ok(report)
}
