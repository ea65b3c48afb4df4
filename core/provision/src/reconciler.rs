//! Permission reconciliation.
//!
//! Converges the sharing list of one file to `{owner} ∪ desired` at a single
//! role. Every non-owner grant is deleted first, then every desired grantee is
//! granted, so a grantee that already had access is never removed after being
//! re-granted in the same run. Calls are independent: failures are collected
//! per grant and the remaining calls still run.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use classdrive_common::{Error, FileId, PermissionId, Result, Role};
use classdrive_drive::{NewPermission, Permission, RemoteStore};
use classdrive_roster::GranteeSet;

/// Kind of grant call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantOperation {
    Delete,
    Create,
    Update,
}

impl fmt::Display for GrantOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantOperation::Delete => f.write_str("delete"),
            GrantOperation::Create => f.write_str("create"),
            GrantOperation::Update => f.write_str("update"),
        }
    }
}

/// One failed grant call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantFailure {
    pub operation: GrantOperation,
    /// Grantee e-mail, or the grant id when the grant has no e-mail.
    pub target: String,
    pub error: String,
}

impl GrantFailure {
    pub(crate) fn new(operation: GrantOperation, target: impl Into<String>, error: &Error) -> Self {
        Self {
            operation,
            target: target.into(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for GrantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.target, self.error)
    }
}

/// Outcome of one reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Grants deleted.
    pub removed: Vec<PermissionId>,
    /// Grantees granted the role.
    pub added: Vec<String>,
    /// Desired grantees skipped because they own the file.
    pub skipped: Vec<String>,
    pub failures: Vec<GrantFailure>,
}

impl ReconcileReport {
    /// True when every call succeeded, i.e. the grants equal the target set.
    pub fn is_converged(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Label used for a grant in logs and failure reports.
pub(crate) fn grant_label(permission: &Permission) -> String {
    permission
        .email_address
        .clone()
        .unwrap_or_else(|| format!("{} grant {}", permission.grantee_type, permission.id))
}

/// Replace every non-owner grant on `file_id` with `desired` at `role`.
///
/// # Errors
/// - `InvalidInput` if `role` is owner
/// - Remote errors from listing the current grants; nothing is mutated then
///
/// Failures of individual delete/create calls do not error; they are listed
/// in the returned report.
pub async fn reconcile(
    store: &dyn RemoteStore,
    file_id: &FileId,
    desired: &GranteeSet,
    role: Role,
) -> Result<ReconcileReport> {
    if role.is_owner() {
        return Err(Error::InvalidInput(
            "Ownership cannot be granted by reconciliation".to_string(),
        ));
    }

    let current = store.list_permissions(file_id).await?;
    let mut report = ReconcileReport::default();

    let owners: Vec<&Permission> = current.iter().filter(|p| p.role.is_owner()).collect();

    for permission in current.iter().filter(|p| !p.role.is_owner()) {
        match store.delete_permission(file_id, &permission.id).await {
            Ok(()) => {
                debug!("Removed {} ({}) from {}", grant_label(permission), permission.role, file_id);
                report.removed.push(permission.id.clone());
            }
            Err(e) => {
                warn!("Could not remove {} from {}: {}", grant_label(permission), file_id, e);
                report
                    .failures
                    .push(GrantFailure::new(GrantOperation::Delete, grant_label(permission), &e));
            }
        }
    }

    for email in desired.iter() {
        if owners.iter().any(|owner| owner.is_for(email)) {
            debug!("{} owns {}; not re-granting", email, file_id);
            report.skipped.push(email.to_string());
            continue;
        }

        match store
            .create_permission(file_id, &NewPermission::user(email, role))
            .await
        {
            Ok(_) => {
                debug!("Granted {} {} on {}", email, role, file_id);
                report.added.push(email.to_string());
            }
            Err(e) => {
                warn!("Could not grant {} {} on {}: {}", email, role, file_id, e);
                report
                    .failures
                    .push(GrantFailure::new(GrantOperation::Create, email, &e));
            }
        }
    }

    info!(
        "Permissions of {}: {} removed, {} granted {}, {} failed",
        file_id,
        report.removed.len(),
        report.added.len(),
        role,
        report.failures.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use classdrive_drive::MemoryDrive;

    fn grants(drive: &MemoryDrive, file: &FileId) -> Vec<(String, Role)> {
        let mut grants: Vec<(String, Role)> = drive
            .permissions(file)
            .into_iter()
            .map(|p| (p.email_address.unwrap_or_default(), p.role))
            .collect();
        grants.sort();
        grants
    }

    #[tokio::test]
    async fn test_grants_converge_to_owner_plus_desired() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        drive.seed_grant(&folder, "stale@x.edu", Role::Writer);
        drive.seed_grant(&folder, "ana@x.edu", Role::Reader);

        let desired: GranteeSet = ["ana@x.edu", "ta@x.edu"].into_iter().collect();
        let report = reconcile(&drive, &folder, &desired, Role::Writer).await.unwrap();

        assert!(report.is_converged());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.added, vec!["ana@x.edu", "ta@x.edu"]);
        assert_eq!(
            grants(&drive, &folder),
            vec![
                ("ana@x.edu".to_string(), Role::Writer),
                ("prof@x.edu".to_string(), Role::Owner),
                ("ta@x.edu".to_string(), Role::Writer),
            ]
        );
        assert!(drive.notified().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_stable() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        let desired: GranteeSet = ["ana@x.edu"].into_iter().collect();

        reconcile(&drive, &folder, &desired, Role::Writer).await.unwrap();
        let first = grants(&drive, &folder);
        reconcile(&drive, &folder, &desired, Role::Writer).await.unwrap();

        assert_eq!(grants(&drive, &folder), first);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_block_others() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        let stuck = drive.seed_grant(&folder, "stuck@x.edu", Role::Writer);
        drive.seed_grant(&folder, "gone@x.edu", Role::Writer);
        drive.fail_delete_permission(&stuck);

        let desired: GranteeSet = ["ana@x.edu"].into_iter().collect();
        let report = reconcile(&drive, &folder, &desired, Role::Writer).await.unwrap();

        assert!(!report.is_converged());
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.added, vec!["ana@x.edu"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].operation, GrantOperation::Delete);
        assert_eq!(report.failures[0].target, "stuck@x.edu");

        let emails: Vec<String> = grants(&drive, &folder).into_iter().map(|(e, _)| e).collect();
        assert_eq!(emails, vec!["ana@x.edu", "prof@x.edu", "stuck@x.edu"]);
    }

    #[tokio::test]
    async fn test_failed_create_does_not_block_others() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        drive.fail_create_permission("bad@x.edu");

        let desired: GranteeSet = ["bad@x.edu", "ana@x.edu"].into_iter().collect();
        let report = reconcile(&drive, &folder, &desired, Role::Commenter).await.unwrap();

        assert_eq!(report.added, vec!["ana@x.edu"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].operation, GrantOperation::Create);
        assert_eq!(report.failures[0].target, "bad@x.edu");
    }

    #[tokio::test]
    async fn test_owner_in_desired_is_skipped() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);

        let desired: GranteeSet = ["PROF@x.edu", "ana@x.edu"].into_iter().collect();
        let report = reconcile(&drive, &folder, &desired, Role::Writer).await.unwrap();

        assert!(report.is_converged());
        assert_eq!(report.skipped, vec!["PROF@x.edu"]);
        assert_eq!(drive.permissions(&folder).len(), 2);
    }

    #[tokio::test]
    async fn test_list_failure_mutates_nothing() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        drive.seed_grant(&folder, "ana@x.edu", Role::Writer);
        drive.fail_list_permissions(&folder);

        let desired: GranteeSet = ["bo@x.edu"].into_iter().collect();
        assert!(reconcile(&drive, &folder, &desired, Role::Writer).await.is_err());
        assert_eq!(drive.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_owner_role_rejected() {
        let drive = MemoryDrive::new("prof@x.edu");
        let folder = drive.seed_folder("CS101", None);
        let desired: GranteeSet = ["ana@x.edu"].into_iter().collect();

        let err = reconcile(&drive, &folder, &desired, Role::Owner).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
