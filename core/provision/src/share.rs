//! Sharing a whole course folder with the class.

use tracing::info;

use classdrive_common::{Error, FileId, Result, Role};
use classdrive_drive::RemoteStore;
use classdrive_roster::{grantees_for, GranteeSet, Roster};

use crate::reconciler::{reconcile, ReconcileReport};

/// Every roster member plus the instructors, in roster order.
pub fn roster_grantees(roster: &Roster, email_domain: &str, instructors: &[String]) -> GranteeSet {
    let mut grantees = GranteeSet::new();
    for entry in roster.entries() {
        grantees.extend(grantees_for(entry, email_domain).iter());
    }
    grantees.extend(instructors);
    grantees
}

/// Reconcile the folder's own grants to the whole class at `role`.
///
/// # Errors
/// - `Config` if no grantee can be derived from the roster and instructors
/// - Errors from [`reconcile`]
pub async fn share_folder(
    store: &dyn RemoteStore,
    folder: &FileId,
    roster: &Roster,
    email_domain: &str,
    instructors: &[String],
    role: Role,
) -> Result<ReconcileReport> {
    let grantees = roster_grantees(roster, email_domain, instructors);
    if grantees.is_empty() {
        return Err(Error::Config(
            "Nobody to share with: roster and instructor list are empty".to_string(),
        ));
    }

    info!(
        "Sharing folder {} with {} people as {}",
        folder,
        grantees.len(),
        role
    );
    reconcile(store, folder, &grantees, role).await
}
