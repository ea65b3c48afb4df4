//! Find-or-create of per-entry artifacts.

use serde::Serialize;
use tracing::{info, warn};

use classdrive_common::{ArtifactKind, FileId, Result};
use classdrive_drive::{DriveFile, DriveQuery, NewFile, RemoteStore};

/// Artifact after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub id: FileId,
    pub name: String,
    /// False when an existing artifact was reused.
    pub created: bool,
}

/// Look up an artifact by exact name and kind under a parent.
///
/// When several match, the first one reported by the store wins.
pub async fn find_artifact(
    store: &dyn RemoteStore,
    parent: &FileId,
    name: &str,
    kind: ArtifactKind,
) -> Result<Option<DriveFile>> {
    let mut matches = store
        .list_files(&DriveQuery::artifact(name, kind, parent))
        .await?;

    if matches.len() > 1 {
        warn!(
            "{} {}s named \"{}\" exist in folder {}; reusing {}",
            matches.len(),
            kind,
            name,
            parent,
            matches[0].id
        );
    }

    Ok(if matches.is_empty() {
        None
    } else {
        Some(matches.remove(0))
    })
}

/// Return the artifact named `name` under `parent`, creating it if missing.
///
/// Created artifacts have re-sharing by writers disabled. Reuse makes no
/// remote mutation, so repeated runs are idempotent.
///
/// # Errors
/// - Remote errors from the lookup or the creation
pub async fn provision(
    store: &dyn RemoteStore,
    parent: &FileId,
    name: &str,
    kind: ArtifactKind,
) -> Result<Provisioned> {
    if let Some(existing) = find_artifact(store, parent, name, kind).await? {
        info!("{} already has a {} ({})", name, kind, existing.id);
        return Ok(Provisioned {
            id: existing.id,
            name: existing.name,
            created: false,
        });
    }

    let created = store
        .create_file(&NewFile {
            name: name.to_string(),
            kind,
            parent: parent.clone(),
            writers_can_share: false,
        })
        .await?;

    info!("Created {} {} ({})", kind, created.name, created.id);

    Ok(Provisioned {
        id: created.id,
        name: created.name,
        created: true,
    })
}
