//! Folder resolution by exact name.

use tracing::{debug, info};

use classdrive_common::{Error, FileId, Result};
use classdrive_drive::{DriveQuery, RemoteStore};

/// Resolve a folder name to its unique id.
///
/// # Errors
/// - `InvalidInput` if the name is blank
/// - `NotFound` if no folder has this name
/// - `Ambiguous` if several folders have this name
/// - Remote errors from the lookup
pub async fn resolve_folder(store: &dyn RemoteStore, name: &str) -> Result<FileId> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Folder name cannot be empty".to_string()));
    }

    let query = DriveQuery::folder_named(name);
    debug!("Resolving folder with query: {}", query);

    let mut matches = store.list_files(&query).await?;

    match matches.len() {
        0 => Err(Error::NotFound(format!(
            "Could not find folder named \"{}\"",
            name
        ))),
        1 => {
            let folder = matches.remove(0);
            info!("Found folder \"{}\" with Drive id {}", folder.name, folder.id);
            Ok(folder.id)
        }
        n => {
            let ids: Vec<String> = matches.iter().map(|f| f.id.to_string()).collect();
            Err(Error::Ambiguous(format!(
                "{} folders are named \"{}\" ({}); rename all but one",
                n,
                name,
                ids.join(", ")
            )))
        }
    }
}
