//! Roster file: load, mutate in memory, write back.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use classdrive_common::{Error, Result};

use crate::entry::RosterEntry;

/// Ordered list of roster entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Self { entries }
    }

    /// Parse a roster from a JSON array.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(format!("Invalid roster: {}", e)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [RosterEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn team_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_team()).count()
    }

    pub fn individual_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_individual()).count()
    }
}

impl IntoIterator for Roster {
    type Item = RosterEntry;
    type IntoIter = std::vec::IntoIter<RosterEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Destination for roster checkpoints and the final flush.
pub trait RosterSink {
    fn flush(&self, roster: &Roster) -> Result<()>;
}

/// Roster stored as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct RosterFile {
    path: PathBuf,
}

impl RosterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the roster.
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Not a JSON array of student/team objects
    pub fn load(&self) -> Result<Roster> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::InvalidInput(format!("Cannot read roster {}: {}", self.path.display(), e))
        })?;
        let roster = Roster::from_json(&json)?;
        tracing::debug!(
            "Loaded {} roster entries from {}",
            roster.len(),
            self.path.display()
        );
        Ok(roster)
    }

    /// Write the roster atomically (temp file in the same directory, then rename).
    pub fn save(&self, roster: &Roster) -> Result<()> {
        write_atomic(&self.path, roster.to_json_pretty()?.as_bytes())
    }
}

impl RosterSink for RosterFile {
    fn flush(&self, roster: &Roster) -> Result<()> {
        self.save(roster)
    }
}

/// Replace `path` with `contents` without leaving a truncated file behind.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
