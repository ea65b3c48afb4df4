//! Run reports.

use serde::Serialize;
use std::fmt;

use classdrive_common::FileId;

use crate::reconciler::ReconcileReport;

/// Final state of one roster entry after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Artifact provisioned and grants converged.
    Complete,
    /// Artifact provisioned but some grants did not converge.
    Partial,
    /// Artifact could not be provisioned.
    Failed,
    /// Dry run: nothing was changed.
    Planned,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Complete => "complete",
            EntryStatus::Partial => "partial",
            EntryStatus::Failed => "failed",
            EntryStatus::Planned => "planned",
        };
        f.write_str(s)
    }
}

/// Outcome for one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub label: String,
    pub artifact_name: String,
    pub artifact_id: Option<FileId>,
    /// The artifact was created (or would be, in a dry run).
    pub created: bool,
    /// The roster entry gained or changed its recorded drive id.
    pub recorded: bool,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<ReconcileReport>,
    /// Error that stopped this entry before or during reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntryOutcome {
    pub(crate) fn new(label: String, artifact_name: String) -> Self {
        Self {
            label,
            artifact_name,
            artifact_id: None,
            created: false,
            recorded: false,
            status: EntryStatus::Failed,
            reconcile: None,
            error: None,
        }
    }

    /// Itemized problems for this entry.
    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.error.iter().cloned().collect();
        if let Some(reconcile) = &self.reconcile {
            problems.extend(reconcile.failures.iter().map(ToString::to_string));
        }
        problems
    }
}

/// Aggregate result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub folder: FileId,
    pub dry_run: bool,
    pub entries: Vec<EntryOutcome>,
}

impl RunReport {
    fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn complete_count(&self) -> usize {
        self.count(EntryStatus::Complete)
    }

    pub fn partial_count(&self) -> usize {
        self.count(EntryStatus::Partial)
    }

    pub fn failed_count(&self) -> usize {
        self.count(EntryStatus::Failed)
    }

    pub fn created_count(&self) -> usize {
        self.entries.iter().filter(|e| e.created).count()
    }

    /// True when every entry is complete (or planned, for dry runs).
    pub fn is_clean(&self) -> bool {
        self.partial_count() == 0 && self.failed_count() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            let reused = self.entries.len() - self.created_count();
            writeln!(
                f,
                "Dry run in folder {}: {} to create, {} to reuse, {} skipped",
                self.folder,
                self.created_count(),
                reused.saturating_sub(self.failed_count()),
                self.failed_count()
            )?;
        } else {
            writeln!(
                f,
                "Folder {}: {} complete, {} partial, {} failed ({} created)",
                self.folder,
                self.complete_count(),
                self.partial_count(),
                self.failed_count(),
                self.created_count()
            )?;
        }

        for entry in &self.entries {
            let problems = entry.problems();
            if problems.is_empty() && entry.status != EntryStatus::Planned {
                continue;
            }
            let id = entry
                .artifact_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "  [{}] {} -> {} ({})",
                entry.status, entry.label, entry.artifact_name, id
            )?;
            for problem in problems {
                writeln!(f, "      {}", problem)?;
            }
        }

        Ok(())
    }
}
