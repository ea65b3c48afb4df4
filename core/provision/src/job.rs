//! Provisioning job: one artifact per roster entry, shared with its grantees.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use classdrive_common::{ArtifactKind, Error, FileId, Result, Role};
use classdrive_drive::RemoteStore;
use classdrive_roster::{
    grantees_for, GranteeSet, NamingScheme, Roster, RosterEntry, RosterSink, DEFAULT_EMAIL_DOMAIN,
};

use crate::provisioner::{find_artifact, provision};
use crate::reconciler::reconcile;
use crate::report::{EntryOutcome, EntryStatus, RunReport};

/// Options for a provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionOptions {
    pub naming: NamingScheme,
    pub kind: ArtifactKind,
    /// Role granted to every grantee.
    pub role: Role,
    /// Domain appended to team member ccids.
    pub email_domain: String,
    /// Instructor e-mails added to every entry's grantees.
    pub instructors: Vec<String>,
    /// `Some(true)`: every entry must be a team. `Some(false)`: none may be.
    pub expect_teams: Option<bool>,
    /// Look up artifacts without creating or sharing anything.
    pub dry_run: bool,
}

impl ProvisionOptions {
    pub fn new(naming: NamingScheme, kind: ArtifactKind) -> Self {
        Self {
            naming,
            kind,
            role: Role::Writer,
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            instructors: Vec::new(),
            expect_teams: None,
            dry_run: false,
        }
    }
}

/// A validated provisioning run over one roster.
#[derive(Debug, Clone)]
pub struct ProvisionJob {
    options: ProvisionOptions,
}

impl ProvisionJob {
    /// # Errors
    /// - `Config` if the role is owner or the e-mail domain is blank
    pub fn new(options: ProvisionOptions) -> Result<Self> {
        if options.role.is_owner() {
            return Err(Error::Config(
                "Artifacts cannot be shared with the owner role".to_string(),
            ));
        }
        if options.email_domain.trim().is_empty() {
            return Err(Error::Config("E-mail domain cannot be empty".to_string()));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    /// Check that the roster shape matches the team expectation.
    ///
    /// # Errors
    /// - `Config` naming the first entry of the wrong shape
    pub fn validate_roster(&self, roster: &Roster) -> Result<()> {
        let Some(expect_teams) = self.options.expect_teams else {
            return Ok(());
        };

        let mismatch = roster
            .entries()
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.is_team() != expect_teams);

        match mismatch {
            None => Ok(()),
            Some((index, entry)) if expect_teams => Err(Error::Config(format!(
                "Team mode requested but roster entry #{} ({}) is an individual",
                index + 1,
                entry.label()
            ))),
            Some((index, entry)) => Err(Error::Config(format!(
                "Roster entry #{} ({}) is a team; pass --team for team rosters",
                index + 1,
                entry.label()
            ))),
        }
    }

    /// Grantees for an entry, instructors included.
    pub fn grantees(&self, entry: &RosterEntry) -> GranteeSet {
        let mut grantees = grantees_for(entry, &self.options.email_domain);
        grantees.extend(&self.options.instructors);
        grantees
    }

    /// Provision and share one artifact per roster entry, in roster order.
    ///
    /// Entries are isolated: a failure is recorded in that entry's outcome
    /// and the run moves on. New artifact ids are written into `roster`;
    /// when `sink` is given it is flushed after every entry whose id changed.
    ///
    /// # Errors
    /// - `Config` if the roster shape does not match the team expectation;
    ///   nothing is touched then
    pub async fn run(
        &self,
        store: &dyn RemoteStore,
        folder: &FileId,
        roster: &mut Roster,
        sink: Option<&dyn RosterSink>,
    ) -> Result<RunReport> {
        self.validate_roster(roster)?;

        info!(
            "Provisioning {} {}s in folder {} ({} entries{})",
            self.options.naming.affix,
            self.options.kind,
            folder,
            roster.len(),
            if self.options.dry_run { ", dry run" } else { "" }
        );

        let mut report = RunReport {
            folder: folder.clone(),
            dry_run: self.options.dry_run,
            entries: Vec::with_capacity(roster.len()),
        };

        for index in 0..roster.len() {
            let entry = &mut roster.entries_mut()[index];
            let outcome = if self.options.dry_run {
                self.plan_entry(store, folder, entry).await
            } else {
                self.provision_entry(store, folder, entry).await
            };

            if outcome.recorded {
                if let Some(sink) = sink {
                    if let Err(e) = sink.flush(roster) {
                        warn!("Could not checkpoint roster: {}", e);
                    }
                }
            }

            report.entries.push(outcome);
        }

        info!(
            "Done: {} complete, {} partial, {} failed",
            report.complete_count(),
            report.partial_count(),
            report.failed_count()
        );

        Ok(report)
    }

    async fn provision_entry(
        &self,
        store: &dyn RemoteStore,
        folder: &FileId,
        entry: &mut RosterEntry,
    ) -> EntryOutcome {
        let name = self.options.naming.artifact_name(entry);
        let mut outcome = EntryOutcome::new(entry.label(), name.clone());

        let grantees = self.grantees(entry);
        if grantees.is_empty() {
            warn!("{} has no grantees; skipping", outcome.label);
            outcome.error = Some("No grantees: entry has no e-mail or member ccids".to_string());
            return outcome;
        }

        let artifact = match provision(store, folder, &name, self.options.kind).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Could not provision {} for {}: {}", name, outcome.label, e);
                outcome.error = Some(format!("Could not provision: {}", e));
                return outcome;
            }
        };

        outcome.created = artifact.created;
        outcome.recorded = entry.set_drive_id(&self.options.naming.affix, &artifact.id);
        outcome.artifact_id = Some(artifact.id.clone());

        match reconcile(store, &artifact.id, &grantees, self.options.role).await {
            Ok(reconciled) => {
                outcome.status = if reconciled.is_converged() {
                    EntryStatus::Complete
                } else {
                    EntryStatus::Partial
                };
                outcome.reconcile = Some(reconciled);
            }
            Err(e) => {
                warn!("Could not share {} ({}): {}", name, artifact.id, e);
                outcome.status = EntryStatus::Partial;
                outcome.error = Some(format!("Could not share: {}", e));
            }
        }

        outcome
    }

    async fn plan_entry(
        &self,
        store: &dyn RemoteStore,
        folder: &FileId,
        entry: &RosterEntry,
    ) -> EntryOutcome {
        let name = self.options.naming.artifact_name(entry);
        let mut outcome = EntryOutcome::new(entry.label(), name.clone());

        let grantees = self.grantees(entry);
        if grantees.is_empty() {
            outcome.error = Some("No grantees: entry has no e-mail or member ccids".to_string());
            return outcome;
        }

        match find_artifact(store, folder, &name, self.options.kind).await {
            Ok(existing) => {
                outcome.created = existing.is_none();
                outcome.artifact_id = existing.map(|file| file.id);
                outcome.status = EntryStatus::Planned;
                info!(
                    "Would {} {} and share it with {}",
                    if outcome.created { "create" } else { "reuse" },
                    name,
                    grantees.as_slice().join(", ")
                );
            }
            Err(e) => {
                outcome.error = Some(format!("Could not look up: {}", e));
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classdrive_drive::MemoryDrive;
    use classdrive_roster::RosterFile;
    use std::cell::Cell;
    use tempfile::TempDir;

    const OWNER: &str = "prof@x.edu";

    fn students() -> Roster {
        Roster::from_json(
            r#"[
                {"prename": "Ana", "surname": "Lee", "email": "ana@x.edu"},
                {"prename": "Bo", "surname": "Kim", "email": "bo@x.edu", "ccid": "bkim"}
            ]"#,
        )
        .unwrap()
    }

    fn job(affix: &str) -> ProvisionJob {
        ProvisionJob::new(ProvisionOptions::new(
            NamingScheme::new(affix).unwrap(),
            ArtifactKind::Document,
        ))
        .unwrap()
    }

    fn grant_emails(drive: &MemoryDrive, file: &FileId) -> Vec<(String, Role)> {
        let mut grants: Vec<(String, Role)> = drive
            .permissions(file)
            .into_iter()
            .map(|p| (p.email_address.unwrap_or_default(), p.role))
            .collect();
        grants.sort();
        grants
    }

    #[tokio::test]
    async fn test_single_student_example() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let mut roster =
            Roster::from_json(r#"[{"prename":"Ana","surname":"Lee","email":"ana@x.edu"}]"#)
                .unwrap();

        let report = job("hw1").run(&drive, &folder, &mut roster, None).await.unwrap();

        assert!(report.is_clean());
        let doc = drive
            .files()
            .into_iter()
            .find(|f| f.name == "hw1_Lee_Ana")
            .unwrap();
        assert_eq!(doc.parents, vec![folder]);
        assert_eq!(
            grant_emails(&drive, &doc.id),
            vec![
                ("ana@x.edu".to_string(), Role::Writer),
                (OWNER.to_string(), Role::Owner),
            ]
        );
        assert_eq!(roster.entries()[0].drive_id("hw1"), Some(doc.id.as_str()));
        assert!(drive.notified().is_empty());

        let json: serde_json::Value =
            serde_json::from_str(&roster.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json[0]["hw1 drive id"], doc.id.as_str());
    }

    #[tokio::test]
    async fn test_second_run_reuses_artifacts() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let mut roster = students();
        let job = job("hw1");

        let first = job.run(&drive, &folder, &mut roster, None).await.unwrap();
        let second = job.run(&drive, &folder, &mut roster, None).await.unwrap();

        assert_eq!(first.created_count(), 2);
        assert_eq!(second.created_count(), 0);
        assert!(second.entries.iter().all(|e| !e.recorded));
        assert_eq!(
            drive.files().into_iter().filter(|f| !f.is_folder()).count(),
            2
        );
        for (a, b) in first.entries.iter().zip(&second.entries) {
            assert_eq!(a.artifact_id, b.artifact_id);
        }
    }

    #[tokio::test]
    async fn test_stale_grants_are_replaced() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let doc = drive.seed_file("hw1_Lee_Ana", ArtifactKind::Document, &folder);
        drive.seed_grant(&doc, "dropped@x.edu", Role::Writer);

        let mut roster =
            Roster::from_json(r#"[{"prename":"Ana","surname":"Lee","email":"ana@x.edu"}]"#)
                .unwrap();
        let report = job("hw1").run(&drive, &folder, &mut roster, None).await.unwrap();

        assert!(!report.entries[0].created);
        let emails: Vec<String> = grant_emails(&drive, &doc).into_iter().map(|(e, _)| e).collect();
        assert_eq!(emails, vec!["ana@x.edu", OWNER]);
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_stop_run() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        drive.fail_create_file("hw1_Lee_Ana");
        let mut roster = students();

        let report = job("hw1").run(&drive, &folder, &mut roster, None).await.unwrap();

        assert_eq!(report.entries[0].status, EntryStatus::Failed);
        assert!(report.entries[0].error.is_some());
        assert_eq!(report.entries[1].status, EntryStatus::Complete);
        assert_eq!(roster.entries()[0].drive_id("hw1"), None);
        assert!(roster.entries()[1].drive_id("hw1").is_some());
    }

    #[tokio::test]
    async fn test_grant_failure_is_partial() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        drive.fail_create_permission("ana@x.edu");
        let mut roster = students();

        let report = job("hw1").run(&drive, &folder, &mut roster, None).await.unwrap();

        assert_eq!(report.entries[0].status, EntryStatus::Partial);
        assert!(report.entries[0].artifact_id.is_some());
        assert_eq!(report.entries[0].problems().len(), 1);
        assert_eq!(report.entries[1].status, EntryStatus::Complete);
        assert!(roster.entries()[0].drive_id("hw1").is_some());
    }

    #[tokio::test]
    async fn test_team_roster_with_instructors() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let mut roster = Roster::from_json(
            r#"[{"team": "7", "ccids": ["alee", "bkim"], "surnames": ["Lee", "Kim"]}]"#,
        )
        .unwrap();

        let mut options = ProvisionOptions::new(
            NamingScheme::new("proj").unwrap().with_team_surnames(true),
            ArtifactKind::Spreadsheet,
        );
        options.expect_teams = Some(true);
        options.instructors = vec!["ta@x.edu".to_string()];
        let job = ProvisionJob::new(options).unwrap();

        let report = job.run(&drive, &folder, &mut roster, None).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.entries[0].artifact_name, "proj7_Lee_Kim");
        let sheet = report.entries[0].artifact_id.clone().unwrap();
        let emails: Vec<String> = grant_emails(&drive, &sheet).into_iter().map(|(e, _)| e).collect();
        assert_eq!(
            emails,
            vec!["alee@ualberta.ca", "bkim@ualberta.ca", OWNER, "ta@x.edu"]
        );
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_config_error() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let mut roster = students();

        let mut options =
            ProvisionOptions::new(NamingScheme::new("hw1").unwrap(), ArtifactKind::Document);
        options.expect_teams = Some(true);
        let job = ProvisionJob::new(options).unwrap();

        let err = job.run(&drive, &folder, &mut roster, None).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(drive.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let existing = drive.seed_file("hw1_Kim_Bo", ArtifactKind::Document, &folder);
        let mut roster = students();

        let mut options =
            ProvisionOptions::new(NamingScheme::new("hw1").unwrap(), ArtifactKind::Document);
        options.dry_run = true;
        let report = ProvisionJob::new(options)
            .unwrap()
            .run(&drive, &folder, &mut roster, None)
            .await
            .unwrap();

        assert_eq!(drive.mutation_count(), 0);
        assert!(report.entries.iter().all(|e| e.status == EntryStatus::Planned));
        assert!(report.entries[0].created);
        assert!(!report.entries[1].created);
        assert_eq!(report.entries[1].artifact_id, Some(existing));
        assert_eq!(roster, students());
    }

    #[tokio::test]
    async fn test_entry_without_grantees_fails() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let mut roster = Roster::from_json(r#"[{"team": "3", "ccids": []}]"#).unwrap();

        let report = job("hw").run(&drive, &folder, &mut roster, None).await.unwrap();

        assert_eq!(report.entries[0].status, EntryStatus::Failed);
        assert_eq!(drive.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_checkpoint_writes_after_each_new_id() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let dir = TempDir::new().unwrap();
        let file = RosterFile::new(dir.path().join("roster.json"));
        let mut roster = students();

        job("hw1")
            .run(&drive, &folder, &mut roster, Some(&file))
            .await
            .unwrap();

        let saved = file.load().unwrap();
        assert_eq!(saved, roster);
        assert!(saved.entries().iter().all(|e| e.drive_id("hw1").is_some()));
    }

    struct CountingSink(Cell<usize>);

    impl RosterSink for CountingSink {
        fn flush(&self, _roster: &Roster) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Err(Error::InvalidInput("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_checkpoint_only_on_change_and_failures_are_tolerated() {
        let drive = MemoryDrive::new(OWNER);
        let folder = drive.seed_folder("CS101", None);
        let sink = CountingSink(Cell::new(0));
        let mut roster = students();
        let job = job("hw1");

        let report = job.run(&drive, &folder, &mut roster, Some(&sink)).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(sink.0.get(), 2);

        job.run(&drive, &folder, &mut roster, Some(&sink)).await.unwrap();
        assert_eq!(sink.0.get(), 2);
    }

    #[test]
    fn test_owner_role_rejected() {
        let mut options =
            ProvisionOptions::new(NamingScheme::new("hw1").unwrap(), ArtifactKind::Document);
        options.role = Role::Owner;
        assert!(matches!(ProvisionJob::new(options), Err(Error::Config(_))));
    }
}
