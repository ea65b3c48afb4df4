//! Course roster model for classdrive.
//!
//! A roster is the JSON list of students or teams that drives provisioning.
//! This crate owns reading and writing it, the CSV importers that produce
//! it, and the pure rules that turn an entry into an artifact name and a
//! set of grantee e-mails.

pub mod entry;
pub mod grantees;
pub mod import;
pub mod instructors;
pub mod naming;
pub mod roster;

pub use entry::{drive_id_key, RosterEntry, Student, Team, TEAM_KEY};
pub use grantees::{grantees_for, member_email, GranteeSet, DEFAULT_EMAIL_DOMAIN};
pub use import::{import_students, import_teams};
pub use instructors::{instructor_emails, load_instructors, parse_instructors, Instructor};
pub use naming::{NameOrder, NamingScheme};
pub use roster::{Roster, RosterFile, RosterSink};
