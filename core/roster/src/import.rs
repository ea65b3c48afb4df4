//! Conversion of course-management CSV exports into roster entries.
//!
//! Student exports have one header row and the columns
//! `first name, surname, email, student id, ccid`.
//!
//! Team exports have two header rows. Column 2 holds the team name; from
//! column 3 on, cells alternate between a member's full name (odd index) and
//! that member's ccid (even index). Empty cells are skipped.

use serde_json::Map;
use std::io::Read;

use classdrive_common::{Error, Result};

use crate::entry::{RosterEntry, Student, Team};
use crate::roster::Roster;

const FIRST_NAME: usize = 0;
const SURNAME: usize = 1;
const EMAIL: usize = 2;
const STUDENT_ID: usize = 3;
const CCID: usize = 4;

const TEAM: usize = 2;

const STUDENT_HEADER_ROWS: usize = 1;
const TEAM_HEADER_ROWS: usize = 2;

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input)
}

fn csv_error(e: csv::Error) -> Error {
    Error::Serialization(format!("Invalid CSV: {}", e))
}

/// Parse a student export.
///
/// # Errors
/// - Malformed CSV
/// - A data row with fewer than five columns
pub fn import_students<R: Read>(input: R) -> Result<Roster> {
    let mut entries = Vec::new();

    for (i, record) in csv_reader(input).records().enumerate() {
        let record = record.map_err(csv_error)?;
        if i < STUDENT_HEADER_ROWS {
            continue;
        }
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let cell = |index: usize| -> Result<String> {
            record
                .get(index)
                .map(|value| value.trim().to_string())
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "Row {}: expected at least {} columns, found {}",
                        i + 1,
                        CCID + 1,
                        record.len()
                    ))
                })
        };

        entries.push(RosterEntry::Student(Student {
            prename: cell(FIRST_NAME)?,
            surname: cell(SURNAME)?,
            email: cell(EMAIL)?,
            student_id: Some(cell(STUDENT_ID)?),
            ccid: Some(cell(CCID)?),
            extra: Map::new(),
        }));
    }

    tracing::info!("Imported {} students", entries.len());
    Ok(Roster::new(entries))
}

/// Parse a team export.
///
/// # Errors
/// - Malformed CSV
/// - A data row without a team name column
pub fn import_teams<R: Read>(input: R) -> Result<Roster> {
    let mut entries = Vec::new();

    for (i, record) in csv_reader(input).records().enumerate() {
        let record = record.map_err(csv_error)?;
        if i < TEAM_HEADER_ROWS {
            continue;
        }
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let team = record.get(TEAM).map(str::trim).ok_or_else(|| {
            Error::InvalidInput(format!("Row {}: missing team name column", i + 1))
        })?;

        let mut ccids = Vec::new();
        let mut surnames = Vec::new();
        for (j, value) in record.iter().enumerate().skip(TEAM + 1) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if j % 2 == 0 {
                ccids.push(value.to_lowercase());
            } else if let Some(surname) = value.split_whitespace().last() {
                surnames.push(surname.to_string());
            }
        }

        entries.push(RosterEntry::Team(Team {
            team: team.to_string(),
            ccids,
            surnames,
            emails: Vec::new(),
            extra: Map::new(),
        }));
    }

    tracing::info!("Imported {} teams", entries.len());
    Ok(Roster::new(entries))
}
