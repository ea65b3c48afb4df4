//! Optional instructor file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use classdrive_common::{Error, Result};

/// One instructor or TA. Only `email` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Load a JSON array of instructors.
pub fn load_instructors(path: impl AsRef<Path>) -> Result<Vec<Instructor>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidInput(format!(
            "Cannot read instructor file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_instructors(&json)
}

pub fn parse_instructors(json: &str) -> Result<Vec<Instructor>> {
    let instructors: Vec<Instructor> = serde_json::from_str(json)
        .map_err(|e| Error::Serialization(format!("Invalid instructor file: {}", e)))?;

    if let Some(position) = instructors.iter().position(|i| i.email.trim().is_empty()) {
        return Err(Error::InvalidInput(format!(
            "Instructor #{} has an empty email",
            position + 1
        )));
    }

    Ok(instructors)
}

/// Trimmed e-mails, in file order.
pub fn instructor_emails(instructors: &[Instructor]) -> Vec<String> {
    instructors.iter().map(|i| i.email.trim().to_string()).collect()
}
