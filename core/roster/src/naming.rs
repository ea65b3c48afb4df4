//! Artifact naming convention.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use classdrive_common::{Error, Result};

use crate::entry::{drive_id_key, RosterEntry};

/// Order of the name parts for individual artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameOrder {
    /// `<affix>_<surname>_<prename>`
    #[default]
    SurnameFirst,
    /// `<affix>_<prename>_<surname>`
    PrenameFirst,
}

impl FromStr for NameOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "surname-first" | "surname" => Ok(NameOrder::SurnameFirst),
            "prename-first" | "prename" => Ok(NameOrder::PrenameFirst),
            _ => Err(Error::InvalidInput(format!(
                "Unknown name order '{}'. Use: surname-first or prename-first",
                s
            ))),
        }
    }
}

impl fmt::Display for NameOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrder::SurnameFirst => f.write_str("surname-first"),
            NameOrder::PrenameFirst => f.write_str("prename-first"),
        }
    }
}

/// How artifact names are derived from the affix and entry fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingScheme {
    pub affix: String,
    #[serde(default)]
    pub order: NameOrder,
    /// Append member surnames to team artifact names.
    #[serde(default)]
    pub team_surnames: bool,
}

impl NamingScheme {
    /// # Errors
    /// - Returns error if the affix is blank
    pub fn new(affix: impl Into<String>) -> Result<Self> {
        let affix = affix.into();
        if affix.trim().is_empty() {
            return Err(Error::InvalidInput("Affix cannot be empty".to_string()));
        }
        Ok(Self {
            affix,
            order: NameOrder::default(),
            team_surnames: false,
        })
    }

    pub fn with_order(mut self, order: NameOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_team_surnames(mut self, team_surnames: bool) -> Self {
        self.team_surnames = team_surnames;
        self
    }

    /// Roster key under which artifact ids are recorded.
    pub fn drive_id_key(&self) -> String {
        drive_id_key(&self.affix)
    }

    /// Artifact name for an entry. Pure: same inputs, same bytes.
    pub fn artifact_name(&self, entry: &RosterEntry) -> String {
        match entry {
            RosterEntry::Student(s) => match self.order {
                NameOrder::SurnameFirst => format!("{}_{}_{}", self.affix, s.surname, s.prename),
                NameOrder::PrenameFirst => format!("{}_{}_{}", self.affix, s.prename, s.surname),
            },
            RosterEntry::Team(t) => {
                let mut name = format!("{}{}", self.affix, t.team);
                let surnames: Vec<&str> = t
                    .surnames
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                if self.team_surnames && !surnames.is_empty() {
                    name.push('_');
                    name.push_str(&surnames.join("_"));
                }
                name
            }
        }
    }
}
