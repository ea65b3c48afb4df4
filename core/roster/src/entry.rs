//! Roster entries: one student or one team.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use classdrive_common::FileId;

/// Key whose presence marks a record as a team.
pub const TEAM_KEY: &str = "team";

/// Key under which the artifact provisioned for `affix` is recorded.
pub fn drive_id_key(affix: &str) -> String {
    format!("{} drive id", affix)
}

/// An individual student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub prename: String,
    pub surname: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Campus computing id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccid: Option<String>,
    /// Every other key, including recorded drive ids, in file order.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A team of students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub team: String,
    /// Member campus computing ids.
    #[serde(default)]
    pub ccids: Vec<String>,
    /// Member surnames.
    #[serde(default)]
    pub surnames: Vec<String>,
    /// Member e-mails that are not derived from a ccid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One roster record. Exactly one shape applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RosterEntry {
    Student(Student),
    Team(Team),
}

impl<'de> Deserialize<'de> for RosterEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;

        if map.contains_key(TEAM_KEY) {
            serde_json::from_value(Value::Object(map))
                .map(RosterEntry::Team)
                .map_err(|e| D::Error::custom(format!("invalid team entry: {}", e)))
        } else {
            serde_json::from_value(Value::Object(map))
                .map(RosterEntry::Student)
                .map_err(|e| D::Error::custom(format!("invalid student entry: {}", e)))
        }
    }
}

impl From<Student> for RosterEntry {
    fn from(student: Student) -> Self {
        RosterEntry::Student(student)
    }
}

impl From<Team> for RosterEntry {
    fn from(team: Team) -> Self {
        RosterEntry::Team(team)
    }
}

impl RosterEntry {
    pub fn is_team(&self) -> bool {
        matches!(self, RosterEntry::Team(_))
    }

    pub fn is_individual(&self) -> bool {
        matches!(self, RosterEntry::Student(_))
    }

    /// Human-readable label for logs and reports.
    pub fn label(&self) -> String {
        match self {
            RosterEntry::Student(s) => format!("{} {} <{}>", s.prename, s.surname, s.email),
            RosterEntry::Team(t) => format!("team {}", t.team),
        }
    }

    pub fn extra(&self) -> &Map<String, Value> {
        match self {
            RosterEntry::Student(s) => &s.extra,
            RosterEntry::Team(t) => &t.extra,
        }
    }

    pub fn extra_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            RosterEntry::Student(s) => &mut s.extra,
            RosterEntry::Team(t) => &mut t.extra,
        }
    }

    /// Drive id recorded for this affix by an earlier run.
    pub fn drive_id(&self, affix: &str) -> Option<&str> {
        self.extra().get(&drive_id_key(affix)).and_then(Value::as_str)
    }

    /// Record the drive id for this affix. Returns true if the value changed.
    pub fn set_drive_id(&mut self, affix: &str, id: &FileId) -> bool {
        if self.drive_id(affix) == Some(id.as_str()) {
            return false;
        }
        self.extra_mut()
            .insert(drive_id_key(affix), Value::String(id.to_string()));
        true
    }
}
