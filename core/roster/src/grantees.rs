//! Grantee derivation for roster entries.

use crate::entry::RosterEntry;

/// Default domain appended to team member ccids.
pub const DEFAULT_EMAIL_DOMAIN: &str = "ualberta.ca";

/// Ordered, case-insensitively deduplicated set of grantee e-mails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GranteeSet {
    emails: Vec<String>,
}

impl GranteeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an e-mail. Blank values and duplicates are ignored.
    ///
    /// Returns true if the e-mail was added.
    pub fn insert(&mut self, email: &str) -> bool {
        let email = email.trim();
        if email.is_empty() || self.contains(email) {
            return false;
        }
        self.emails.push(email.to_string());
        true
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.iter().any(|e| e.eq_ignore_ascii_case(email.trim()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.emails
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl<S: AsRef<str>> Extend<S> for GranteeSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for email in iter {
            self.insert(email.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for GranteeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = GranteeSet::new();
        set.extend(iter);
        set
    }
}

/// E-mail for a team member ccid. Values that already are addresses are kept.
pub fn member_email(ccid: &str, domain: &str) -> String {
    let ccid = ccid.trim();
    if ccid.contains('@') {
        ccid.to_string()
    } else {
        format!("{}@{}", ccid, domain.trim_start_matches('@'))
    }
}

/// Grantees for one entry.
///
/// Individuals get their own e-mail. Teams get `ccid@domain` for every member
/// followed by any explicit member e-mails.
pub fn grantees_for(entry: &RosterEntry, domain: &str) -> GranteeSet {
    let mut grantees = GranteeSet::new();
    match entry {
        RosterEntry::Student(student) => {
            grantees.insert(&student.email);
        }
        RosterEntry::Team(team) => {
            for ccid in team.ccids.iter().filter(|c| !c.trim().is_empty()) {
                grantees.insert(&member_email(ccid, domain));
            }
            grantees.extend(&team.emails);
        }
    }
    grantees
}
