//! Parameterized Drive search queries.
//!
//! Queries are kept as structured clauses and only rendered to the Drive `q`
//! syntax at the HTTP boundary, where every literal is escaped. The in-memory
//! store evaluates the same clauses directly.

use std::fmt;

use classdrive_common::{ArtifactKind, FileId, FOLDER_MIME_TYPE};

use crate::store::DriveFile;

/// One conjunct of a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `name = '<value>'`
    NameEquals(String),
    /// `mimeType = '<value>'`
    MimeTypeEquals(String),
    /// `mimeType != '<value>'`
    MimeTypeNotEquals(String),
    /// `'<id>' in parents`
    InParents(FileId),
    /// `trashed = false`
    NotTrashed,
}

impl Clause {
    /// Evaluate the clause against file metadata.
    pub fn matches(&self, file: &DriveFile) -> bool {
        match self {
            Clause::NameEquals(name) => file.name == *name,
            Clause::MimeTypeEquals(mime) => file.mime_type == *mime,
            Clause::MimeTypeNotEquals(mime) => file.mime_type != *mime,
            Clause::InParents(parent) => file.parents.contains(parent),
            Clause::NotTrashed => !file.trashed,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::NameEquals(name) => write!(f, "name = '{}'", escape_literal(name)),
            Clause::MimeTypeEquals(mime) => write!(f, "mimeType = '{}'", escape_literal(mime)),
            Clause::MimeTypeNotEquals(mime) => {
                write!(f, "mimeType != '{}'", escape_literal(mime))
            }
            Clause::InParents(parent) => {
                write!(f, "'{}' in parents", escape_literal(parent.as_str()))
            }
            Clause::NotTrashed => write!(f, "trashed = false"),
        }
    }
}

/// Conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveQuery {
    clauses: Vec<Clause>,
}

impl DriveQuery {
    /// Empty query (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-trashed folders with exactly this name.
    pub fn folder_named(name: &str) -> Self {
        Self::new()
            .name_eq(name)
            .mime_type_eq(FOLDER_MIME_TYPE)
            .not_trashed()
    }

    /// Non-trashed artifacts of one kind with exactly this name under a parent.
    pub fn artifact(name: &str, kind: ArtifactKind, parent: &FileId) -> Self {
        Self::new()
            .name_eq(name)
            .mime_type_eq(kind.mime_type())
            .in_parents(parent)
            .not_trashed()
    }

    /// Non-trashed direct children of a folder.
    pub fn children_of(parent: &FileId) -> Self {
        Self::new().in_parents(parent).not_trashed()
    }

    pub fn name_eq(mut self, name: impl Into<String>) -> Self {
        self.clauses.push(Clause::NameEquals(name.into()));
        self
    }

    pub fn mime_type_eq(mut self, mime: impl Into<String>) -> Self {
        self.clauses.push(Clause::MimeTypeEquals(mime.into()));
        self
    }

    pub fn mime_type_ne(mut self, mime: impl Into<String>) -> Self {
        self.clauses.push(Clause::MimeTypeNotEquals(mime.into()));
        self
    }

    pub fn in_parents(mut self, parent: &FileId) -> Self {
        self.clauses.push(Clause::InParents(parent.clone()));
        self
    }

    pub fn not_trashed(mut self) -> Self {
        self.clauses.push(Clause::NotTrashed);
        self
    }

    /// True when every clause holds for the file.
    pub fn matches(&self, file: &DriveFile) -> bool {
        self.clauses.iter().all(|clause| clause.matches(file))
    }

    /// Render to the Drive `q` parameter.
    pub fn to_query_string(&self) -> String {
        self.clauses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

impl fmt::Display for DriveQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Escape a string literal for the Drive query language.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
