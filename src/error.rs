//! Error types for template store and page extraction.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Folder,
    Template,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Folder => f.write_str("folder"),
            Kind::Template => f.write_str("template"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} \"{name}\" already exists")]
    DuplicateName { kind: Kind, name: String },

    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: Kind, name: String },

    #[error("{0} name must not be empty")]
    EmptyName(Kind),

    #[error("select a {0} first")]
    NoSelection(Kind),

    #[error("only works on web pages (got {0})")]
    UnsupportedPage(String),

    #[error("no data found, check the selectors")]
    Extraction,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Failures raised by persistence, the page or the clipboard.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("stored data is malformed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("page request failed: {0}")]
    Page(#[from] reqwest::Error),

    #[error("page refused extraction: {0}")]
    Refused(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Collaborator(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Collaborator(e.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Collaborator(e.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Collaborator(e.into())
    }
}
