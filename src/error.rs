use std::fmt;

use crate::location::LineCol;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Structural problem detected while building a [`crate::Grammar`].
    Grammar(String),

    /// Unresolved shift/reduce or reduce/reduce conflict in LR mode. Carries
    /// a rendered report of the involved states and items.
    LRConflict(String),

    /// No applicable action at the current input position.
    Parse {
        position: usize,
        location: LineCol,
        expected: Vec<String>,
        found: String,
    },

    /// A GLR parse produced multiple derivations but the caller asked for a
    /// single one.
    Ambiguity { solutions: usize },

    /// Terminal recognizer pattern failed to compile.
    Regex(regex::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Grammar(msg) => write!(f, "Grammar error: {msg}"),
            Error::LRConflict(report) => {
                write!(f, "Grammar is not deterministic.\n{report}")
            }
            Error::Parse {
                location,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "Parse error at {location}: expected one of [{}], found \"{found}\"",
                    expected.join(", ")
                )
            }
            Error::Ambiguity { solutions } => {
                write!(
                    f,
                    "Ambiguous parse: {solutions} derivations where a single one was requested"
                )
            }
            Error::Regex(e) => write!(f, "Invalid terminal pattern: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        Error::Regex(error)
    }
}
