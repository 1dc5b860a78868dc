//! Error and warning types.
//!
//! Hard errors only come from loading or writing artifacts and configuration.
//! Everything that can go wrong while decomposing or normalizing a single
//! entity degrades to a [`Warning`] or a silent omission instead.

use std::fmt;
use std::path::PathBuf;

/// Error type for loading, persisting and configuring the engines
#[derive(Debug)]
pub enum Error {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    Json(serde_json::Error),
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, source } => write!(f, "IO error on {}: {}", path.display(), source),
            Error::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal condition reported back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Two training sources assert different canonical forms for one key.
    SynonymConflict {
        key: String,
        previous: String,
        replacement: String,
    },
    /// A persisted artifact was not found; an empty store is used instead.
    PersistedStateMissing { path: PathBuf },
    /// A tagged ref resolves to no lookup table, numeric type or composite.
    SchemaGap { composite: String, reference: String },
    /// Composite definitions reference each other in a cycle.
    ReferenceCycle { names: Vec<String> },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SynonymConflict { key, previous, replacement } => write!(
                f,
                "Found conflicting synonym definitions for '{}'. Overwriting target '{}' with '{}'",
                key, previous, replacement
            ),
            Warning::PersistedStateMissing { path } => {
                write!(f, "Failed to load persisted state from '{}'", path.display())
            }
            Warning::SchemaGap { composite, reference } => write!(
                f,
                "Composite '{}' references '@{}' which matches no lookup table, numeric type or composite",
                composite, reference
            ),
            Warning::ReferenceCycle { names } => {
                write!(f, "Circular composite references involving: {:?}", names)
            }
        }
    }
}

/// A value together with the warnings raised while producing it.
#[derive(Debug, Clone)]
pub struct Built<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Built<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn into_parts(self) -> (T, Vec<Warning>) {
        (self.value, self.warnings)
    }
}
