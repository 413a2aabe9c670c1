//! Error types for the resource model.
//!
//! Every error raised while constructing, comparing or annotating a
//! versioned resource is represented here. Errors are categorized so the
//! orchestration layer can tell configuration problems in the scanned
//! project apart from local I/O failures.

use std::io;
use std::path::PathBuf;

/// Result type alias for resource model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of model errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The scanned declaration contains something we cannot interpret.
    Declaration,
    /// Reading a declaration file failed.
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Declaration => "Invalid declaration",
            Self::Io => "File access failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Declaration => "Fix the source or version expression in the declaration file",
            Self::Io => "Check that the declaration file exists and is readable",
        }
    }
}

/// Errors that can occur while working with versioned resources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source locator does not match any accepted grammar for its kind.
    #[error("source '{source_string}' is not a valid terraform {kind} source")]
    InvalidSourceFormat {
        /// Resource kind the source was parsed for.
        kind: String,
        /// The (lowercased) source that failed to parse.
        source_string: String,
    },

    /// A version expression is neither exact, pessimistic nor a range.
    #[error("could not parse version constraint '{expression}': {reason}")]
    ConstraintParse {
        /// The offending expression.
        expression: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A version string could not be read as a dotted-numeric version.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// A resource carries a start line that cannot exist in a file.
    #[error("resource '{name}' has invalid start line number {line}")]
    InvalidLineNumber {
        /// Resource name.
        name: String,
        /// The offending line number.
        line: usize,
    },

    /// An options directive could not be parsed.
    #[error("invalid option '{option}' for resource '{name}'")]
    InvalidOption {
        /// Resource name.
        name: String,
        /// The offending option text.
        option: String,
    },

    /// IO error while reading a declaration file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a constraint parse error.
    pub fn constraint(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConstraintParse {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::Io,
            _ => ErrorCategory::Declaration,
        }
    }
}
