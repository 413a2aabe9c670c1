//! Errors raised by the application layer.
//!
//! Model and registry failures come from `versionkit` and `registrykit`;
//! this enum covers the collaborators that live in the binary.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declaration file could not be read as HCL or a block could not be located.
    #[error("could not parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// Rewriting a version attribute failed.
    #[error("could not patch {name} in '{path}': {message}")]
    Patch {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// More than one resource shares a (name, source, file) identity.
    #[error("found {count} resources '{name}' with source '{source_address}' in '{path}'")]
    AmbiguousIdentity {
        name: String,
        source_address: String,
        path: PathBuf,
        count: usize,
    },

    /// A git invocation failed.
    #[error("git {command} failed: {message}")]
    Vcs { command: String, message: String },

    /// A review-request service call failed.
    #[error("{operation} failed: {message}")]
    ReviewService {
        operation: String,
        message: String,
        status: Option<u16>,
    },
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn patch(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::Patch {
            name: name.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// What the user can do about it, when there is something.
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            Self::Parse { .. } => Some("Check that the file is valid HCL"),
            Self::Patch { .. } => None,
            Self::AmbiguousIdentity { .. } => {
                Some("Give every module and provider a unique name within a file")
            }
            Self::Vcs { .. } => Some("Check the git checkout and its 'origin' remote"),
            Self::ReviewService {
                status: Some(401 | 403),
                ..
            } => Some("Check that the token may push branches and open pull requests"),
            Self::ReviewService {
                status: Some(422), ..
            } => Some("The branch or pull request may already exist"),
            Self::ReviewService { .. } => None,
        }
    }

    pub fn review(operation: impl Into<String>, err: ureq::Error) -> Self {
        let status = match err {
            ureq::Error::StatusCode(code) => Some(code),
            _ => None,
        };
        Self::ReviewService {
            operation: operation.into(),
            message: err.to_string(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_error_keeps_status() {
        let err = Error::review("create pull request", ureq::Error::StatusCode(422));
        assert!(matches!(
            err,
            Error::ReviewService {
                status: Some(422),
                ..
            }
        ));
    }

    #[test]
    fn test_advice_by_status() {
        let forbidden = Error::review("create branch", ureq::Error::StatusCode(403));
        assert!(forbidden.advice().is_some_and(|a| a.contains("token")));
        let server = Error::review("create branch", ureq::Error::StatusCode(500));
        assert!(server.advice().is_none());
    }

    #[test]
    fn test_display() {
        let err = Error::patch("vpc", "main.tf", "no version attribute");
        assert_eq!(
            err.to_string(),
            "could not patch vpc in 'main.tf': no version attribute"
        );
    }
}
