//! Error types for registry operations.
//!
//! Registry lookups fail in two distinguishable ways: the registry says the
//! resource does not exist (HTTP 404), or the request failed for any other
//! reason. No request is ever retried.

use std::fmt;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of registry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The registry does not know the resource.
    NotFound,
    /// Transport failure or an unexpected HTTP status.
    Network,
    /// The registry answered with something we cannot read.
    Format,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Resource not found in registry",
            Self::Network => "Registry request failed",
            Self::Format => "Unexpected registry response",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the source of the declaration and the registry domain",
            Self::Network => {
                "Check your connection and the credentials configured for this registry"
            }
            Self::Format => "Verify the registry implements the Terraform registry protocol",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The registry answered 404.
    #[error("registry resource '{url}' not found")]
    ResourceNotFound {
        /// Requested URL.
        url: String,
    },

    /// Any other failed request.
    #[error("registry request '{url}' failed: {message}")]
    Registry {
        /// Requested URL.
        url: String,
        /// What went wrong.
        message: String,
        /// HTTP status, if the server answered.
        status: Option<u16>,
    },

    /// The response body is not what the protocol describes.
    #[error("invalid registry response: {0}")]
    InvalidResponse(String),

    /// The discovery document does not advertise a required service.
    #[error("registry '{domain}' does not offer the '{capability}' service")]
    MissingCapability {
        /// Registry domain.
        domain: String,
        /// Service name, e.g. `modules.v1`.
        capability: String,
    },
}

impl Error {
    /// Map a transport error for `url` into the registry taxonomy.
    pub fn from_transport(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(404) => Self::ResourceNotFound {
                url: url.to_string(),
            },
            ureq::Error::StatusCode(code) => Self::status(url, code),
            other => Self::Registry {
                url: url.to_string(),
                message: other.to_string(),
                status: None,
            },
        }
    }

    /// Error for an HTTP status code of 400 or above.
    pub fn status(url: &str, code: u16) -> Self {
        if code == 404 {
            return Self::ResourceNotFound {
                url: url.to_string(),
            };
        }
        Self::Registry {
            url: url.to_string(),
            message: format!("HTTP {code}"),
            status: Some(code),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ResourceNotFound { .. } => ErrorCategory::NotFound,
            Self::Registry { .. } => ErrorCategory::Network,
            Self::InvalidResponse(_) | Self::MissingCapability { .. } => ErrorCategory::Format,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
