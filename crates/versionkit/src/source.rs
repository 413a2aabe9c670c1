//! Source locator parsing
//!
//! A Terraform source locator comes in two shapes per resource kind:
//!
//! - public registry short form: `namespace/name/provider` for modules,
//!   `namespace/type` for providers
//! - custom registry form: the same segments behind a leading domain,
//!   e.g. `app.terraform.io/namespace/name/provider`
//!
//! Both forms are matched case-insensitively; the stored locator is
//! lowercased so that declarations differing only by case collapse onto the
//! same identifier.

use crate::error::{Error, Result};
use crate::types::ResourceKind;
use std::fmt;

/// A validated, normalized source locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceAddress {
    normalized: String,
    base_domain: Option<String>,
    identifier: String,
}

impl SourceAddress {
    /// Parse a raw source locator for the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSourceFormat`] when the locator matches
    /// neither the public nor the custom registry grammar.
    pub fn parse(kind: ResourceKind, raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        let segments: Vec<&str> = normalized.split('/').collect();
        let expected = kind.public_segments();

        let invalid = || Error::InvalidSourceFormat {
            kind: kind.to_string(),
            source_string: normalized.clone(),
        };

        if segments.len() == expected && !segments[0].contains('.') {
            if !segments.iter().all(|s| is_name_segment(s)) {
                return Err(invalid());
            }
            log::trace!("Source '{normalized}' is from the public registry");
            return Ok(Self {
                identifier: normalized.clone(),
                base_domain: None,
                normalized,
            });
        }

        if segments.len() == expected + 1 && segments[0].contains('.') {
            if !is_domain_segment(segments[0]) || !segments[1..].iter().all(|s| is_name_segment(s))
            {
                return Err(invalid());
            }
            log::trace!("Source '{normalized}' is from a custom registry");
            return Ok(Self {
                base_domain: Some(segments[0].to_string()),
                identifier: segments[1..].join("/"),
                normalized,
            });
        }

        Err(invalid())
    }

    /// The lowercased locator as written in the declaration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Registry domain, if the locator names one.
    #[must_use]
    pub fn base_domain(&self) -> Option<&str> {
        self.base_domain.as_deref()
    }

    /// Registry-relative identifier (locator without the domain).
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for SourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_domain_segment(segment: &str) -> bool {
    segment.split('.').all(|label| {
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
