//! The versioned resource entity
//!
//! A [`VersionedResource`] is one module or provider declaration together
//! with what the registry knows about it. Its status is never assigned
//! directly: [`VersionedResource::resolve`] derives it from the newest
//! version, and the orchestrator records patch outcomes through
//! [`VersionedResource::mark_patched`] / [`VersionedResource::mark_patch_error`].

use crate::constraint::{VersionConstraint, strip_operator};
use crate::error::{Error, Result};
use crate::source::SourceAddress;
use crate::types::{ResourceKind, ResourceOptions, ResourceStatus};
use crate::version::DottedVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A module or provider declaration with a version expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ResourceRecord", into = "ResourceRecord")]
pub struct VersionedResource {
    name: String,
    kind: ResourceKind,
    source: SourceAddress,
    current_version: String,
    constraint: VersionConstraint,
    start_line_number: usize,
    source_file: PathBuf,
    newest_version: Option<String>,
    status: ResourceStatus,
    hosting_repository: Option<String>,
    options: ResourceOptions,
}

impl VersionedResource {
    /// Create a resource from a discovered declaration.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidSourceFormat`] if `source` does not match
    /// the kind's grammar and [`Error::ConstraintParse`] if `current_version`
    /// is not a usable version expression.
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        source: &str,
        current_version: impl Into<String>,
        source_file: impl Into<PathBuf>,
        start_line_number: usize,
    ) -> Result<Self> {
        let current_version = current_version.into();
        Ok(Self {
            name: name.into(),
            kind,
            source: SourceAddress::parse(kind, source)?,
            constraint: VersionConstraint::parse(&current_version)?,
            current_version,
            start_line_number,
            source_file: source_file.into(),
            newest_version: None,
            status: ResourceStatus::Unpatched,
            hosting_repository: None,
            options: ResourceOptions::default(),
        })
    }

    /// Shorthand for a module declaration.
    pub fn module(
        name: impl Into<String>,
        source: &str,
        current_version: impl Into<String>,
        source_file: impl Into<PathBuf>,
        start_line_number: usize,
    ) -> Result<Self> {
        Self::new(
            ResourceKind::Module,
            name,
            source,
            current_version,
            source_file,
            start_line_number,
        )
    }

    /// Shorthand for a provider requirement.
    pub fn provider(
        name: impl Into<String>,
        source: &str,
        current_version: impl Into<String>,
        source_file: impl Into<PathBuf>,
        start_line_number: usize,
    ) -> Result<Self> {
        Self::new(
            ResourceKind::Provider,
            name,
            source,
            current_version,
            source_file,
            start_line_number,
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn source(&self) -> &SourceAddress {
        &self.source
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn start_line_number(&self) -> usize {
        self.start_line_number
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Newest version, rendered in the declaration's notation.
    pub fn newest_version(&self) -> Option<&str> {
        self.newest_version.as_deref()
    }

    /// Newest version without a pessimistic operator.
    pub fn newest_version_base(&self) -> Option<&str> {
        self.newest_version.as_deref().map(strip_operator)
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    /// `owner/repo` of the upstream repository on a known forge.
    pub fn hosting_repository(&self) -> Option<&str> {
        self.hosting_repository.as_deref()
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    /// Registry domain to query, falling back to `default_domain`.
    pub fn registry_domain<'a>(&'a self, default_domain: &'a str) -> &'a str {
        self.source.base_domain().unwrap_or(default_domain)
    }

    /// Address of the version attribute inside the declaration file.
    pub fn version_address(&self) -> String {
        self.kind.version_address(&self.name)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Record the registry's newest version and derive the status from it.
    ///
    /// `None` means the registry has no usable version and yields
    /// [`ResourceStatus::NoVersionFound`]. A version the constraint already
    /// covers yields [`ResourceStatus::UpToDate`]; anything else leaves the
    /// resource [`ResourceStatus::Unpatched`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] when `newest` is not dotted-numeric.
    pub fn resolve(&mut self, newest: Option<&str>) -> Result<ResourceStatus> {
        let Some(newest) = newest else {
            self.newest_version = None;
            self.status = ResourceStatus::NoVersionFound;
            return Ok(self.status);
        };

        let base = strip_operator(newest);
        let parsed: DottedVersion = base.parse()?;
        self.newest_version = Some(self.constraint.render(base));
        self.status = if self.constraint.is_satisfied_by(&parsed) {
            ResourceStatus::UpToDate
        } else {
            ResourceStatus::Unpatched
        };
        log::trace!(
            "Resolved {} '{}' to {} ({})",
            self.kind,
            self.name,
            newest,
            self.status
        );
        Ok(self.status)
    }

    /// Record a successful patch.
    pub fn mark_patched(&mut self) {
        self.status = ResourceStatus::Patched;
    }

    /// Record a failed patch.
    pub fn mark_patch_error(&mut self) {
        self.status = ResourceStatus::PatchError;
    }

    pub fn set_hosting_repository(&mut self, repository: Option<String>) {
        self.hosting_repository = repository;
    }

    pub fn set_options(&mut self, options: ResourceOptions) {
        self.options = options;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the declared constraint already covers the newest version.
    ///
    /// An unresolved newest version counts as satisfied.
    pub fn constraint_satisfied(&self) -> bool {
        match self.newest_version_base() {
            None => true,
            Some(base) => base
                .parse::<DottedVersion>()
                .map(|newest| self.constraint.is_satisfied_by(&newest))
                .unwrap_or(true),
        }
    }

    /// Whether nothing is left to do for this resource.
    ///
    /// A failed patch keeps the resource pending, a successful one settles
    /// it regardless of what the file says now.
    pub fn is_up_to_date(&self) -> bool {
        match self.status {
            ResourceStatus::PatchError => false,
            ResourceStatus::Patched => true,
            _ => self.constraint_satisfied(),
        }
    }

    /// Whether `other` names the same declaration.
    ///
    /// Identity is (name, source locator, source file).
    pub fn same_identity(&self, other: &Self) -> bool {
        self.name == other.name
            && self.source == other.source
            && self.source_file == other.source_file
    }

    /// All resources in `candidates` sharing this resource's identity.
    pub fn find<'a>(&self, candidates: &'a [Self]) -> Vec<&'a Self> {
        candidates
            .iter()
            .filter(|candidate| self.same_identity(candidate))
            .collect()
    }

    /// Copy of this resource with its source file re-anchored.
    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<PathBuf>) -> Self {
        self.source_file = source_file.into();
        self
    }
}

// =============================================================================
// Serialized form
// =============================================================================

/// Flat record used to (de)serialize resources.
///
/// Deserializing goes back through source and constraint parsing, so a
/// record with an invalid source never becomes a resource.
#[derive(Debug, Serialize, Deserialize)]
struct ResourceRecord {
    name: String,
    kind: ResourceKind,
    source: String,
    #[serde(default)]
    base_domain: Option<String>,
    #[serde(default)]
    identifier: Option<String>,
    current_version: String,
    start_line_number: usize,
    source_file: PathBuf,
    #[serde(default)]
    newest_version: Option<String>,
    #[serde(default)]
    status: ResourceStatus,
    #[serde(default)]
    hosting_repository: Option<String>,
    #[serde(default)]
    options: ResourceOptions,
}

impl TryFrom<ResourceRecord> for VersionedResource {
    type Error = Error;

    fn try_from(record: ResourceRecord) -> Result<Self> {
        let mut resource = Self::new(
            record.kind,
            record.name,
            &record.source,
            record.current_version,
            record.source_file,
            record.start_line_number,
        )?;
        resource.newest_version = record.newest_version;
        resource.status = record.status;
        resource.hosting_repository = record.hosting_repository;
        resource.options = record.options;
        Ok(resource)
    }
}

impl From<VersionedResource> for ResourceRecord {
    fn from(resource: VersionedResource) -> Self {
        Self {
            base_domain: resource.source.base_domain().map(str::to_string),
            identifier: Some(resource.source.identifier().to_string()),
            source: resource.source.as_str().to_string(),
            name: resource.name,
            kind: resource.kind,
            current_version: resource.current_version,
            start_line_number: resource.start_line_number,
            source_file: resource.source_file,
            newest_version: resource.newest_version,
            status: resource.status,
            hosting_repository: resource.hosting_repository,
            options: resource.options,
        }
    }
}
