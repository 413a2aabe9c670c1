//! Core types for versioned resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of a versioned resource.
///
/// Only two statuses are reachable from resolution
/// ([`UpToDate`](Self::UpToDate) and [`NoVersionFound`](Self::NoVersionFound));
/// the patch outcomes are recorded by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Newer version available, not applied yet
    #[default]
    Unpatched,
    /// Declared version already satisfies the newest release
    UpToDate,
    /// The declaration was rewritten to the newest version
    Patched,
    /// Rewriting the declaration failed
    PatchError,
    /// The registry returned no usable version
    NoVersionFound,
}

impl ResourceStatus {
    /// Short label used in tables and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unpatched => "unpatched",
            Self::UpToDate => "up_to_date",
            Self::Patched => "patched",
            Self::PatchError => "patch_error",
            Self::NoVersionFound => "no_version_found",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of Terraform declaration a resource was read from.
///
/// The kind is fixed when the resource is discovered and selects the source
/// grammar, the registry capability and the declaration address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// `module "<name>" { ... }` block
    Module,
    /// entry of `terraform { required_providers { ... } }`
    Provider,
}

impl ResourceKind {
    /// Human-readable name, used in commit messages.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Module => "Module",
            Self::Provider => "Provider",
        }
    }

    /// Service name in a registry's discovery document.
    #[must_use]
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Module => "modules.v1",
            Self::Provider => "providers.v1",
        }
    }

    /// Number of `/`-separated segments of a public registry source.
    #[must_use]
    pub fn public_segments(&self) -> usize {
        match self {
            Self::Module => 3,
            Self::Provider => 2,
        }
    }

    /// Address of the version attribute inside a declaration file.
    #[must_use]
    pub fn version_address(&self, name: &str) -> String {
        match self {
            Self::Module => format!("module.{name}.version"),
            Self::Provider => format!("terraform.required_providers.{name}.version"),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => f.write_str("module"),
            Self::Provider => f.write_str("provider"),
        }
    }
}

/// Per-resource directives read from an options comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// Drop the resource from every query and report
    #[serde(default)]
    pub ignore_resource: bool,

    /// Directives without a dedicated field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}
