//! Resource providers.
//!
//! A provider owns one kind of declaration: it knows how to find them in a
//! project, how to resolve their newest versions and how to patch them.

pub mod hcl;
pub mod patch;
pub mod terraform;

use crate::table::Table;
use anyhow::Result;
use versionkit::VersionedResource;

pub use terraform::TerraformProvider;

pub trait ResourceProvider {
    /// Stable identifier, used as key in statistics and snapshots.
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Find, resolve and annotate every resource in the project.
    ///
    /// Any parse or registry failure aborts the whole discovery.
    fn discover(&self, disable_cache: bool) -> Result<Vec<VersionedResource>>;

    /// Rewrite the resource's version to its newest one.
    ///
    /// Does not touch the resource's status; the caller records the outcome.
    fn patch(&self, resource: &VersionedResource) -> Result<()>;

    /// Tabular view of `resources`.
    fn report(&self, resources: &[VersionedResource]) -> Table;
}
