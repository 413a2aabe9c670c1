//! Upgrade statistics and their JSON artifact.

use crate::table::Table;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use versionkit::{ResourceStatus, VersionedResource};

/// File written into the working directory, overwritten on every run.
pub const STATISTICS_FILE: &str = "InfraPatch_Statistics.json";

/// Counts for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderStatistics {
    pub errors: usize,
    pub resources_patched: usize,
    pub resources_pending_update: usize,
    pub total_resources: usize,
    pub resources: Vec<VersionedResource>,
}

impl ProviderStatistics {
    pub fn from_resources(resources: &[VersionedResource]) -> Self {
        let count =
            |status: ResourceStatus| resources.iter().filter(|r| r.status() == status).count();
        Self {
            errors: count(ResourceStatus::PatchError),
            resources_patched: count(ResourceStatus::Patched),
            resources_pending_update: resources.iter().filter(|r| !r.is_up_to_date()).count(),
            total_resources: resources.len(),
            resources: resources.to_vec(),
        }
    }
}

/// Totals over every enabled provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub errors: usize,
    pub resources_patched: usize,
    pub resources_pending_update: usize,
    pub total_resources: usize,
    pub enabled_providers: Vec<String>,
    pub providers: BTreeMap<String, ProviderStatistics>,
}

impl Statistics {
    /// Aggregate `(provider name, resources)` pairs.
    pub fn collect<'a>(
        providers: impl IntoIterator<Item = (&'a str, &'a [VersionedResource])>,
    ) -> Self {
        let mut stats = Self::default();
        for (name, resources) in providers {
            let provider = ProviderStatistics::from_resources(resources);
            stats.errors += provider.errors;
            stats.resources_patched += provider.resources_patched;
            stats.resources_pending_update += provider.resources_pending_update;
            stats.total_resources += provider.total_resources;
            stats.enabled_providers.push(name.to_string());
            stats.providers.insert(name.to_string(), provider);
        }
        stats
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new(
            "Statistics",
            &["Errors", "Patched", "Pending Update", "Total", "Enabled Providers"],
        );
        table.add_row(vec![
            self.errors.to_string(),
            self.resources_patched.to_string(),
            self.resources_pending_update.to_string(),
            self.total_resources.to_string(),
            self.enabled_providers.join(", "),
        ]);
        table
    }

    /// Write the artifact into `dir` and return its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(STATISTICS_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize statistics")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote statistics to {}", path.display());
        Ok(path)
    }
}
