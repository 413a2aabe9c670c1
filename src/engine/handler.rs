//! Provider handler
//!
//! Aggregates the enabled providers, caches what they discover and applies
//! upgrades one resource at a time. A resource is fully patched (and
//! committed, when a VCS is attached) before the next one is touched.

use super::statistics::Statistics;
use crate::error::Error;
use crate::github::{Release, ReleaseNotesSource};
use crate::progress;
use crate::provider::ResourceProvider;
use crate::table::Table;
use crate::vcs::VersionControl;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use versionkit::{ResourceStatus, VersionedResource};

/// Resources keyed by provider name.
pub type ResourceSet = BTreeMap<String, Vec<VersionedResource>>;

/// Release notes for all patched resources sharing one upstream.
#[derive(Debug, Clone)]
pub struct ReleaseNotes {
    pub identifier: String,
    pub resources: Vec<String>,
    pub version: String,
    pub release: Release,
}

pub struct ProviderHandler {
    providers: Vec<Box<dyn ResourceProvider>>,
    cache: ResourceSet,
    vcs: Option<Rc<dyn VersionControl>>,
    working_dir: PathBuf,
}

impl ProviderHandler {
    pub fn new(providers: Vec<Box<dyn ResourceProvider>>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            providers,
            cache: ResourceSet::new(),
            vcs: None,
            working_dir: working_dir.into(),
        }
    }

    /// Commit every successful patch through `vcs`.
    pub fn with_vcs(mut self, vcs: Rc<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Discover providers missing from the cache (all of them with
    /// `disable_cache`). Ignored resources never enter the cache.
    fn load(&mut self, disable_cache: bool) -> Result<()> {
        for provider in &self.providers {
            if !disable_cache && self.cache.contains_key(provider.name()) {
                continue;
            }
            let (ignored, kept): (Vec<_>, Vec<_>) = provider
                .discover(disable_cache)?
                .into_iter()
                .partition(|resource| resource.options().ignore_resource);
            for resource in &ignored {
                log::debug!(
                    "Ignoring {} '{}' in {}",
                    resource.kind(),
                    resource.name(),
                    resource.source_file().display()
                );
            }
            self.cache.insert(provider.name().to_string(), kept);
        }
        Ok(())
    }

    pub fn get_resources(&mut self, disable_cache: bool) -> Result<&ResourceSet> {
        self.load(disable_cache)?;
        Ok(&self.cache)
    }

    pub fn get_upgradable_resources(&mut self, disable_cache: bool) -> Result<ResourceSet> {
        self.load(disable_cache)?;
        Ok(self
            .cache
            .iter()
            .map(|(name, resources)| {
                let pending: Vec<_> = resources
                    .iter()
                    .filter(|r| !r.is_up_to_date())
                    .cloned()
                    .collect();
                (name.clone(), pending)
            })
            .collect())
    }

    pub fn check_if_upgrades_available(&mut self, disable_cache: bool) -> Result<bool> {
        Ok(self
            .get_upgradable_resources(disable_cache)?
            .values()
            .any(|resources| !resources.is_empty()))
    }

    /// Patch every pending resource. Returns whether any patch was attempted.
    ///
    /// A failed patch marks that resource [`ResourceStatus::PatchError`] and
    /// the batch moves on. VCS failures abort the batch.
    pub fn upgrade_resources(&mut self) -> Result<bool> {
        self.load(false)?;
        let mut attempted = false;

        for provider in &self.providers {
            let Some(resources) = self.cache.get_mut(provider.name()) else {
                continue;
            };
            let pending = resources.iter().filter(|r| !r.is_up_to_date()).count();
            if pending == 0 {
                continue;
            }

            let pb = progress::bar(pending, format!("Upgrading {}", provider.display_name()));
            for resource in resources.iter_mut().filter(|r| !r.is_up_to_date()) {
                attempted = true;
                match provider.patch(resource) {
                    Ok(()) => {
                        resource.mark_patched();
                        if let Some(vcs) = &self.vcs {
                            vcs.stage(resource.source_file())?;
                            vcs.commit(&commit_message(resource))?;
                        }
                    }
                    Err(e) => {
                        log::error!("{e:#}");
                        resource.mark_patch_error();
                    }
                }
                pb.inc(1);
            }
            pb.finish_and_clear();
        }
        Ok(attempted)
    }

    /// Carry PATCHED over from a previous run.
    ///
    /// Each cached resource is matched by identity against `prior`. A single
    /// PATCHED match marks the resource patched; no match leaves it alone.
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousIdentity`] when an identity is not unique in either
    /// set.
    pub fn set_resources_patched_based_on_existing_resources(
        &mut self,
        prior: &[VersionedResource],
    ) -> Result<()> {
        self.load(false)?;
        for resources in self.cache.values_mut() {
            for index in 0..resources.len() {
                let current = &resources[index];
                let twins = resources.iter().filter(|r| r.same_identity(current)).count();
                let matches = current.find(prior);

                match matches.as_slice() {
                    [] => log::debug!(
                        "{} '{}' was not part of the previous run",
                        current.kind(),
                        current.name()
                    ),
                    [previous] if twins == 1 => {
                        if previous.status() == ResourceStatus::Patched {
                            log::debug!(
                                "{} '{}' was patched before",
                                current.kind(),
                                current.name()
                            );
                            resources[index].mark_patched();
                        }
                    }
                    _ => {
                        return Err(Error::AmbiguousIdentity {
                            name: current.name().to_string(),
                            source_address: current.source().to_string(),
                            path: current.source_file().to_path_buf(),
                            count: matches.len().max(twins),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get_patched_resources(&self) -> Vec<&VersionedResource> {
        self.cache
            .values()
            .flatten()
            .filter(|r| r.status() == ResourceStatus::Patched)
            .collect()
    }

    /// One table per provider, restricted to resources or to pending ones.
    pub fn resource_tables(&mut self, only_upgradable: bool) -> Result<Vec<Table>> {
        self.load(false)?;
        Ok(self
            .providers
            .iter()
            .map(|provider| {
                let resources: Vec<_> = self
                    .cache
                    .get(provider.name())
                    .into_iter()
                    .flatten()
                    .filter(|r| !only_upgradable || !r.is_up_to_date())
                    .cloned()
                    .collect();
                provider.report(&resources)
            })
            .collect())
    }

    /// Markdown tables of resources this run changed (patched or failed).
    pub fn changed_resources_markdown(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter_map(|provider| {
                let changed: Vec<_> = self
                    .cache
                    .get(provider.name())?
                    .iter()
                    .filter(|r| {
                        matches!(r.status(), ResourceStatus::Patched | ResourceStatus::PatchError)
                    })
                    .cloned()
                    .collect();
                (!changed.is_empty()).then(|| provider.report(&changed).to_markdown())
            })
            .collect()
    }

    /// Release notes of the patched resources, one entry per upstream.
    ///
    /// Lookup failures are logged; notes are informational.
    pub fn get_release_notes(&self, source: &dyn ReleaseNotesSource) -> Vec<ReleaseNotes> {
        let mut groups: BTreeMap<&str, Vec<&VersionedResource>> = BTreeMap::new();
        for resource in self.get_patched_resources() {
            if resource.hosting_repository().is_none() {
                continue;
            }
            groups
                .entry(resource.source().identifier())
                .or_default()
                .push(resource);
        }

        let mut notes = Vec::new();
        for (identifier, resources) in groups {
            let first = resources[0];
            let (Some(repository), Some(version)) =
                (first.hosting_repository(), first.newest_version_base())
            else {
                continue;
            };
            match source.release(repository, version) {
                Ok(Some(release)) => notes.push(ReleaseNotes {
                    identifier: identifier.to_string(),
                    resources: resources.iter().map(|r| r.name().to_string()).collect(),
                    version: version.to_string(),
                    release,
                }),
                Ok(None) => log::debug!("No release notes for {repository} {version}"),
                Err(e) => log::warn!("Could not fetch release notes for {repository}: {e:#}"),
            }
        }
        notes
    }

    pub fn statistics(&mut self, disable_cache: bool) -> Result<Statistics> {
        self.load(disable_cache)?;
        Ok(self.cached_statistics())
    }

    fn cached_statistics(&self) -> Statistics {
        Statistics::collect(self.providers.iter().map(|provider| {
            let resources = self
                .cache
                .get(provider.name())
                .map_or(&[][..], Vec::as_slice);
            (provider.name(), resources)
        }))
    }

    /// Write the statistics artifact into the working directory.
    pub fn dump_statistics(&mut self, disable_cache: bool) -> Result<PathBuf> {
        self.statistics(disable_cache)?.write(&self.working_dir)
    }

    /// Print one table per provider followed by the statistics.
    pub fn print_resource_table(&mut self, only_upgradable: bool) -> Result<()> {
        for table in self.resource_tables(only_upgradable)? {
            if !only_upgradable || !table.is_empty() {
                println!("{}", table.render());
            }
        }
        println!("{}", self.cached_statistics().table().render());
        Ok(())
    }
}

/// Commit message for one upgraded resource.
pub fn commit_message(resource: &VersionedResource) -> String {
    format!(
        "Bump {} '{}' from version '{}' to '{}'.",
        resource.kind().display_name(),
        resource.name(),
        resource.current_version(),
        resource.newest_version().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TerraformProvider;
    use crate::provider::patch::VersionPatcher;
    use crate::provider::terraform::tests::{registry, write_project};
    use crate::vcs::tests::RecordingVcs;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;
    use versionkit::ResourceKind;

    struct FailingPatcher;

    impl VersionPatcher for FailingPatcher {
        fn patch(&self, resource: &VersionedResource, _version: &str) -> Result<()> {
            Err(
                Error::patch(resource.version_address(), resource.source_file(), "read-only")
                    .into(),
            )
        }
    }

    fn handler(root: &Path, module_newest: &str, provider_newest: &str) -> ProviderHandler {
        let (_mock, registry) = registry(module_newest, provider_newest);
        let providers = TerraformProvider::all(root, &registry)
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn ResourceProvider>)
            .collect();
        ProviderHandler::new(providers, root)
    }

    fn names(set: &ResourceSet) -> Vec<String> {
        set.values().flatten().map(|r| r.name().to_string()).collect()
    }

    #[test]
    fn test_end_to_end_upgrade() {
        let dir = TempDir::new().unwrap();
        let file = write_project(dir.path(), "1.0.0", "2.0.0");
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0");

        let upgradable = handler.get_upgradable_resources(false).unwrap();
        assert_eq!(names(&upgradable), vec!["vpc"]);
        assert!(handler.check_if_upgrades_available(false).unwrap());

        assert!(handler.upgrade_resources().unwrap());
        let stats = handler.statistics(false).unwrap();
        assert_eq!(stats.resources_patched, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.total_resources, 2);
        assert_eq!(stats.resources_pending_update, 0);

        let content = fs::read_to_string(file).unwrap();
        assert!(content.contains("version = \"2.0.0\"\n}"));
        assert!(!handler.check_if_upgrades_available(false).unwrap());
    }

    #[test]
    fn test_second_upgrade_patches_nothing() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "2.0.0");
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0");

        assert!(handler.upgrade_resources().unwrap());
        assert!(!handler.upgrade_resources().unwrap());
        assert_eq!(handler.get_patched_resources().len(), 1);
    }

    #[test]
    fn test_ignored_resources_are_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("main.tf"),
            "# infrapatch_options: ignore_resource=true\nmodule \"vpc\" {\n  source  = \"test/vpc/aws\"\n  version = \"1.0.0\"\n}\n",
        )
        .unwrap();
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0");

        assert!(names(handler.get_resources(false).unwrap()).is_empty());
        assert!(names(&handler.get_upgradable_resources(true).unwrap()).is_empty());
        assert!(!handler.upgrade_resources().unwrap());
        for table in handler.resource_tables(false).unwrap() {
            assert!(table.is_empty());
        }
        assert_eq!(handler.statistics(true).unwrap().total_resources, 0);
    }

    #[test]
    fn test_patch_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "2.0.0");
        let (_mock, registry) = registry("2.0.0", "3.0.0");
        let providers: Vec<Box<dyn ResourceProvider>> = vec![
            Box::new(
                TerraformProvider::new(ResourceKind::Module, dir.path(), Rc::clone(&registry))
                    .with_patcher(Box::new(FailingPatcher)),
            ),
            Box::new(TerraformProvider::new(ResourceKind::Provider, dir.path(), registry)),
        ];
        let mut handler = ProviderHandler::new(providers, dir.path());

        assert!(handler.upgrade_resources().unwrap());
        let stats = handler.statistics(false).unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.resources_patched, 1);
        assert_eq!(stats.resources_pending_update, 1);
        assert_eq!(handler.changed_resources_markdown().len(), 2);
    }

    #[test]
    fn test_commit_per_resource() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "1.0.0");
        let vcs = Rc::new(RecordingVcs::default());
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0").with_vcs(vcs.clone());

        handler.upgrade_resources().unwrap();
        assert_eq!(
            vcs.calls(),
            vec![
                "add main.tf",
                "commit Bump Module 'vpc' from version '1.0.0' to '2.0.0'.",
                "add main.tf",
                "commit Bump Provider 'aws' from version '1.0.0' to '2.0.0'.",
            ]
        );
    }

    #[test]
    fn test_reconcile_marks_prior_patched() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "2.0.0");
        let mut previous = handler(dir.path(), "2.0.0", "2.0.0");
        previous.upgrade_resources().unwrap();
        let prior: Vec<_> = previous
            .get_resources(false)
            .unwrap()
            .values()
            .flatten()
            .cloned()
            .collect();

        // Rebased branch: the file is back at the old version.
        write_project(dir.path(), "1.0.0", "2.0.0");
        let mut current = handler(dir.path(), "2.0.0", "2.0.0");
        current.set_resources_patched_based_on_existing_resources(&prior).unwrap();

        assert_eq!(current.get_patched_resources().len(), 1);
        assert!(!current.check_if_upgrades_available(false).unwrap());
        assert!(!current.upgrade_resources().unwrap());
    }

    #[test]
    fn test_reconcile_without_matches_is_noop() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "2.0.0");
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0");
        handler.set_resources_patched_based_on_existing_resources(&[]).unwrap();
        assert!(handler.get_patched_resources().is_empty());
    }

    #[test]
    fn test_reconcile_duplicate_identity_is_ambiguous() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.tf");
        fs::write(
            &file,
            "module \"vpc\" {\n  source  = \"test/vpc/aws\"\n  version = \"1.0.0\"\n}\n\nmodule \"vpc\" {\n  source  = \"test/vpc/aws\"\n  version = \"1.0.0\"\n}\n",
        )
        .unwrap();

        let mut prior =
            VersionedResource::module("vpc", "test/vpc/aws", "1.0.0", &file, 1).unwrap();
        prior.resolve(Some("2.0.0")).unwrap();
        prior.mark_patched();

        let mut cache = ResourceSet::new();
        let twin = VersionedResource::module("vpc", "test/vpc/aws", "1.0.0", &file, 6).unwrap();
        cache.insert(
            "terraform_modules".to_string(),
            vec![twin.clone(), twin],
        );
        let mut handler = ProviderHandler::new(Vec::new(), dir.path());
        handler.cache = cache;

        let err = handler
            .set_resources_patched_based_on_existing_resources(&[prior])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::AmbiguousIdentity { count: 2, .. })
        ));
    }

    #[test]
    fn test_reconcile_duplicate_prior_is_ambiguous() {
        let dir = TempDir::new().unwrap();
        let file = write_project(dir.path(), "1.0.0", "2.0.0");
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0");

        let prior = VersionedResource::module("vpc", "test/vpc/aws", "1.0.0", &file, 10).unwrap();
        let err = handler
            .set_resources_patched_based_on_existing_resources(&[prior.clone(), prior])
            .unwrap_err();
        assert!(err.downcast_ref::<Error>().is_some());
    }

    struct FakeReleases {
        asked: RefCell<Vec<String>>,
    }

    impl ReleaseNotesSource for FakeReleases {
        fn release(&self, repository: &str, version: &str) -> Result<Option<Release>> {
            self.asked.borrow_mut().push(format!("{repository}@{version}"));
            Ok(Some(Release {
                name: Some(format!("v{version}")),
                tag: format!("v{version}"),
                body: Some("Fixes".to_string()),
                url: format!("https://github.com/{repository}/releases/tag/v{version}"),
            }))
        }
    }

    #[test]
    fn test_release_notes_for_patched_resources() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "1.0.0");
        let mut handler = handler(dir.path(), "2.0.0", "2.0.0");
        handler.upgrade_resources().unwrap();

        let releases = FakeReleases { asked: RefCell::new(Vec::new()) };
        let notes = handler.get_release_notes(&releases);

        // Only the module has a hosting repository in the registry mock.
        assert_eq!(*releases.asked.borrow(), vec!["test/terraform-aws-vpc@2.0.0"]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].identifier, "test/vpc/aws");
        assert_eq!(notes[0].resources, vec!["vpc"]);
    }
}
