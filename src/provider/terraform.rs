//! Terraform module and provider declarations.

use super::ResourceProvider;
use super::hcl::{DeclarationParser, HclParser, find_terraform_files};
use super::patch::{TextPatcher, VersionPatcher};
use crate::progress;
use crate::table::Table;
use anyhow::{Context, Result};
use registrykit::{RegistryClient, github_repository};
use std::path::PathBuf;
use std::rc::Rc;
use versionkit::{CommentOptionsProcessor, OptionsProcessor, ResourceKind, VersionedResource};

/// Provider for one Terraform resource kind.
pub struct TerraformProvider {
    kind: ResourceKind,
    project_root: PathBuf,
    registry: Rc<RegistryClient>,
    parser: Box<dyn DeclarationParser>,
    patcher: Box<dyn VersionPatcher>,
    options: Box<dyn OptionsProcessor>,
}

impl TerraformProvider {
    pub fn new(
        kind: ResourceKind,
        project_root: impl Into<PathBuf>,
        registry: Rc<RegistryClient>,
    ) -> Self {
        Self {
            kind,
            project_root: project_root.into(),
            registry,
            parser: Box::new(HclParser),
            patcher: Box::new(TextPatcher),
            options: Box::new(CommentOptionsProcessor),
        }
    }

    /// Modules and providers of `project_root`, in report order.
    pub fn all(project_root: impl Into<PathBuf>, registry: &Rc<RegistryClient>) -> Vec<Self> {
        let root = project_root.into();
        vec![
            Self::new(ResourceKind::Module, &root, Rc::clone(registry)),
            Self::new(ResourceKind::Provider, root, Rc::clone(registry)),
        ]
    }

    /// Replace the patch collaborator.
    #[cfg(test)]
    pub fn with_patcher(mut self, patcher: Box<dyn VersionPatcher>) -> Self {
        self.patcher = patcher;
        self
    }

    /// Ask the registry for the newest version and the hosting repository.
    fn resolve(&self, resource: &mut VersionedResource, disable_cache: bool) -> Result<()> {
        let newest = self
            .registry
            .newest_version(self.kind, resource.source(), disable_cache)
            .with_context(|| format!("Failed to resolve {} '{}'", self.kind, resource.name()))?;
        resource.resolve(newest.as_deref())?;

        if let Some(version) = newest {
            let upstream =
                self.registry
                    .source_url(self.kind, resource.source(), &version, disable_cache)?;
            resource.set_hosting_repository(upstream.as_deref().and_then(github_repository));
        }
        Ok(())
    }
}

impl ResourceProvider for TerraformProvider {
    fn name(&self) -> &'static str {
        match self.kind {
            ResourceKind::Module => "terraform_modules",
            ResourceKind::Provider => "terraform_providers",
        }
    }

    fn display_name(&self) -> &'static str {
        match self.kind {
            ResourceKind::Module => "Terraform Modules",
            ResourceKind::Provider => "Terraform Providers",
        }
    }

    fn discover(&self, disable_cache: bool) -> Result<Vec<VersionedResource>> {
        log::info!("Searching for .tf files in {} ...", self.project_root.display());
        let files = find_terraform_files(&self.project_root)?;

        let mut resources = Vec::new();
        let pb = progress::bar(
            files.len(),
            format!("Parsing .tf files for {}", self.display_name()),
        );
        for file in &files {
            for declaration in self.parser.parse_file(file, self.kind)? {
                resources.push(VersionedResource::new(
                    self.kind,
                    declaration.name,
                    &declaration.source,
                    declaration.version,
                    file,
                    declaration.start_line,
                )?);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        let pb = progress::bar(resources.len(), format!("Resolving {}", self.display_name()));
        for resource in &mut resources {
            self.options.process(resource)?;
            if resource.options().ignore_resource {
                log::debug!("Not resolving ignored {} '{}'", self.kind, resource.name());
            } else {
                self.resolve(resource, disable_cache)?;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(resources)
    }

    fn patch(&self, resource: &VersionedResource) -> Result<()> {
        if resource.constraint_satisfied() {
            log::debug!("{} '{}' is already up to date", self.kind, resource.name());
            return Ok(());
        }
        let version = resource
            .newest_version()
            .context("newest version is not resolved")?;
        self.patcher.patch(resource, version)
    }

    fn report(&self, resources: &[VersionedResource]) -> Table {
        let mut table = Table::new(
            self.display_name(),
            &["Name", "Source", "Current", "Newest", "Upgradeable"],
        );
        for resource in resources {
            table.add_row(vec![
                resource.name().to_string(),
                resource.source().to_string(),
                resource.current_version().to_string(),
                resource.newest_version().unwrap_or("-").to_string(),
                (!resource.is_up_to_date()).to_string(),
            ]);
        }
        table
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use registrykit::Credentials;
    use registrykit::transport::MockTransport;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    pub const REGISTRY: &str = "https://registry.terraform.io";

    /// Public registry mock knowing one module and one provider.
    pub fn registry(
        module_newest: &str,
        provider_newest: &str,
    ) -> (MockTransport, Rc<RegistryClient>) {
        let mock = MockTransport::new();
        mock.respond(
            format!("{REGISTRY}/.well-known/terraform.json"),
            json!({"modules.v1": "/v1/modules/", "providers.v1": "/v1/providers/"}),
        );
        mock.respond(
            format!("{REGISTRY}/v1/modules/test/vpc/aws/versions"),
            json!({"modules": [{"versions": [{"version": "1.0.0"}, {"version": module_newest}]}]}),
        );
        mock.respond(
            format!("{REGISTRY}/v1/modules/test/vpc/aws/{module_newest}"),
            json!({"source": "https://github.com/test/terraform-aws-vpc"}),
        );
        mock.respond(
            format!("{REGISTRY}/v1/providers/hashicorp/aws/versions"),
            json!({"versions": [{"version": provider_newest}]}),
        );
        let client = RegistryClient::with_transport(
            Box::new(mock.clone()),
            "registry.terraform.io",
            Credentials::new(),
        );
        (mock, Rc::new(client))
    }

    pub fn write_project(root: &Path, module_version: &str, provider_version: &str) -> PathBuf {
        let file = root.join("main.tf");
        fs::write(
            &file,
            format!(
                "terraform {{\n  required_providers {{\n    aws = {{\n      source  = \"hashicorp/aws\"\n      version = \"{provider_version}\"\n    }}\n  }}\n}}\n\nmodule \"vpc\" {{\n  source  = \"test/vpc/aws\"\n  version = \"{module_version}\"\n}}\n"
            ),
        )
        .unwrap();
        file
    }

    #[test]
    fn test_discover_resolves_modules() {
        let dir = TempDir::new().unwrap();
        let file = write_project(dir.path(), "1.0.0", "2.0.0");
        let (_mock, registry) = registry("2.0.0", "2.0.0");

        let provider = TerraformProvider::new(ResourceKind::Module, dir.path(), registry);
        let modules = provider.discover(false).unwrap();
        assert_eq!(modules.len(), 1);
        let vpc = &modules[0];
        assert_eq!(vpc.name(), "vpc");
        assert_eq!(vpc.source_file(), file.as_path());
        assert_eq!(vpc.start_line_number(), 10);
        assert_eq!(vpc.newest_version(), Some("2.0.0"));
        assert_eq!(vpc.hosting_repository(), Some("test/terraform-aws-vpc"));
        assert!(!vpc.is_up_to_date());
    }

    #[test]
    fn test_discover_aborts_on_registry_error() {
        let dir = TempDir::new().unwrap();
        write_project(dir.path(), "1.0.0", "2.0.0");
        let (mock, registry) = registry("2.0.0", "2.0.0");
        mock.fail(format!("{REGISTRY}/v1/providers/hashicorp/aws/versions"), 500);

        let provider = TerraformProvider::new(ResourceKind::Provider, dir.path(), registry);
        assert!(provider.discover(false).is_err());
    }

    #[test]
    fn test_ignored_resource_is_not_resolved() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.tf");
        fs::write(
            &file,
            "# infrapatch_options: ignore_resource=true\nmodule \"vpc\" {\n  source  = \"test/vpc/aws\"\n  version = \"1.0.0\"\n}\n",
        )
        .unwrap();
        let (mock, registry) = registry("2.0.0", "2.0.0");
        mock.fail(format!("{REGISTRY}/v1/modules/test/vpc/aws/versions"), 404);

        let provider = TerraformProvider::new(ResourceKind::Module, dir.path(), registry);
        let modules = provider.discover(false).unwrap();
        assert_eq!(modules.len(), 1);
        assert!(modules[0].options().ignore_resource);
        assert_eq!(modules[0].newest_version(), None);
        let versions = format!("{REGISTRY}/v1/modules/test/vpc/aws/versions");
        assert_eq!(mock.request_count(&versions), 0);
    }

    #[test]
    fn test_patch_and_report() {
        let dir = TempDir::new().unwrap();
        let file = write_project(dir.path(), "1.0.0", "2.0.0");
        let (_mock, registry) = registry("2.0.0", "2.0.0");

        let provider = TerraformProvider::new(ResourceKind::Module, dir.path(), registry);
        let modules = provider.discover(false).unwrap();
        provider.patch(&modules[0]).unwrap();
        assert!(fs::read_to_string(&file).unwrap().contains("version = \"2.0.0\""));

        let table = provider.report(&modules);
        assert_eq!(table.title, "Terraform Modules");
        assert_eq!(
            table.rows[0],
            vec!["vpc", "test/vpc/aws", "1.0.0", "2.0.0", "true"]
        );
    }
}
