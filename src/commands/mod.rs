//! Subcommand entry points.

pub mod report;
pub mod sync;
pub mod upgrade;

use crate::Context;
use crate::config;
use crate::engine::ProviderHandler;
use crate::provider::{ResourceProvider, TerraformProvider};
use anyhow::{Context as _, Result, bail};
use registrykit::RegistryClient;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Registry client with every configured credential.
fn registry(ctx: &Context, secret: Option<&str>) -> Result<Rc<RegistryClient>> {
    let credentials = config::load_credentials(ctx.credentials_file.as_deref(), secret)?;
    Ok(Rc::new(RegistryClient::new(
        ctx.default_registry_domain.clone(),
        credentials,
    )))
}

/// Absolute form of a directory given on the command line.
///
/// Resource paths and git commands are both derived from it, so they agree
/// whatever the current directory is.
fn resolve_root(path: &Path) -> Result<PathBuf> {
    let resolved = fs::canonicalize(path)
        .with_context(|| format!("Could not resolve directory {}", path.display()))?;
    if !resolved.is_dir() {
        bail!("{} is not a directory", path.display());
    }
    Ok(resolved)
}

/// Handler over the module and provider declarations of `project_root`.
fn handler(project_root: &Path, registry: &Rc<RegistryClient>) -> Result<ProviderHandler> {
    let providers = TerraformProvider::all(project_root, registry)
        .into_iter()
        .map(|provider| Box::new(provider) as Box<dyn ResourceProvider>)
        .collect();
    Ok(ProviderHandler::new(providers, working_dir()?))
}

fn working_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Could not determine the current directory")
}
