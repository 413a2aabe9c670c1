//! Declaration discovery in Terraform files.
//!
//! Files are parsed with `hcl-rs` into a generic JSON-like mapping. Blocks
//! map to nested objects keyed by their labels:
//!
//! ```text
//! module "vpc" { source = "..." }   =>   {"module": {"vpc": {"source": "..."}}}
//! ```
//!
//! The mapping carries no positions, so the start line of each declaration
//! is located in the raw text afterwards.

use crate::error::Error;
use anyhow::Result;
use regex::Regex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use versionkit::ResourceKind;
use walkdir::WalkDir;

/// One module block or required provider with a registry version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub source: String,
    pub version: String,
    pub start_line: usize,
}

/// Turns a declaration file into declarations of one kind.
pub trait DeclarationParser {
    fn parse_file(&self, path: &Path, kind: ResourceKind) -> Result<Vec<Declaration>>;
}

/// `hcl-rs` backed parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct HclParser;

impl DeclarationParser for HclParser {
    fn parse_file(&self, path: &Path, kind: ResourceKind) -> Result<Vec<Declaration>> {
        let content = fs::read_to_string(path).map_err(|e| Error::parse(path, e.to_string()))?;
        let document: Value =
            hcl::from_str(&content).map_err(|e| Error::parse(path, e.to_string()))?;

        let found = match kind {
            ResourceKind::Module => module_fields(&document),
            ResourceKind::Provider => provider_fields(&document),
        };

        let mut declarations = Vec::with_capacity(found.len());
        for (name, source, version) in found {
            let start_line = locate(&content, kind, &name, &source).ok_or_else(|| {
                Error::parse(path, format!("could not find the start line of {kind} '{name}'"))
            })?;
            declarations.push(Declaration {
                name,
                source,
                version,
                start_line,
            });
        }
        log::debug!("Found {} {kind}(s) in {}", declarations.len(), path.display());
        Ok(declarations)
    }
}

/// All `*.tf` files below `root`, sorted, skipping `.terraform` caches.
pub fn find_terraform_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".terraform");
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "tf")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Objects under a key; repeated blocks may come back as an array.
fn objects(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    match value {
        Some(Value::Object(map)) => vec![map],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn module_fields(document: &Value) -> Vec<(String, String, String)> {
    let mut found = Vec::new();
    for modules in objects(document.get("module")) {
        for (name, block) in modules {
            for fields in objects(Some(block)) {
                match (string_field(fields, "source"), string_field(fields, "version")) {
                    (Some(source), Some(version)) => found.push((name.clone(), source, version)),
                    _ => log::debug!("Module '{name}' has no registry source or version, skipping"),
                }
            }
        }
    }
    found
}

fn provider_fields(document: &Value) -> Vec<(String, String, String)> {
    let mut found = Vec::new();
    for terraform in objects(document.get("terraform")) {
        for required in objects(terraform.get("required_providers")) {
            for (name, entry) in required {
                let Some(fields) = entry.as_object() else {
                    log::debug!("Provider '{name}' uses the legacy string syntax, skipping");
                    continue;
                };
                match (string_field(fields, "source"), string_field(fields, "version")) {
                    (Some(source), Some(version)) => found.push((name.clone(), source, version)),
                    _ => log::debug!("Provider '{name}' has no source or version, skipping"),
                }
            }
        }
    }
    found
}

/// 1-based line where a declaration starts.
fn locate(content: &str, kind: ResourceKind, name: &str, source: &str) -> Option<usize> {
    let name = regex::escape(name);
    let pattern = match kind {
        ResourceKind::Module => format!(r#"(?m)^[ \t]*module[ \t]+"{name}"[ \t]*\{{"#),
        ResourceKind::Provider => format!(
            r#"(?m)^[ \t]*"?{name}"?[ \t]*=[ \t]*\{{[^}}]*source\s*=\s*"{}"[^}}]*\}}"#,
            regex::escape(source)
        ),
    };
    let re = Regex::new(&pattern).ok()?;
    let found = re.find(content)?;
    Some(content[..found.start()].matches('\n').count() + 1)
}
