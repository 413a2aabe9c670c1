//! Per-resource directives from declaration comments
//!
//! A directive comment sits on the line directly above a declaration:
//!
//! ```hcl
//! # infrapatch_options: ignore_resource=true
//! module "vpc" {
//!   source  = "terraform-aws-modules/vpc/aws"
//!   version = "5.1.0"
//! }
//! ```

use crate::error::{Error, Result};
use crate::resource::VersionedResource;
use crate::types::ResourceOptions;
use std::fs;

/// Marker introducing a directive list in a comment.
pub const OPTIONS_MARKER: &str = "infrapatch_options:";

/// Attaches options to freshly discovered resources.
pub trait OptionsProcessor {
    /// Read the directives for `resource` and store them on it.
    fn process(&self, resource: &mut VersionedResource) -> Result<()>;
}

/// Reads directives from the comment line preceding a declaration.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentOptionsProcessor;

impl OptionsProcessor for CommentOptionsProcessor {
    fn process(&self, resource: &mut VersionedResource) -> Result<()> {
        let line = resource.start_line_number();
        if line == 0 {
            return Err(Error::InvalidLineNumber {
                name: resource.name().to_string(),
                line,
            });
        }
        if line == 1 {
            return Ok(());
        }

        let content = fs::read_to_string(resource.source_file())
            .map_err(|e| Error::io(resource.source_file(), e))?;
        let Some(previous) = content.lines().nth(line - 2) else {
            return Ok(());
        };

        if let Some(options) = parse_directives(resource.name(), previous)? {
            log::debug!(
                "Options for {} '{}': {:?}",
                resource.kind(),
                resource.name(),
                options
            );
            resource.set_options(options);
        }
        Ok(())
    }
}

/// Parse a directive line; `None` if the line carries no marker.
pub fn parse_directives(name: &str, line: &str) -> Result<Option<ResourceOptions>> {
    let Some(index) = line.find(OPTIONS_MARKER) else {
        return Ok(None);
    };

    let mut options = ResourceOptions::default();
    let list = &line[index + OPTIONS_MARKER.len()..];
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let invalid = || Error::InvalidOption {
            name: name.to_string(),
            option: item.to_string(),
        };
        let (key, value) = item.split_once('=').ok_or_else(invalid)?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(invalid());
        }

        match key {
            "ignore_resource" => {
                options.ignore_resource = parse_bool(value).ok_or_else(invalid)?;
            }
            _ => {
                options.extra.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(Some(options))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
