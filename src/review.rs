//! Review-request body.
//!
//! Besides the human-readable tables and release notes, the body carries a
//! hidden snapshot of every resource and its status. The next run reads it
//! back to carry PATCHED over after the upgrade branch was rebased.

use crate::engine::ResourceSet;
use crate::engine::handler::ReleaseNotes;
use anyhow::{Context, Result};
use std::path::Path;
use versionkit::VersionedResource;

/// Title of every review request opened by `sync`.
pub const REQUEST_TITLE: &str = "InfraPatch Module and Provider Update";

const STATE_OPEN: &str = "<!-- infrapatch-state:";
const STATE_CLOSE: &str = " -->";

/// Copy of `resources` with source files relative to `root`.
pub fn snapshot(resources: &ResourceSet, root: &Path) -> ResourceSet {
    resources
        .iter()
        .map(|(provider, resources)| {
            let relative = resources
                .iter()
                .map(|resource| {
                    let path = resource.source_file();
                    let path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
                    resource.clone().with_source_file(path)
                })
                .collect();
            (provider.clone(), relative)
        })
        .collect()
}

/// Render the body: changed resources, release notes and the snapshot.
pub fn render(tables: &[String], notes: &[ReleaseNotes], snapshot: &ResourceSet) -> Result<String> {
    let mut body = String::from("# InfraPatch\n\n");
    if tables.is_empty() {
        body.push_str("No resources were changed by this run.\n\n");
    }
    for table in tables {
        body.push_str(table);
        body.push('\n');
    }

    if !notes.is_empty() {
        body.push_str("## Release Notes\n\n");
        for note in notes {
            body.push_str(&render_release(note));
        }
    }

    // `>` only occurs inside JSON strings, so escaping it keeps `-->` out.
    let state = serde_json::to_string(snapshot)
        .context("Failed to serialize resource snapshot")?
        .replace('>', "\\u003e");
    body.push_str(STATE_OPEN);
    body.push_str(&state);
    body.push_str(STATE_CLOSE);
    body.push('\n');
    Ok(body)
}

fn render_release(note: &ReleaseNotes) -> String {
    let resources = note
        .resources
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let title = note.release.name.as_deref().unwrap_or(&note.release.tag);
    let text = note.release.body.as_deref().unwrap_or("").trim();
    format!(
        "### {} {}\n\nUsed by {resources}.\n\n<details>\n<summary><a href=\"{}\">{title}</a></summary>\n\n{text}\n\n</details>\n\n",
        note.identifier, note.version, note.release.url
    )
}

/// Resources stored in a body, anchored at `root`.
///
/// A body without a snapshot yields no resources.
pub fn parse_snapshot(body: &str, root: &Path) -> Result<Vec<VersionedResource>> {
    let Some(start) = body.find(STATE_OPEN) else {
        log::debug!("Review request has no resource snapshot");
        return Ok(Vec::new());
    };
    let state = &body[start + STATE_OPEN.len()..];
    let end = state
        .find(STATE_CLOSE)
        .context("Unterminated resource snapshot in review request")?;
    let resources: ResourceSet = serde_json::from_str(&state[..end])
        .context("Failed to parse resource snapshot in review request")?;

    Ok(resources
        .into_values()
        .flatten()
        .map(|resource| {
            let path = root.join(resource.source_file());
            resource.with_source_file(path)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::Release;
    use versionkit::ResourceStatus;

    fn patched(root: &Path) -> ResourceSet {
        let mut vpc =
            VersionedResource::module("vpc", "test/vpc/aws", "~>1.0.0", root.join("net/main.tf"), 4)
                .unwrap();
        vpc.resolve(Some("2.1.0")).unwrap();
        vpc.mark_patched();
        ResourceSet::from([("terraform_modules".to_string(), vec![vpc])])
    }

    #[test]
    fn test_snapshot_is_relative() {
        let root = Path::new("/repo/infra");
        let snap = snapshot(&patched(root), root);
        assert_eq!(
            snap["terraform_modules"][0].source_file(),
            Path::new("net/main.tf")
        );
    }

    #[test]
    fn test_body_round_trips_snapshot() {
        let root = Path::new("/repo/infra");
        let tables = ["## Terraform Modules\n".to_string()];
        let body = render(&tables, &[], &snapshot(&patched(root), root)).unwrap();
        assert!(body.contains("## Terraform Modules"));
        assert!(!body.contains("~>"));

        let other_root = Path::new("/checkout/infra");
        let resources = parse_snapshot(&body, other_root).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].status(), ResourceStatus::Patched);
        assert_eq!(resources[0].newest_version(), Some("~>2.1.0"));
        assert_eq!(resources[0].source_file(), other_root.join("net/main.tf"));
    }

    #[test]
    fn test_body_without_snapshot() {
        assert!(parse_snapshot("Manual notes", Path::new("/repo")).unwrap().is_empty());
        assert!(parse_snapshot("<!-- infrapatch-state:{", Path::new("/repo")).is_err());
    }

    #[test]
    fn test_release_section() {
        let note = ReleaseNotes {
            identifier: "test/vpc/aws".to_string(),
            resources: vec!["vpc".to_string(), "vpc_b".to_string()],
            version: "2.1.0".to_string(),
            release: Release {
                name: None,
                tag: "v2.1.0".to_string(),
                body: Some("Bug fixes\n".to_string()),
                url: "https://github.com/test/terraform-aws-vpc/releases/tag/v2.1.0".to_string(),
            },
        };
        let body = render(&[], &[note], &ResourceSet::new()).unwrap();
        assert!(body.contains("No resources were changed by this run."));
        assert!(body.contains("### test/vpc/aws 2.1.0"));
        assert!(body.contains("Used by `vpc`, `vpc_b`."));
        assert!(body.contains(">v2.1.0</a>"));
        assert!(body.ends_with("<!-- infrapatch-state:{} -->\n"));
    }
}
