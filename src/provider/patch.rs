//! In-place rewriting of version attributes.
//!
//! The patcher edits the raw text instead of re-serializing the parsed
//! document, so formatting and comments survive untouched.

use crate::error::Error;
use anyhow::Result;
use std::fs;
use std::ops::Range;
use versionkit::VersionedResource;

/// Rewrites the version of one resource in its source file.
pub trait VersionPatcher {
    fn patch(&self, resource: &VersionedResource, version: &str) -> Result<()>;
}

/// Patches the first `version = "..."` directly inside the declaration block.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextPatcher;

impl VersionPatcher for TextPatcher {
    fn patch(&self, resource: &VersionedResource, version: &str) -> Result<()> {
        let path = resource.source_file();
        let address = resource.version_address();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::patch(&address, path, e.to_string()))?;

        let start = line_offset(&content, resource.start_line_number()).ok_or_else(|| {
            Error::patch(
                &address,
                path,
                format!("line {} is past the end of the file", resource.start_line_number()),
            )
        })?;
        let range = version_value_range(&content, start)
            .ok_or_else(|| Error::patch(&address, path, "no version attribute in block"))?;

        let mut patched = String::with_capacity(content.len() + version.len());
        patched.push_str(&content[..range.start]);
        patched.push_str(version);
        patched.push_str(&content[range.end..]);
        fs::write(path, patched).map_err(|e| Error::patch(&address, path, e.to_string()))?;

        log::debug!("Set {address} to '{version}' in {}", path.display());
        Ok(())
    }
}

/// Byte offset of the start of a 1-based line.
fn line_offset(content: &str, line: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    if line == 1 {
        return Some(0);
    }
    content
        .match_indices('\n')
        .nth(line - 2)
        .map(|(index, _)| index + 1)
        .filter(|offset| *offset < content.len())
}

fn is_ident(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

/// Range of the quoted value of the first top-level `version` attribute in
/// the block opening at or after `start`.
fn version_value_range(content: &str, start: usize) -> Option<Range<usize>> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i)?,
            b'#' => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = content[i + 2..].find("*/").map(|end| i + 2 + end + 2)?;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return None;
                }
                i += 1;
            }
            b'v' if depth == 1
                && bytes[i..].starts_with(b"version")
                && (i == 0 || !is_ident(bytes[i - 1]))
                && !bytes.get(i + 7).copied().is_some_and(is_ident) =>
            {
                if let Some(range) = attribute_value(bytes, i + 7) {
                    return Some(range);
                }
                i += 7;
            }
            _ => i += 1,
        }
    }
    None
}

/// `= "value"` after an attribute name; range excludes the quotes.
fn attribute_value(bytes: &[u8], mut i: usize) -> Option<Range<usize>> {
    while bytes.get(i).is_some_and(|b| *b == b' ' || *b == b'\t') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i += 1;
    while bytes.get(i).is_some_and(|b| *b == b' ' || *b == b'\t') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'"') {
        return None;
    }
    let end = skip_string(bytes, i)?;
    Some(i + 1..end - 1)
}

/// Index just past the string literal opening at `i`.
fn skip_string(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return Some(j + 1),
            _ => j += 1,
        }
    }
    None
}

fn skip_line(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |pos| i + pos)
}
