//! Registry credentials and path helpers.
//!
//! Credentials are merged from the Terraform CLI config, a JSON file and
//! (for `sync`) a secret string. Later sources override earlier ones.

use anyhow::{Context, Result, bail};
use registrykit::Credentials;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Credentials file picked up from the current directory.
pub const CREDENTIALS_FILE: &str = "infrapatch_credentials.json";

/// Location of the Terraform CLI config file.
pub fn terraformrc_path() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::data_dir().map(|dir| dir.join("terraform.rc"))
    } else {
        dirs::home_dir().map(|home| home.join(".terraformrc"))
    }
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

/// Tokens of `credentials "<domain>" { token = "..." }` blocks.
///
/// Missing or malformed files are logged and yield no credentials.
pub fn terraformrc_credentials(path: &Path) -> Credentials {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::debug!("Not reading {}: {e}", path.display());
            return Credentials::new();
        }
    };
    let config: Value = match hcl::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Could not parse {}: {e}", path.display());
            return Credentials::new();
        }
    };

    let Some(blocks) = config.get("credentials").and_then(Value::as_object) else {
        return Credentials::new();
    };
    blocks
        .iter()
        .filter_map(|(domain, block)| {
            let token = block.get("token").and_then(Value::as_str)?;
            Some((domain.clone(), token.to_string()))
        })
        .collect()
}

/// `{ "<domain>": "<token>" }` object file.
pub fn json_credentials(path: &Path) -> Result<Credentials> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read credentials file {}", path.display()))?;
    let tokens: BTreeMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid credentials file {}", path.display()))?;
    Ok(tokens.into_iter().collect())
}

/// Newline-separated `domain=token` lines.
pub fn secret_string_credentials(secret: &str) -> Result<Credentials> {
    let mut credentials = Credentials::new();
    for (index, line) in secret.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((domain, token)) = line.split_once('=') else {
            bail!("Line {} of the registry secret string is not 'domain=token'", index + 1);
        };
        credentials.insert(domain.trim(), token.trim());
    }
    Ok(credentials)
}

/// Merge every credential source, later sources winning.
pub fn load_credentials(file: Option<&Path>, secret: Option<&str>) -> Result<Credentials> {
    let mut credentials = terraformrc_path()
        .map(|path| terraformrc_credentials(&path))
        .unwrap_or_default();

    let default_file = Path::new(CREDENTIALS_FILE);
    let file = file.or_else(|| default_file.is_file().then_some(default_file));
    if let Some(path) = file {
        credentials.merge(json_credentials(path)?);
    }
    if let Some(secret) = secret.filter(|s| !s.trim().is_empty()) {
        credentials.merge(secret_string_credentials(secret)?);
    }

    log::debug!("Registry credentials: {credentials:?}");
    Ok(credentials)
}
