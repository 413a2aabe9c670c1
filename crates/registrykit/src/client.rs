//! Registry client.
//!
//! Implements the parts of the Terraform registry protocol needed to answer
//! "what is the newest version of this module/provider?":
//!
//! 1. `GET https://<domain>/.well-known/terraform.json` (service discovery)
//! 2. `GET <service>/<identifier>/versions`
//! 3. `GET <service>/<identifier>/<version>` for the canonical source
//!
//! Discovery documents are cached per domain, lookups per fully-qualified
//! identifier. The caches live as long as the client; every lookup can
//! bypass them with `disable_cache`.

use crate::credentials::{Credentials, mask_token};
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::transport::http::UreqTransport;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use versionkit::{DottedVersion, ResourceKind, SourceAddress};

/// Public registry used when a source names no domain.
pub const DEFAULT_REGISTRY_DOMAIN: &str = "registry.terraform.io";

/// Terraform registry client.
pub struct RegistryClient {
    transport: Box<dyn Transport>,
    credentials: Credentials,
    default_domain: String,
    discovery_cache: RefCell<HashMap<String, Value>>,
    version_cache: RefCell<HashMap<String, String>>,
    source_cache: RefCell<HashMap<String, String>>,
}

impl RegistryClient {
    /// Create a client that talks to the network.
    pub fn new(default_domain: impl Into<String>, credentials: Credentials) -> Self {
        Self::with_transport(Box::new(UreqTransport::new()), default_domain, credentials)
    }

    /// Create a client with a custom transport (useful for testing).
    pub fn with_transport(
        transport: Box<dyn Transport>,
        default_domain: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            credentials,
            default_domain: default_domain.into(),
            discovery_cache: RefCell::new(HashMap::new()),
            version_cache: RefCell::new(HashMap::new()),
            source_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Domain queried for sources without an explicit registry.
    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    /// Configured credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Fetch the service discovery document of `domain`.
    pub fn discovery(&self, domain: &str, disable_cache: bool) -> Result<Value> {
        if !disable_cache && let Some(cached) = self.discovery_cache.borrow().get(domain) {
            log::debug!("Registry metadata for '{domain}' already cached");
            return Ok(cached.clone());
        }

        let url = format!("https://{domain}/.well-known/terraform.json");
        let metadata = self.get(&url, domain)?;
        if !metadata.is_object() {
            return Err(Error::InvalidResponse(format!(
                "discovery document of '{domain}' is not an object"
            )));
        }
        self.discovery_cache
            .borrow_mut()
            .insert(domain.to_string(), metadata.clone());
        Ok(metadata)
    }

    /// Base URL of the `kind` service on `domain`, always ending in `/`.
    pub fn service_base(
        &self,
        domain: &str,
        kind: ResourceKind,
        disable_cache: bool,
    ) -> Result<String> {
        let metadata = self.discovery(domain, disable_cache)?;
        let capability = kind.capability();
        let endpoint = metadata
            .get(capability)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingCapability {
                domain: domain.to_string(),
                capability: capability.to_string(),
            })?;

        let mut base = if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
            endpoint.to_string()
        } else {
            format!("https://{domain}/{}", endpoint.trim_start_matches('/'))
        };
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(base)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Newest version the registry lists for `source`.
    ///
    /// Returns `None` when the registry lists no usable version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if the registry does not know the
    /// resource and [`Error::Registry`] for any other failed request.
    pub fn newest_version(
        &self,
        kind: ResourceKind,
        source: &SourceAddress,
        disable_cache: bool,
    ) -> Result<Option<String>> {
        let key = self.cache_key(kind, source);
        if !disable_cache && let Some(cached) = self.version_cache.borrow().get(&key) {
            log::debug!("Cache found for {kind} '{source}'");
            return Ok(Some(cached.clone()));
        }

        let (base, domain) = self.resource_base(kind, source, disable_cache)?;
        let url = format!("{base}/versions");
        log::debug!("Getting versions from {url}");
        let body = self.get(&url, &domain)?;

        let listed = match kind {
            ResourceKind::Module => body
                .get("modules")
                .and_then(|modules| modules.get(0))
                .and_then(|module| module.get("versions")),
            ResourceKind::Provider => body.get("versions"),
        }
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidResponse(format!("no version list in response of {url}")))?;

        let newest = DottedVersion::max_of(
            listed
                .iter()
                .filter_map(|entry| entry.get("version").and_then(Value::as_str)),
        );
        let Some(newest) = newest else {
            log::debug!("No versions found for {kind} '{source}'");
            return Ok(None);
        };

        let newest = newest.as_str().to_string();
        self.version_cache.borrow_mut().insert(key, newest.clone());
        Ok(Some(newest))
    }

    /// Canonical upstream source of `source` at `version`.
    ///
    /// Failures of the lookup itself are not errors and yield `None`; only a
    /// failing service discovery is propagated.
    pub fn source_url(
        &self,
        kind: ResourceKind,
        source: &SourceAddress,
        version: &str,
        disable_cache: bool,
    ) -> Result<Option<String>> {
        let key = self.cache_key(kind, source);
        if !disable_cache && let Some(cached) = self.source_cache.borrow().get(&key) {
            return Ok(Some(cached.clone()));
        }

        let (base, domain) = self.resource_base(kind, source, disable_cache)?;
        let url = format!("{base}/{version}");
        let body = match self.get(&url, &domain) {
            Ok(body) => body,
            Err(e) => {
                log::debug!("Could not get source for '{source}': {e}");
                return Ok(None);
            }
        };
        let Some(upstream) = body.get("source").and_then(Value::as_str) else {
            log::debug!("No source in version details of '{source}'");
            return Ok(None);
        };

        log::debug!("Source for '{source}' is '{upstream}'");
        self.source_cache
            .borrow_mut()
            .insert(key, upstream.to_string());
        Ok(Some(upstream.to_string()))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn domain_for<'a>(&'a self, source: &'a SourceAddress) -> &'a str {
        source.base_domain().unwrap_or(&self.default_domain)
    }

    fn cache_key(&self, kind: ResourceKind, source: &SourceAddress) -> String {
        format!("{kind}:{}/{}", self.domain_for(source), source.identifier())
    }

    fn resource_base(
        &self,
        kind: ResourceKind,
        source: &SourceAddress,
        disable_cache: bool,
    ) -> Result<(String, String)> {
        let domain = self.domain_for(source).to_string();
        let service = self.service_base(&domain, kind, disable_cache)?;
        Ok((format!("{service}{}", source.identifier()), domain))
    }

    fn get(&self, url: &str, domain: &str) -> Result<Value> {
        let token = self.credentials.token(domain);
        match token {
            Some(token) => log::debug!(
                "Found credentials for registry '{domain}', using token: {}",
                mask_token(token)
            ),
            None => log::debug!(
                "No credentials found for registry '{domain}', using unauthenticated request"
            ),
        }
        self.transport.get_json(url, token)
    }
}

/// `owner/repo` of a GitHub-hosted upstream source, if it is one.
///
/// Understands the URL shapes registries report, including
/// `git::`-prefixed, SSH, `.git`-suffixed and subdirectory forms.
pub fn github_repository(source_url: &str) -> Option<String> {
    let lowered = source_url.to_ascii_lowercase();
    let start = lowered.find("github.com")? + "github.com".len();
    let rest = source_url[start..].strip_prefix(['/', ':'])?;

    let mut segments = rest.split(['/', '?', '#']);
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next()?.trim_end_matches(".git");
    if repo.is_empty() {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    const DISCOVERY: &str = "https://registry.terraform.io/.well-known/terraform.json";
    const MODULE_VERSIONS: &str =
        "https://registry.terraform.io/v1/modules/terraform-aws-modules/vpc/aws/versions";
    const PROVIDER_VERSIONS: &str =
        "https://registry.terraform.io/v1/providers/hashicorp/aws/versions";

    fn public_registry() -> MockTransport {
        let mock = MockTransport::new();
        mock.respond(
            DISCOVERY,
            json!({"modules.v1": "/v1/modules/", "providers.v1": "/v1/providers/"}),
        );
        mock.respond(
            MODULE_VERSIONS,
            json!({"modules": [{"versions": [
                {"version": "5.0.0"}, {"version": "5.10.0"}, {"version": "5.9.1"}
            ]}]}),
        );
        mock.respond(
            PROVIDER_VERSIONS,
            json!({"versions": [{"version": "4.67.0"}, {"version": "5.31.0"}]}),
        );
        mock
    }

    fn client(mock: &MockTransport, credentials: Credentials) -> RegistryClient {
        RegistryClient::with_transport(
            Box::new(mock.clone()),
            DEFAULT_REGISTRY_DOMAIN,
            credentials,
        )
    }

    fn module_source(raw: &str) -> SourceAddress {
        SourceAddress::parse(ResourceKind::Module, raw).unwrap()
    }

    #[test]
    fn test_newest_module_version() {
        let mock = public_registry();
        let client = client(&mock, Credentials::new());
        let newest = client
            .newest_version(
                ResourceKind::Module,
                &module_source("terraform-aws-modules/vpc/aws"),
                false,
            )
            .unwrap();
        assert_eq!(newest.as_deref(), Some("5.10.0"));
    }

    #[test]
    fn test_newest_provider_version() {
        let mock = public_registry();
        let client = client(&mock, Credentials::new());
        let source = SourceAddress::parse(ResourceKind::Provider, "hashicorp/aws").unwrap();
        let newest = client
            .newest_version(ResourceKind::Provider, &source, false)
            .unwrap();
        assert_eq!(newest.as_deref(), Some("5.31.0"));
    }

    #[test]
    fn test_caches_are_used_until_disabled() {
        let mock = public_registry();
        let client = client(&mock, Credentials::new());
        let source = module_source("terraform-aws-modules/vpc/aws");

        client.newest_version(ResourceKind::Module, &source, false).unwrap();
        client.newest_version(ResourceKind::Module, &source, false).unwrap();
        assert_eq!(mock.request_count(DISCOVERY), 1);
        assert_eq!(mock.request_count(MODULE_VERSIONS), 1);

        client.newest_version(ResourceKind::Module, &source, true).unwrap();
        assert_eq!(mock.request_count(DISCOVERY), 2);
        assert_eq!(mock.request_count(MODULE_VERSIONS), 2);
    }

    #[test]
    fn test_empty_version_list_is_none() {
        let mock = public_registry();
        mock.respond(MODULE_VERSIONS, json!({"modules": [{"versions": []}]}));
        let client = client(&mock, Credentials::new());
        let newest = client
            .newest_version(
                ResourceKind::Module,
                &module_source("terraform-aws-modules/vpc/aws"),
                false,
            )
            .unwrap();
        assert!(newest.is_none());
    }

    #[test]
    fn test_not_found_and_server_errors() {
        let mock = public_registry();
        let client = client(&mock, Credentials::new());
        let err = client
            .newest_version(ResourceKind::Module, &module_source("nobody/nothing/aws"), false)
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));

        mock.fail(MODULE_VERSIONS, 502);
        let err = client
            .newest_version(
                ResourceKind::Module,
                &module_source("terraform-aws-modules/vpc/aws"),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Registry { status: Some(502), .. }));
    }

    #[test]
    fn test_custom_registry_with_absolute_endpoint_and_token() {
        let mock = MockTransport::new();
        mock.respond(
            "https://example.com/.well-known/terraform.json",
            json!({"modules.v1": "https://api.example.com/modules/v1"}),
        );
        let versions = "https://api.example.com/modules/v1/team/vpc/aws/versions";
        mock.respond(versions, json!({"modules": [{"versions": [{"version": "2.0.0"}]}]}));

        let mut credentials = Credentials::new();
        credentials.insert("example.com", "token-123");
        let client = client(&mock, credentials);

        let newest = client
            .newest_version(
                ResourceKind::Module,
                &module_source("example.com/team/vpc/aws"),
                false,
            )
            .unwrap();
        assert_eq!(newest.as_deref(), Some("2.0.0"));
        assert_eq!(mock.last_token(versions).as_deref(), Some("token-123"));
    }

    #[test]
    fn test_missing_capability() {
        let mock = MockTransport::new();
        mock.respond(DISCOVERY, json!({"modules.v1": "/v1/modules/"}));
        let client = client(&mock, Credentials::new());
        let source = SourceAddress::parse(ResourceKind::Provider, "hashicorp/aws").unwrap();
        let err = client
            .newest_version(ResourceKind::Provider, &source, false)
            .unwrap_err();
        assert!(matches!(err, Error::MissingCapability { .. }));
    }

    #[test]
    fn test_source_url_lookup() {
        let mock = public_registry();
        mock.respond(
            "https://registry.terraform.io/v1/modules/terraform-aws-modules/vpc/aws/5.10.0",
            json!({"source": "https://github.com/terraform-aws-modules/terraform-aws-vpc"}),
        );
        let client = client(&mock, Credentials::new());
        let source = module_source("terraform-aws-modules/vpc/aws");

        let upstream = client
            .source_url(ResourceKind::Module, &source, "5.10.0", false)
            .unwrap();
        assert_eq!(
            upstream.as_deref(),
            Some("https://github.com/terraform-aws-modules/terraform-aws-vpc")
        );

        let missing = client
            .source_url(ResourceKind::Module, &source, "9.9.9", true)
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_github_repository() {
        assert_eq!(
            github_repository("https://github.com/hashicorp/terraform-provider-aws").as_deref(),
            Some("hashicorp/terraform-provider-aws")
        );
        assert_eq!(
            github_repository("git::https://github.com/org/repo.git//modules/x?ref=v1").as_deref(),
            Some("org/repo")
        );
        assert_eq!(
            github_repository("git@github.com:org/repo.git").as_deref(),
            Some("org/repo")
        );
        assert!(github_repository("https://gitlab.com/org/repo").is_none());
        assert!(github_repository("https://github.com/org").is_none());
    }
}
