//! # registrykit
//!
//! Blocking client for Terraform module and provider registries.
//!
//! This crate provides:
//! - service discovery through `/.well-known/terraform.json`
//! - newest-version lookups, ordered numerically
//! - canonical source lookups, for correlating release notes
//! - per-domain bearer tokens ([`Credentials`])
//!
//! ## Example
//!
//! ```
//! use registrykit::transport::MockTransport;
//! use registrykit::{Credentials, RegistryClient};
//! use serde_json::json;
//! use versionkit::{ResourceKind, SourceAddress};
//!
//! let mock = MockTransport::new();
//! mock.respond(
//!     "https://registry.terraform.io/.well-known/terraform.json",
//!     json!({"providers.v1": "/v1/providers/"}),
//! );
//! mock.respond(
//!     "https://registry.terraform.io/v1/providers/hashicorp/aws/versions",
//!     json!({"versions": [{"version": "5.0.0"}, {"version": "5.1.0"}]}),
//! );
//!
//! let client = RegistryClient::with_transport(
//!     Box::new(mock),
//!     "registry.terraform.io",
//!     Credentials::new(),
//! );
//! let source = SourceAddress::parse(ResourceKind::Provider, "hashicorp/aws").unwrap();
//! let newest = client.newest_version(ResourceKind::Provider, &source, false).unwrap();
//! assert_eq!(newest.as_deref(), Some("5.1.0"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Registry protocol client.
pub mod client;
/// Per-domain tokens.
pub mod credentials;
/// Error types for registry operations.
pub mod error;
/// HTTP transports.
pub mod transport;

pub use client::{DEFAULT_REGISTRY_DOMAIN, RegistryClient, github_repository};
pub use credentials::{Credentials, mask_token};
pub use error::{Error, ErrorCategory, Result};
