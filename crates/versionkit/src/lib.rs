//! # versionkit
//!
//! Model of versioned Terraform declarations.
//!
//! This crate provides:
//! - [`SourceAddress`]: validated module/provider source locators
//! - [`VersionConstraint`] and [`satisfied`]: the "is this already current?" check
//! - [`DottedVersion`]: numeric ordering of registry versions
//! - [`VersionedResource`]: a declaration plus its resolved status
//! - [`OptionsProcessor`]: per-resource directives read from comments
//!
//! ## Example
//!
//! ```
//! use versionkit::{ResourceStatus, VersionedResource};
//!
//! let mut vpc = VersionedResource::module(
//!     "vpc",
//!     "terraform-aws-modules/vpc/aws",
//!     "~>5.0.0",
//!     "main.tf",
//!     3,
//! ).unwrap();
//!
//! vpc.resolve(Some("5.4.0")).unwrap();
//! assert_eq!(vpc.status(), ResourceStatus::Unpatched);
//! assert_eq!(vpc.newest_version(), Some("~>5.4.0"));
//! ```

#![warn(clippy::all)]

pub mod constraint;
pub mod error;
pub mod options;
pub mod resource;
pub mod source;
pub mod types;
pub mod version;

pub use constraint::{VersionConstraint, satisfied, strip_operator};
pub use error::{Error, ErrorCategory, Result};
pub use options::{CommentOptionsProcessor, OPTIONS_MARKER, OptionsProcessor};
pub use resource::VersionedResource;
pub use source::SourceAddress;
pub use types::{ResourceKind, ResourceOptions, ResourceStatus};
pub use version::DottedVersion;
