//! Upgrade engine
//!
//! The [`handler::ProviderHandler`] drives discovery, upgrades and
//! cross-run reconciliation over every enabled provider;
//! [`statistics`] aggregates the outcome.

pub mod handler;
pub mod statistics;

pub use handler::{ProviderHandler, ResourceSet};
