//! Blocking HTTP transport backed by `ureq`.

use super::Transport;
use crate::error::{Error, Result};
use serde_json::Value;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("infrapatch/", env!("CARGO_PKG_VERSION"));

/// Real network transport.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with default agent settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value> {
        let mut request = self
            .agent
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let mut response = request
            .call()
            .map_err(|e| Error::from_transport(url, e))?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| Error::InvalidResponse(format!("{url}: {e}")))
    }
}
