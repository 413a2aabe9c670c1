//! HTTP transports for registry requests.
//!
//! [`Transport`] is the only place where the client touches the network.
//! [`http::UreqTransport`] is the real implementation; [`MockTransport`]
//! answers from an in-memory table and counts requests:
//!
//! ```
//! use registrykit::transport::{MockTransport, Transport};
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.respond("https://example.com/ping", json!({"ok": true}));
//!
//! let body = mock.get_json("https://example.com/ping", None).unwrap();
//! assert_eq!(body["ok"], true);
//! assert_eq!(mock.request_count("https://example.com/ping"), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Blocking JSON GET.
pub trait Transport {
    /// Fetch `url` and decode the body as JSON.
    ///
    /// `token` is sent as a bearer token when present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] for HTTP 404 and
    /// [`Error::Registry`] for any other failure.
    fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value>;
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, Value>,
    statuses: HashMap<String, u16>,
    requests: Vec<(String, Option<String>)>,
}

/// In-memory transport for tests.
///
/// Clones share their state, so a test can keep a handle after moving a
/// clone into a client. Unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl MockTransport {
    /// Create an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `body`.
    pub fn respond(&self, url: impl Into<String>, body: Value) {
        self.state.borrow_mut().responses.insert(url.into(), body);
    }

    /// Answer `url` with an HTTP error status.
    pub fn fail(&self, url: impl Into<String>, status: u16) {
        self.state.borrow_mut().statuses.insert(url.into(), status);
    }

    /// Number of requests made for `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|(requested, _)| requested == url)
            .count()
    }

    /// Total number of requests made.
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.state.borrow().requests.len()
    }

    /// Token sent with the most recent request for `url`.
    #[must_use]
    pub fn last_token(&self, url: &str) -> Option<String> {
        self.state
            .borrow()
            .requests
            .iter()
            .rev()
            .find(|(requested, _)| requested == url)
            .and_then(|(_, token)| token.clone())
    }
}

impl Transport for MockTransport {
    fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value> {
        let mut state = self.state.borrow_mut();
        state
            .requests
            .push((url.to_string(), token.map(str::to_string)));

        if let Some(code) = state.statuses.get(url) {
            return Err(Error::status(url, *code));
        }
        state
            .responses
            .get(url)
            .cloned()
            .ok_or_else(|| Error::status(url, 404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_unknown_url_is_not_found() {
        let mock = MockTransport::new();
        let err = mock.get_json("https://nowhere", None).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
        assert_eq!(mock.total_requests(), 1);
    }

    #[test]
    fn test_mock_failure_status() {
        let mock = MockTransport::new();
        mock.respond("https://r/x", json!({}));
        mock.fail("https://r/x", 500);
        let err = mock.get_json("https://r/x", None).unwrap_err();
        assert!(matches!(err, Error::Registry { status: Some(500), .. }));
    }

    #[test]
    fn test_mock_clones_share_state() {
        let mock = MockTransport::new();
        let handle = mock.clone();
        mock.respond("https://r/x", json!([1, 2]));

        handle.get_json("https://r/x", Some("secret")).unwrap();
        assert_eq!(mock.request_count("https://r/x"), 1);
        assert_eq!(mock.last_token("https://r/x").as_deref(), Some("secret"));
    }
}
