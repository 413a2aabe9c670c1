//! Per-domain registry tokens.

use std::collections::BTreeMap;
use std::fmt;

/// Bearer tokens keyed by registry domain.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    tokens: BTreeMap<String, String>,
}

impl Credentials {
    /// Create an empty credential set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the token for `domain`.
    pub fn insert(&mut self, domain: impl Into<String>, token: impl Into<String>) {
        self.tokens
            .insert(domain.into().trim().to_lowercase(), token.into().trim().to_string());
    }

    /// Token for `domain`, if any.
    #[must_use]
    pub fn token(&self, domain: &str) -> Option<&str> {
        self.tokens.get(&domain.to_lowercase()).map(String::as_str)
    }

    /// Merge `other` into this set; entries of `other` win.
    pub fn merge(&mut self, other: Self) {
        self.tokens.extend(other.tokens);
    }

    /// Registered domains.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// Number of registered domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut credentials = Self::new();
        for (domain, token) in iter {
            credentials.insert(domain, token);
        }
        credentials
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.tokens.iter().map(|(d, t)| (d, mask_token(t))))
            .finish()
    }
}

/// Shorten a token for logging.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(5).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut credentials = Credentials::new();
        credentials.insert("App.Terraform.IO", " abc ");
        assert_eq!(credentials.token("app.terraform.io"), Some("abc"));
        assert_eq!(credentials.token("APP.TERRAFORM.IO"), Some("abc"));
        assert_eq!(credentials.token("example.com"), None);
    }

    #[test]
    fn test_merge_later_wins() {
        let mut base: Credentials = [
            ("a.io".to_string(), "one".to_string()),
            ("b.io".to_string(), "two".to_string()),
        ]
        .into_iter()
        .collect();
        let overlay: Credentials = [("b.io".to_string(), "three".to_string())]
            .into_iter()
            .collect();

        base.merge(overlay);
        assert_eq!(base.len(), 2);
        assert_eq!(base.token("b.io"), Some("three"));
    }

    #[test]
    fn test_debug_masks_tokens() {
        let mut credentials = Credentials::new();
        credentials.insert("a.io", "supersecrettoken");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("super***"));
        assert!(!debug.contains("supersecrettoken"));
    }
}
