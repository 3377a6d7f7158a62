use regex::Regex;
use url::Url;

use crate::InputError;

/// Accepted URL grammar: scheme, host (DNS name, `localhost` or IPv4 literal),
/// optional port, optional path and optional query. Matched case-insensitively
/// against the whole input.
const URL_PATTERN: &str = concat!(
    r"(?i)^(https?|ftp)://",
    r"(([A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,6}\.?",
    r"|localhost",
    r"|[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})",
    r"(:[0-9]+)?",
    r"(/[-A-Z0-9+&@#/%=~_|$?!:.,]*)?",
    r"(\?[A-Z0-9+&@#/%=~_|$?!:.,]*)?$",
);

/// Syntactic URL check, optionally restricted to hosts containing a substring.
///
/// Built once at start-up and shared by reference; holds no mutable state, so
/// every call with the same input gives the same answer.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    pattern: Regex,
    required_host: Option<String>,
}

impl UrlValidator {
    /// Validator that accepts any host
    pub fn new() -> Self {
        Self {
            // The pattern is a compile-time constant covered by tests
            pattern: Regex::new(URL_PATTERN).expect("URL pattern must compile"),
            required_host: None,
        }
    }

    /// Require the URL host to contain `host` (case-insensitive)
    pub fn with_required_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into().trim().to_lowercase();
        self.required_host = if host.is_empty() { None } else { Some(host) };
        self
    }

    pub fn required_host(&self) -> Option<&str> {
        self.required_host.as_deref()
    }

    /// Validate user input, returning the trimmed URL on success
    pub fn validate<'a>(&self, input: &'a str) -> Result<&'a str, InputError> {
        let url = input.trim();
        if url.is_empty() {
            return Err(InputError::Empty);
        }

        if !self.pattern.is_match(url) {
            tracing::debug!("Rejected malformed URL: {}", url);
            return Err(InputError::Malformed(url.to_string()));
        }

        if let Some(expected) = &self.required_host {
            let host = Url::parse(url)
                .ok()
                .and_then(|parsed| parsed.host_str().map(|h| h.to_lowercase()))
                .ok_or_else(|| InputError::Malformed(url.to_string()))?;

            if !host.contains(expected.as_str()) {
                tracing::debug!("Rejected URL on host {} (expected {})", host, expected);
                return Err(InputError::WrongHost {
                    url: url.to_string(),
                    expected: expected.clone(),
                });
            }
        }

        Ok(url)
    }

    /// Shorthand for callers that only need accept/reject
    pub fn is_valid(&self, input: &str) -> bool {
        self.validate(input).is_ok()
    }
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}
