//! Request identities and response snapshots stored in cache stores.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::hash::compute_request_key;

/// A request identity: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CacheRequest {
    pub method: String,
    pub url: String,
}

impl CacheRequest {
    /// Build a request with an explicit method, normalized to uppercase.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self { method: method.as_ref().to_ascii_uppercase(), url: url.into() }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Content-addressed key used by persistent stores.
    pub fn key_hash(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }
}

/// A full response snapshot: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Final URL the response was served from.
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    /// Header name/value pairs in arrival order. Repeated names are kept.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
