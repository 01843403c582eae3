use reqwest::{Method, Url};
use serde::de::DeserializeOwned;

/// Content type used for JSON bodies, including the offline payload.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A read request issued by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
}

impl ProxyRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Stores are keyed by the full request URL.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// A response as the proxy hands it back: status, headers, and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ProxyResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The synthetic answer for the catalog document when the network is down
    /// and nothing has been cached yet.
    pub fn offline() -> Self {
        let body = serde_json::json!({ "error": "offline" }).to_string();
        Self::new(200, body).with_header("Content-Type", JSON_CONTENT_TYPE)
    }

    /// True for 2xx statuses. Only these are written to a store.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
