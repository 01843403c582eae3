use reqwest::Url;

use super::ProxyRequest;

/// Path suffix of the catalog data document.
pub const CATALOG_PATH: &str = "/data/products.json";

/// Image and icon namespace on the page's own server.
pub const ASSET_PREFIXES: [&str; 2] = ["/assets/img/", "/assets/icons/"];

/// Which kind of stale-while-revalidate resource a request is.
///
/// Both classes are currently served identically from the static store; they
/// are kept apart so that a cache-first policy for hashed assets can be
/// introduced without touching classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Asset,
    Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    StaleWhileRevalidate(ResourceClass),
    PassThrough,
}

/// Maps a request to the strategy that answers it.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    style_hosts: Vec<String>,
}

impl Classifier {
    pub fn new<I, S>(origin: Url, style_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origin,
            style_hosts: style_hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Rules are checked in order; the first match wins.
    pub fn classify(&self, request: &ProxyRequest) -> Strategy {
        if !request.is_get() {
            return Strategy::PassThrough;
        }

        let path = request.url.path();
        if path.ends_with(CATALOG_PATH) {
            return Strategy::NetworkFirst;
        }

        if ASSET_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
            return Strategy::StaleWhileRevalidate(ResourceClass::Asset);
        }

        if self.is_same_origin(&request.url) || self.is_style_host(&request.url) {
            return Strategy::StaleWhileRevalidate(ResourceClass::Shell);
        }

        Strategy::PassThrough
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    fn is_style_host(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| self.style_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)))
            .unwrap_or(false)
    }
}
