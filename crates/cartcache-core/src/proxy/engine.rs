//! The proxy itself: strategy dispatch, install-time priming, and store lifecycle.

use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::connectivity::Connectivity;

use super::{
    CacheStorage, CacheStore, CachedResponse, Classifier, FetchError, Fetcher, ProxyError,
    ProxyRequest, ProxyResponse, Strategy,
};

// ============================================================================
// Constants
// ============================================================================

pub const STATIC_ROLE: &str = "static";
pub const DATA_ROLE: &str = "data";

/// Bumping this evicts every store from the previous version at next activation.
pub const DEFAULT_CACHE_VERSION: &str = "v1.0.0";

/// Third-party hosts whose stylesheets and fonts are cached like the app shell.
pub const DEFAULT_STYLE_HOSTS: [&str; 1] = ["cdn.jsdelivr.net"];

/// Resources fetched eagerly on install so the app works offline right away.
/// Relative entries resolve against the page origin.
pub const APP_SHELL: [&str; 8] = [
    "/",
    "/index.html",
    "/css/style.css",
    "/js/app.js",
    "/manifest.json",
    "/data/products.json",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.css",
];

/// Store names are `<role>-<version>`, e.g. `static-v1.0.0`.
pub fn store_name(role: &str, version: &str) -> String {
    format!("{}-{}", role, version)
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub origin: Url,
    pub version: String,
    pub style_hosts: Vec<String>,
    pub app_shell: Vec<String>,
}

impl ProxySettings {
    pub fn new(origin: Url, version: impl Into<String>) -> Self {
        Self {
            origin,
            version: version.into(),
            style_hosts: DEFAULT_STYLE_HOSTS.iter().map(|h| h.to_string()).collect(),
            app_shell: APP_SHELL.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_style_hosts(mut self, style_hosts: Vec<String>) -> Self {
        self.style_hosts = style_hosts;
        self
    }

    pub fn static_store(&self) -> String {
        store_name(STATIC_ROLE, &self.version)
    }

    pub fn data_store(&self) -> String {
        store_name(DATA_ROLE, &self.version)
    }

    /// Resolves a path against the origin. Absolute URLs are returned as-is.
    pub fn resolve(&self, path_or_url: &str) -> Result<Url, ProxyError> {
        self.origin
            .join(path_or_url)
            .map_err(|_| ProxyError::InvalidUrl(path_or_url.to_string()))
    }
}

// ============================================================================
// Proxy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    Respond(ProxyResponse),
    /// Not handled here; the caller goes to the network directly.
    PassThrough,
}

pub struct OfflineProxy {
    settings: ProxySettings,
    classifier: Classifier,
    storage: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    connectivity: Connectivity,
}

impl OfflineProxy {
    pub fn new(settings: ProxySettings, storage: Arc<CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        let classifier = Classifier::new(settings.origin.clone(), settings.style_hosts.clone());
        Self {
            settings,
            classifier,
            storage,
            fetcher,
            connectivity: Connectivity::default(),
        }
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn classify(&self, request: &ProxyRequest) -> Strategy {
        self.classifier.classify(request)
    }

    /// True once the current version's static store exists and holds entries.
    pub async fn is_installed(&self) -> bool {
        let name = self.settings.static_store();
        if !self.storage.has(&name).await {
            return false;
        }
        match self.storage.open(&name).await {
            Ok(store) => !store.is_empty().await,
            Err(_) => false,
        }
    }

    /// Primes the static store with the app shell.
    ///
    /// All-or-nothing: every resource must come back 2xx before anything is
    /// written. Returns the number of entries stored.
    pub async fn install(&self) -> Result<usize, ProxyError> {
        let requests = self
            .settings
            .app_shell
            .iter()
            .map(|entry| self.settings.resolve(entry).map(ProxyRequest::get))
            .collect::<Result<Vec<_>, _>>()?;

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = self.fetch(request).await.map_err(|e| ProxyError::Install {
                url: request.url.to_string(),
                reason: e.to_string(),
            })?;
            if !response.is_ok() {
                return Err(ProxyError::Install {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok(response)
        }))
        .await?;

        let store = self.storage.open(&self.settings.static_store()).await?;
        for (request, response) in requests.iter().zip(responses) {
            store.put(request, response).await?;
        }

        info!(store = store.name(), entries = requests.len(), "Installed app shell");
        Ok(requests.len())
    }

    /// Deletes every store that is not one of the two current ones.
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, ProxyError> {
        let current = [self.settings.static_store(), self.settings.data_store()];

        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if !current.contains(&name) {
                self.storage.delete(&name).await?;
                deleted.push(name);
            }
        }

        info!(version = %self.settings.version, deleted = ?deleted, "Activated cache version");
        Ok(deleted)
    }

    pub async fn intercept(&self, request: &ProxyRequest) -> Result<Interception, ProxyError> {
        match self.classify(request) {
            Strategy::NetworkFirst => Ok(Interception::Respond(self.network_first(request).await)),
            Strategy::StaleWhileRevalidate(class) => {
                debug!(url = %request.url, ?class, "Stale-while-revalidate");
                self.stale_while_revalidate(request)
                    .await
                    .map(Interception::Respond)
            }
            Strategy::PassThrough => Ok(Interception::PassThrough),
        }
    }

    /// Plain network handling, no caching.
    pub async fn pass_through(&self, request: &ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        self.fetch(request).await.map_err(|source| ProxyError::Network {
            url: request.url.to_string(),
            source,
        })
    }

    /// GET through the proxy, going straight to the network for requests it declines.
    pub async fn get(&self, url: Url) -> Result<ProxyResponse, ProxyError> {
        let request = ProxyRequest::get(url);
        match self.intercept(&request).await? {
            Interception::Respond(response) => Ok(response),
            Interception::PassThrough => self.pass_through(&request).await,
        }
    }

    pub async fn get_path(&self, path: &str) -> Result<ProxyResponse, ProxyError> {
        let url = self.settings.resolve(path)?;
        self.get(url).await
    }

    /// Looks up what the store for this request's class holds, without fetching.
    pub async fn cached(&self, request: &ProxyRequest) -> Result<Option<CachedResponse>, ProxyError> {
        let name = match self.classify(request) {
            Strategy::NetworkFirst => self.settings.data_store(),
            Strategy::StaleWhileRevalidate(_) => self.settings.static_store(),
            Strategy::PassThrough => return Ok(None),
        };
        let store = self.storage.open(&name).await?;
        Ok(store.match_request(request).await)
    }

    async fn stale_while_revalidate(&self, request: &ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let store = self.storage.open(&self.settings.static_store()).await?;

        if let Some(cached) = store.match_request(request).await {
            debug!(url = %request.url, age = %cached.age_display(), "Static cache hit");
            let fetcher = Arc::clone(&self.fetcher);
            let connectivity = self.connectivity.clone();
            let request = request.clone();
            tokio::spawn(async move {
                revalidate(fetcher, store, connectivity, request).await;
            });
            return Ok(cached.response);
        }

        let response = self.fetch(request).await.map_err(|source| ProxyError::Network {
            url: request.url.to_string(),
            source,
        })?;
        if response.is_ok() {
            if let Err(e) = store.put(request, response.clone()).await {
                warn!(url = %request.url, error = %e, "Failed to cache response");
            }
        }
        Ok(response)
    }

    /// Never fails: a transport error degrades to the cached entry, then to the
    /// offline payload.
    async fn network_first(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = match self.storage.open(&self.settings.data_store()).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "Data store unavailable");
                None
            }
        };

        match self.fetch(request).await {
            Ok(response) => {
                if let (true, Some(store)) = (response.is_ok(), &store) {
                    if let Err(e) = store.put(request, response.clone()).await {
                        warn!(url = %request.url, error = %e, "Failed to cache response");
                    }
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying data cache");
                let cached = match &store {
                    Some(store) => store.match_request(request).await,
                    None => None,
                };
                match cached {
                    Some(cached) => cached.response,
                    None => ProxyResponse::offline(),
                }
            }
        }
    }

    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, FetchError> {
        let result = self.fetcher.fetch(request).await;
        self.connectivity.set_online(result.is_ok());
        result
    }
}

/// Background refresh of a static entry. Failures leave the entry untouched.
async fn revalidate(
    fetcher: Arc<dyn Fetcher>,
    store: Arc<CacheStore>,
    connectivity: Connectivity,
    request: ProxyRequest,
) {
    let result = fetcher.fetch(&request).await;
    connectivity.set_online(result.is_ok());

    match result {
        Ok(response) if response.is_ok() => {
            if let Err(e) = store.put(&request, response).await {
                debug!(url = %request.url, error = %e, "Failed to store revalidated response");
            }
        }
        Ok(response) => {
            debug!(url = %request.url, status = response.status, "Revalidation not successful, keeping cached entry");
        }
        Err(e) => {
            debug!(url = %request.url, error = %e, "Revalidation failed, keeping cached entry");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::fetch::mock::MockFetcher;
    use crate::proxy::request::JSON_CONTENT_TYPE;
    use reqwest::Method;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    const ORIGIN: &str = "http://localhost:3000";
    const CATALOG_URL: &str = "http://localhost:3000/data/products.json";
    const STYLE_URL: &str = "http://localhost:3000/css/style.css";

    fn create_test_proxy(fetcher: Arc<MockFetcher>, version: &str) -> (OfflineProxy, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let proxy = create_proxy_at(&temp_dir, fetcher, version);
        (proxy, temp_dir)
    }

    fn create_proxy_at(temp_dir: &TempDir, fetcher: Arc<MockFetcher>, version: &str) -> OfflineProxy {
        let storage = Arc::new(CacheStorage::new(temp_dir.path().join("caches")).unwrap());
        let settings = ProxySettings::new(Url::parse(ORIGIN).unwrap(), version);
        OfflineProxy::new(settings, storage, fetcher)
    }

    fn get(url: &str) -> ProxyRequest {
        ProxyRequest::get(Url::parse(url).unwrap())
    }

    async fn respond(proxy: &OfflineProxy, url: &str) -> Result<ProxyResponse, ProxyError> {
        match proxy.intercept(&get(url)).await? {
            Interception::Respond(response) => Ok(response),
            Interception::PassThrough => panic!("{} should be intercepted", url),
        }
    }

    async fn wait_for_body(store: &CacheStore, request: &ProxyRequest, expected: &str) {
        for _ in 0..200 {
            if let Some(cached) = store.match_request(request).await {
                if cached.response.text() == expected {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("store never held {:?}", expected);
    }

    // -------------------------------------------------------------------------
    // Network-first
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_network_first_returns_and_stores_live_response() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(CATALOG_URL, 200, r#"{"v":1}"#);
        let (proxy, _temp_dir) = create_test_proxy(fetcher, "v1");

        let response = respond(&proxy, CATALOG_URL).await.unwrap();
        assert_eq!(response.text(), r#"{"v":1}"#);

        let data = proxy.storage().open("data-v1").await.unwrap();
        assert!(data.match_request(&get(CATALOG_URL)).await.is_some());
        let statics = proxy.storage().open("static-v1").await.unwrap();
        assert!(statics.is_empty().await, "catalog must not land in the static store");
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cached_body() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(CATALOG_URL, 200, r#"{"v":1}"#);
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");
        respond(&proxy, CATALOG_URL).await.unwrap();

        fetcher.fail(CATALOG_URL);
        let response = respond(&proxy, CATALOG_URL).await.unwrap();
        assert_eq!(response.text(), r#"{"v":1}"#);
    }

    #[tokio::test]
    async fn test_network_first_offline_payload_when_nothing_cached() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail(CATALOG_URL);
        let (proxy, _temp_dir) = create_test_proxy(fetcher, "v1");

        let response = respond(&proxy, CATALOG_URL).await.unwrap();
        assert_eq!(response.text(), r#"{"error":"offline"}"#);
        assert_eq!(response.header("Content-Type"), Some(JSON_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_network_first_returns_error_status_without_caching_it() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(CATALOG_URL, 200, r#"{"v":1}"#);
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");
        respond(&proxy, CATALOG_URL).await.unwrap();

        fetcher.respond(CATALOG_URL, 500, "boom");
        let response = respond(&proxy, CATALOG_URL).await.unwrap();
        assert_eq!(response.status, 500);

        let data = proxy.storage().open("data-v1").await.unwrap();
        let cached = data.match_request(&get(CATALOG_URL)).await.unwrap();
        assert_eq!(cached.response.text(), r#"{"v":1}"#);
    }

    // -------------------------------------------------------------------------
    // Stale-while-revalidate
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_swr_miss_fetches_and_stores() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(STYLE_URL, 200, "body{}");
        let (proxy, _temp_dir) = create_test_proxy(fetcher, "v1");

        let response = respond(&proxy, STYLE_URL).await.unwrap();
        assert_eq!(response.text(), "body{}");

        let statics = proxy.storage().open("static-v1").await.unwrap();
        assert!(statics.match_request(&get(STYLE_URL)).await.is_some());
    }

    #[tokio::test]
    async fn test_swr_miss_with_network_failure_fails() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail(STYLE_URL);
        let (proxy, _temp_dir) = create_test_proxy(fetcher, "v1");

        let result = respond(&proxy, STYLE_URL).await;
        assert!(matches!(result, Err(ProxyError::Network { .. })));
    }

    #[tokio::test]
    async fn test_swr_hit_serves_stale_until_revalidation_lands() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(MockFetcher::gated(Arc::clone(&gate)));
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");

        let request = get(STYLE_URL);
        let statics = proxy.storage().open("static-v1").await.unwrap();
        statics.put(&request, ProxyResponse::new(200, "old")).await.unwrap();
        fetcher.respond(STYLE_URL, 200, "new");

        // Returns without waiting on the (blocked) network
        let first = tokio::time::timeout(Duration::from_secs(1), respond(&proxy, STYLE_URL))
            .await
            .expect("cached response must not wait for the network")
            .unwrap();
        assert_eq!(first.text(), "old");

        // A second request before the refresh completes still sees the old value
        let second = respond(&proxy, STYLE_URL).await.unwrap();
        assert_eq!(second.text(), "old");

        gate.add_permits(2);
        wait_for_body(&statics, &request, "new").await;

        let third = respond(&proxy, STYLE_URL).await.unwrap();
        assert_eq!(third.text(), "new");
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn test_swr_failed_revalidation_keeps_cached_entry() {
        let fetcher = Arc::new(MockFetcher::new());
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");

        let request = get(STYLE_URL);
        let statics = proxy.storage().open("static-v1").await.unwrap();
        statics.put(&request, ProxyResponse::new(200, "old")).await.unwrap();
        fetcher.fail(STYLE_URL);

        let response = respond(&proxy, STYLE_URL).await.unwrap();
        assert_eq!(response.text(), "old");

        // Let the background task run to completion
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fetcher.calls().len(), 1);
        let cached = statics.match_request(&request).await.unwrap();
        assert_eq!(cached.response.text(), "old");
    }

    // -------------------------------------------------------------------------
    // Pass-through
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_non_get_is_not_intercepted() {
        let fetcher = Arc::new(MockFetcher::new());
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");

        let post = ProxyRequest::new(Method::POST, Url::parse(CATALOG_URL).unwrap());
        assert_eq!(proxy.intercept(&post).await.unwrap(), Interception::PassThrough);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_sends_foreign_requests_straight_to_network() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("https://api.example.com/rates", 200, "1.08");
        let (proxy, _temp_dir) = create_test_proxy(fetcher, "v1");

        let response = proxy
            .get(Url::parse("https://api.example.com/rates").unwrap())
            .await
            .unwrap();
        assert_eq!(response.text(), "1.08");

        for name in proxy.storage().keys().await.unwrap() {
            let store = proxy.storage().open(&name).await.unwrap();
            assert!(store.is_empty().await, "{} should stay empty", name);
        }
    }

    // -------------------------------------------------------------------------
    // Install / activate
    // -------------------------------------------------------------------------

    fn respond_to_app_shell(fetcher: &MockFetcher) {
        let origin = Url::parse(ORIGIN).unwrap();
        for entry in APP_SHELL {
            let url = origin.join(entry).unwrap();
            fetcher.respond(url.as_str(), 200, entry);
        }
    }

    #[tokio::test]
    async fn test_install_primes_static_store() {
        let fetcher = Arc::new(MockFetcher::new());
        respond_to_app_shell(&fetcher);
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");

        assert!(!proxy.is_installed().await);
        assert_eq!(proxy.install().await.unwrap(), APP_SHELL.len());
        assert!(proxy.is_installed().await);

        let statics = proxy.storage().open("static-v1").await.unwrap();
        assert_eq!(statics.len().await, APP_SHELL.len());

        // Served offline straight after install
        fetcher.fail("http://localhost:3000/js/app.js");
        let response = respond(&proxy, "http://localhost:3000/js/app.js").await.unwrap();
        assert_eq!(response.text(), "/js/app.js");
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let fetcher = Arc::new(MockFetcher::new());
        respond_to_app_shell(&fetcher);
        fetcher.respond("http://localhost:3000/manifest.json", 404, "missing");
        let (proxy, _temp_dir) = create_test_proxy(fetcher, "v1");

        let result = proxy.install().await;
        assert!(matches!(result, Err(ProxyError::Install { .. })));

        let statics = proxy.storage().open("static-v1").await.unwrap();
        assert!(statics.is_empty().await);
    }

    #[tokio::test]
    async fn test_activate_after_version_bump_evicts_old_stores() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(CATALOG_URL, 200, "{}");
        fetcher.respond(STYLE_URL, 200, "body{}");

        let old = create_proxy_at(&temp_dir, Arc::clone(&fetcher), "v1");
        respond(&old, CATALOG_URL).await.unwrap();
        respond(&old, STYLE_URL).await.unwrap();
        old.storage().open("scratch").await.unwrap();

        let new = create_proxy_at(&temp_dir, Arc::clone(&fetcher), "v2");
        respond(&new, CATALOG_URL).await.unwrap();
        respond(&new, STYLE_URL).await.unwrap();

        let mut deleted = new.activate().await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["data-v1", "scratch", "static-v1"]);
        assert_eq!(new.storage().keys().await.unwrap(), vec!["data-v2", "static-v2"]);

        let statics = new.storage().open("static-v2").await.unwrap();
        assert!(statics.match_request(&get(STYLE_URL)).await.is_some());
    }

    // -------------------------------------------------------------------------
    // Connectivity
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_network_outcomes_drive_connectivity() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail(CATALOG_URL);
        let (proxy, _temp_dir) = create_test_proxy(Arc::clone(&fetcher), "v1");
        let connectivity = Connectivity::new(true);
        let proxy = proxy.with_connectivity(connectivity.clone());

        respond(&proxy, CATALOG_URL).await.unwrap();
        assert!(!connectivity.is_online());

        fetcher.respond(CATALOG_URL, 200, "{}");
        respond(&proxy, CATALOG_URL).await.unwrap();
        assert!(connectivity.is_online());
    }
}
