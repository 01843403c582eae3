//! Offline cache proxy.
//!
//! Every read the front end issues goes through [`OfflineProxy`]. Requests are
//! classified by URL shape and answered with one of two strategies, each backed
//! by a versioned on-disk store:
//!
//! - the catalog document is served network-first from the `data-<version>` store
//! - app-shell resources, images, and whitelisted stylesheet hosts are served
//!   stale-while-revalidate from the `static-<version>` store
//!
//! Anything else passes through to the network untouched.

pub mod classify;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod request;
pub mod store;

pub use classify::{Classifier, ResourceClass, Strategy, ASSET_PREFIXES, CATALOG_PATH};
pub use engine::{store_name, Interception, OfflineProxy, ProxySettings, APP_SHELL};
pub use error::{FetchError, ProxyError, StoreError};
pub use fetch::{Fetcher, HttpFetcher};
pub use request::{ProxyRequest, ProxyResponse};
pub use store::{CacheStorage, CacheStore, CachedResponse};

pub use reqwest::{Method, Url};
