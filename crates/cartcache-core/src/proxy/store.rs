//! Named, durable response stores.
//!
//! A `CacheStorage` is a directory of stores, one subdirectory per store name.
//! Each store keeps its entries in memory behind an async `RwLock` and mirrors
//! them to disk: response bodies as `<sha256>.body` files plus an `index.json`
//! with status, headers, and cache time. Readers get a clone of the entry, so a
//! read never observes a half-written update.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{ProxyRequest, ProxyResponse, StoreError};

const INDEX_FILE: &str = "index.json";

/// A stored response plus the moment it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub response: ProxyResponse,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(response: ProxyResponse) -> Self {
        Self {
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body_file: String,
    cached_at: DateTime<Utc>,
}

fn body_file_name(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}.body", hex::encode(&digest[..16]))
}

/// One named store, e.g. `static-v1.0.0`.
pub struct CacheStore {
    name: String,
    dir: PathBuf,
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl CacheStore {
    fn open(name: &str, dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).map_err(|e| StoreError::io("creating store", &dir, e))?;
        let entries = load_entries(&dir);
        debug!(store = name, entries = entries.len(), "Opened cache store");
        Ok(Self {
            name: name.to_string(),
            dir,
            entries: RwLock::new(entries),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn match_request(&self, request: &ProxyRequest) -> Option<CachedResponse> {
        self.entries.read().await.get(request.cache_key()).cloned()
    }

    /// Replaces any existing entry for the request's URL. Last writer wins.
    pub async fn put(&self, request: &ProxyRequest, response: ProxyResponse) -> Result<(), StoreError> {
        let key = request.cache_key().to_string();
        let mut entries = self.entries.write().await;

        let body_path = self.dir.join(body_file_name(&key));
        fs::write(&body_path, &response.body)
            .map_err(|e| StoreError::io("writing body", &body_path, e))?;

        entries.insert(key, CachedResponse::new(response));
        self.write_index(&entries)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stored URLs, sorted.
    pub async fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.entries.read().await.keys().cloned().collect();
        urls.sort();
        urls
    }

    fn write_index(&self, entries: &HashMap<String, CachedResponse>) -> Result<(), StoreError> {
        let mut index: Vec<IndexEntry> = entries
            .iter()
            .map(|(url, cached)| IndexEntry {
                url: url.clone(),
                status: cached.response.status,
                headers: cached.response.headers.clone(),
                body_file: body_file_name(url),
                cached_at: cached.cached_at,
            })
            .collect();
        index.sort_by(|a, b| a.url.cmp(&b.url));

        let contents = serde_json::to_string_pretty(&index)?;
        let path = self.dir.join(INDEX_FILE);
        fs::write(&path, contents).map_err(|e| StoreError::io("writing index", &path, e))
    }
}

/// Missing or unreadable indexes load as an empty store.
fn load_entries(dir: &Path) -> HashMap<String, CachedResponse> {
    let path = dir.join(INDEX_FILE);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(_) => return HashMap::new(),
    };

    let index: Vec<IndexEntry> = match serde_json::from_str(&contents) {
        Ok(index) => index,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable cache index");
            return HashMap::new();
        }
    };

    index
        .into_iter()
        .filter_map(|entry| {
            let body_path = dir.join(&entry.body_file);
            match fs::read(&body_path) {
                Ok(body) => Some((
                    entry.url,
                    CachedResponse {
                        response: ProxyResponse {
                            status: entry.status,
                            headers: entry.headers,
                            body,
                        },
                        cached_at: entry.cached_at,
                    },
                )),
                Err(e) => {
                    debug!(url = %entry.url, error = %e, "Dropping cache entry with missing body");
                    None
                }
            }
        })
        .collect()
}

/// The set of all stores under one root directory.
pub struct CacheStorage {
    root: PathBuf,
    open: RwLock<HashMap<String, Arc<CacheStore>>>,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).map_err(|e| StoreError::io("creating cache root", &root, e))?;
        Ok(Self {
            root,
            open: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens a store, creating it if it does not exist yet.
    pub async fn open(&self, name: &str) -> Result<Arc<CacheStore>, StoreError> {
        let mut open = self.open.write().await;
        if let Some(store) = open.get(name) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(CacheStore::open(name, self.root.join(name))?);
        open.insert(name.to_string(), Arc::clone(&store));
        Ok(store)
    }

    pub async fn has(&self, name: &str) -> bool {
        self.open.read().await.contains_key(name) || self.root.join(name).is_dir()
    }

    /// Names of every store on disk, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StoreError::io("listing stores in", &self.root, e))?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Returns whether a store by that name existed.
    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut open = self.open.write().await;
        let was_open = open.remove(name).is_some();

        let dir = self.root.join(name);
        if dir.is_dir() {
            fs::remove_dir_all(&dir).map_err(|e| StoreError::io("deleting store", &dir, e))?;
            return Ok(true);
        }
        Ok(was_open)
    }
}
