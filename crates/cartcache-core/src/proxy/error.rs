use std::path::Path;

use thiserror::Error;

/// Transport-level failure while talking to the network.
///
/// A non-2xx status is not a `FetchError`: the response came back and is
/// handed to the caller as-is.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Host unreachable: {0}")]
    Unreachable(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache I/O failed ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache index: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            context: format!("{} {}", context.into(), path.display()),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    /// The only failure the proxy surfaces for a read: a stale-while-revalidate
    /// miss whose network fetch also failed.
    #[error("Request to {url} failed and nothing is cached: {source}")]
    Network {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("App shell resource {url} could not be cached: {reason}")]
    Install { url: String, reason: String },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
