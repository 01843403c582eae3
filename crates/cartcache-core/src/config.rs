//! Application configuration management.
//!
//! Holds the shop origin, the cache version tag, and network settings.
//! Configuration is stored at `~/.config/cartcache/config.json`; every field is
//! optional and falls back to a default. `CARTCACHE_ORIGIN` and
//! `CARTCACHE_CACHE_VERSION` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::proxy::engine::{DEFAULT_CACHE_VERSION, DEFAULT_STYLE_HOSTS};
use crate::proxy::ProxySettings;

/// Application name used for config/cache/data directory paths
const APP_NAME: &str = "cartcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin of the local development server.
const DEFAULT_ORIGIN: &str = "http://localhost:3000";

pub const ORIGIN_ENV: &str = "CARTCACHE_ORIGIN";
pub const CACHE_VERSION_ENV: &str = "CARTCACHE_CACHE_VERSION";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub origin: Option<String>,
    pub cache_version: Option<String>,
    pub style_hosts: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(
            std::env::var(ORIGIN_ENV).ok(),
            std::env::var(CACHE_VERSION_ENV).ok(),
        );
        self
    }

    fn apply_overrides(&mut self, origin: Option<String>, cache_version: Option<String>) {
        if let Some(origin) = origin.filter(|v| !v.trim().is_empty()) {
            self.origin = Some(origin);
        }
        if let Some(version) = cache_version.filter(|v| !v.trim().is_empty()) {
            self.cache_version = Some(version);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the proxy's stores live.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Where the cart slot lives. Unlike the cache, this is never evicted.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn origin(&self) -> Result<Url> {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        Url::parse(origin).with_context(|| format!("Invalid origin URL: {}", origin))
    }

    pub fn cache_version(&self) -> &str {
        self.cache_version.as_deref().unwrap_or(DEFAULT_CACHE_VERSION)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn proxy_settings(&self) -> Result<ProxySettings> {
        let style_hosts = self
            .style_hosts
            .clone()
            .unwrap_or_else(|| DEFAULT_STYLE_HOSTS.iter().map(|h| h.to_string()).collect());
        Ok(ProxySettings::new(self.origin()?, self.cache_version()).with_style_hosts(style_hosts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.origin().unwrap().as_str(), "http://localhost:3000/");
        assert_eq!(config.cache_version(), "v1.0.0");
        assert!(config.request_timeout().is_none());

        let settings = config.proxy_settings().unwrap();
        assert_eq!(settings.static_store(), "static-v1.0.0");
        assert_eq!(settings.data_store(), "data-v1.0.0");
        assert_eq!(settings.style_hosts, vec!["cdn.jsdelivr.net"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{ "cache_version": "v2" }"#).unwrap();
        assert_eq!(config.cache_version(), "v2");
        assert!(config.origin.is_none());
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = Config {
            origin: Some("http://shop.local".to_string()),
            ..Config::default()
        };
        config.apply_overrides(Some("  ".to_string()), Some("v3".to_string()));
        assert_eq!(config.origin.as_deref(), Some("http://shop.local"));
        assert_eq!(config.cache_version(), "v3");
    }

    #[test]
    fn test_invalid_origin_is_an_error() {
        let config = Config {
            origin: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(config.origin().is_err());
        assert!(config.proxy_settings().is_err());
    }

    #[test]
    fn test_timeout_from_seconds() {
        let config = Config {
            request_timeout_secs: Some(15),
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
    }
}
