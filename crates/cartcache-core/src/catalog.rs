//! Product catalog models and loading.
//!
//! The catalog is a single JSON document (`/data/products.json`) fetched through
//! the offline proxy. It is read-only for the whole session.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::proxy::{OfflineProxy, ProxyError, CATALOG_PATH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unable to fetch catalog: {0}")]
    Fetch(#[from] ProxyError),

    #[error("Catalog request returned status {0}")]
    Status(u16),

    #[error("Catalog document is not valid: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("Catalog has no categories")]
    NoCategories,
}

impl Catalog {
    /// Parses and validates a catalog document.
    ///
    /// Anything that is not a full catalog, including the proxy's
    /// `{"error":"offline"}` payload, is rejected.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_slice(bytes)?;
        if catalog.categories.is_empty() {
            return Err(CatalogError::NoCategories);
        }
        Ok(catalog)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Products in one category, in document order.
    pub fn products_in<'a>(&'a self, category_id: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        self.products.iter().filter(move |p| p.category == category_id)
    }

    /// The first declared category is the initial filter.
    pub fn default_category(&self) -> Option<&Category> {
        self.categories.first()
    }

    pub fn category_label(&self, id: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.label.as_str())
    }
}

/// Fetches the catalog through the proxy.
///
/// Network trouble is mostly absorbed by the proxy (network-first with a cached
/// fallback). What reaches the caller as an error is the case the front end
/// must show as "unable to load".
pub async fn load_catalog(proxy: &OfflineProxy) -> Result<Catalog, CatalogError> {
    let response = proxy.get_path(CATALOG_PATH).await?;
    if !response.is_ok() {
        warn!(status = response.status, "Catalog request failed");
        return Err(CatalogError::Status(response.status));
    }

    let catalog = Catalog::from_json(&response.body).map_err(|e| {
        warn!(error = %e, "Catalog response rejected");
        e
    })?;
    debug!(
        categories = catalog.categories.len(),
        products = catalog.products.len(),
        "Catalog loaded"
    );
    Ok(catalog)
}
