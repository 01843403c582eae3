use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;

use super::CartStorage;

/// One product in the cart.
///
/// `name` and `price` are copied from the catalog when the line is created and
/// never change afterwards, even if the catalog does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CartSummary {
    /// Number of distinct products.
    pub line_count: usize,
    /// Sum of all quantities. This is the badge value.
    pub total_quantity: u64,
    pub total_value: f64,
}

/// Staged quantities plus the durable cart, for one session.
pub struct CartEngine<S: CartStorage> {
    storage: S,
    catalog: Option<Arc<Catalog>>,
    staged: HashMap<String, u32>,
    cart: BTreeMap<String, CartLine>,
}

impl<S: CartStorage> CartEngine<S> {
    /// Loads the cart from `storage`.
    ///
    /// Never fails: a missing, unreadable, or corrupt slot starts an empty cart.
    pub fn hydrate(storage: S) -> Self {
        let cart = match storage.read() {
            Ok(Some(raw)) => match serde_json::from_str::<BTreeMap<String, CartLine>>(&raw) {
                Ok(lines) => lines
                    .into_iter()
                    .filter(|(id, line)| {
                        let keep = line.quantity > 0;
                        if !keep {
                            debug!(product = %id, "Dropping empty cart line");
                        }
                        keep
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "Stored cart is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            storage,
            catalog: None,
            staged: HashMap::new(),
            cart,
        }
    }

    /// The catalog `commit` takes names and prices from.
    pub fn set_catalog(&mut self, catalog: Arc<Catalog>) {
        self.catalog = Some(catalog);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn staged(&self, product_id: &str) -> u32 {
        self.staged.get(product_id).copied().unwrap_or(0)
    }

    /// Adjusts a staged quantity, clamping at zero. Returns the new value.
    pub fn stage(&mut self, product_id: &str, delta: i64) -> u32 {
        let current = i64::from(self.staged(product_id));
        let next = current.saturating_add(delta).clamp(0, i64::from(u32::MAX)) as u32;
        self.staged.insert(product_id.to_string(), next);
        next
    }

    /// Moves the staged quantity for a product into the cart.
    ///
    /// Returns the new total quantity, or `None` when nothing changed: the
    /// product is not in the catalog or nothing is staged for it.
    pub fn commit(&mut self, product_id: &str) -> Option<u64> {
        let product = self.catalog.as_ref()?.product(product_id)?;

        let quantity = self.staged(product_id);
        if quantity == 0 {
            return None;
        }

        let line = self
            .cart
            .entry(product_id.to_string())
            .or_insert_with(|| CartLine {
                id: product.id.clone(),
                name: product.name.clone(),
                price: product.price,
                quantity: 0,
            });
        line.quantity = line.quantity.saturating_add(quantity);

        self.staged.insert(product_id.to_string(), 0);
        self.persist();
        Some(self.total_quantity())
    }

    /// Deletes a product's line. A product not in the cart is not an error.
    /// Returns the new total quantity.
    pub fn remove(&mut self, product_id: &str) -> u64 {
        if self.cart.remove(product_id).is_none() {
            debug!(product = %product_id, "Remove for product not in cart");
        }
        self.persist();
        self.total_quantity()
    }

    pub fn aggregate(&self) -> CartSummary {
        CartSummary {
            line_count: self.cart.len(),
            total_quantity: self.total_quantity(),
            total_value: self.cart.values().map(CartLine::subtotal).sum(),
        }
    }

    pub fn total_quantity(&self) -> u64 {
        self.cart.values().map(|line| u64::from(line.quantity)).sum()
    }

    /// Cart lines ordered by product id.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.cart.values()
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.cart.get(product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    /// Best effort: a failed write is logged and not retried.
    fn persist(&mut self) {
        let result = serde_json::to_string(&self.cart)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.write(&json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to save cart");
        }
    }
}
