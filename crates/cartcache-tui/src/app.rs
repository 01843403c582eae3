//! Application state management for cartcache.
//!
//! `App` owns the cart engine and the loaded catalog, tracks which category
//! and rows are selected, and coordinates the background catalog load.

use std::sync::Arc;

use cartcache_core::cart::{dispatch, CartEngine, CartLine, Command, CommandOutcome, FileCartStorage};
use cartcache_core::catalog::{load_catalog, Catalog, Category, Product};
use cartcache_core::proxy::{OfflineProxy, ProxyRequest, CATALOG_PATH};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

// ============================================================================
// Constants
// ============================================================================

/// Only one catalog load is ever in flight.
const CHANNEL_BUFFER_SIZE: usize = 4;

/// Shown when the catalog cannot be loaded at all.
pub const LOAD_ERROR_MESSAGE: &str = "Unable to load products. Please try again later.";

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Loading,
    Browsing,
    /// The catalog could not be loaded; nothing but the error is rendered.
    LoadFailed(String),
    ShowingHelp,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Products,
    Cart,
}

/// Result of a background catalog load.
struct CatalogLoad {
    result: Result<Catalog, String>,
    cached_age: Option<String>,
}

pub struct App {
    pub state: AppState,
    pub view: View,
    pub engine: CartEngine<FileCartStorage>,
    pub catalog: Option<Arc<Catalog>>,
    pub category_index: usize,
    pub product_selection: usize,
    pub cart_selection: usize,
    pub online: bool,
    pub status_message: Option<String>,
    /// How old the stored catalog copy is, for the offline banner.
    pub catalog_age: Option<String>,
    proxy: Arc<OfflineProxy>,
    online_rx: watch::Receiver<bool>,
    catalog_rx: Option<mpsc::Receiver<CatalogLoad>>,
}

impl App {
    pub fn new(proxy: Arc<OfflineProxy>, engine: CartEngine<FileCartStorage>) -> Self {
        let online_rx = proxy.connectivity().subscribe();
        let online = *online_rx.borrow();
        Self {
            state: AppState::Loading,
            view: View::Products,
            engine,
            catalog: None,
            category_index: 0,
            product_selection: 0,
            cart_selection: 0,
            online,
            status_message: None,
            catalog_age: None,
            proxy,
            online_rx,
            catalog_rx: None,
        }
    }

    // ===== Background tasks =====

    /// Fetches the catalog through the proxy without blocking the event loop.
    pub fn start_catalog_load(&mut self) {
        self.state = AppState::Loading;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.catalog_rx = Some(rx);

        let proxy = Arc::clone(&self.proxy);
        tokio::spawn(async move {
            let result = load_catalog(&proxy).await.map_err(|e| e.to_string());
            let cached_age = match proxy.settings().resolve(CATALOG_PATH) {
                Ok(url) => proxy
                    .cached(&ProxyRequest::get(url))
                    .await
                    .ok()
                    .flatten()
                    .map(|cached| cached.age_display()),
                Err(_) => None,
            };
            let _ = tx.send(CatalogLoad { result, cached_age }).await;
        });
    }

    pub fn check_background_tasks(&mut self) {
        let loads: Vec<CatalogLoad> = match self.catalog_rx {
            Some(ref mut rx) => {
                let mut loads = Vec::new();
                while let Ok(load) = rx.try_recv() {
                    loads.push(load);
                }
                loads
            }
            None => Vec::new(),
        };
        for load in loads {
            self.catalog_age = load.cached_age;
            self.on_catalog_loaded(load.result);
        }

        if self.online_rx.has_changed().unwrap_or(false) {
            self.online = *self.online_rx.borrow_and_update();
            self.status_message = Some(if self.online {
                "Back online".to_string()
            } else {
                "You are offline - showing saved data".to_string()
            });
        }
    }

    fn on_catalog_loaded(&mut self, result: Result<Catalog, String>) {
        match result {
            Ok(catalog) => {
                info!(products = catalog.products.len(), "Catalog ready");
                let catalog = Arc::new(catalog);
                self.engine.set_catalog(Arc::clone(&catalog));
                self.catalog = Some(catalog);
                self.category_index = 0;
                self.product_selection = 0;
                self.state = AppState::Browsing;
            }
            Err(e) => {
                error!(error = %e, "Catalog load failed");
                self.catalog = None;
                self.state = AppState::LoadFailed(LOAD_ERROR_MESSAGE.to_string());
            }
        }
    }

    // ===== Catalog navigation =====

    pub fn current_category(&self) -> Option<&Category> {
        self.catalog.as_ref()?.categories.get(self.category_index)
    }

    pub fn visible_products(&self) -> Vec<&Product> {
        match (&self.catalog, self.current_category()) {
            (Some(catalog), Some(category)) => catalog.products_in(&category.id).collect(),
            _ => Vec::new(),
        }
    }

    pub fn next_category(&mut self) {
        let count = self.catalog.as_ref().map(|c| c.categories.len()).unwrap_or(0);
        if count > 0 {
            self.category_index = (self.category_index + 1) % count;
            self.product_selection = 0;
        }
    }

    pub fn prev_category(&mut self) {
        let count = self.catalog.as_ref().map(|c| c.categories.len()).unwrap_or(0);
        if count > 0 {
            self.category_index = (self.category_index + count - 1) % count;
            self.product_selection = 0;
        }
    }

    pub fn select_next(&mut self) {
        let (selection, len) = self.selection_mut();
        if len > 0 && *selection + 1 < len {
            *selection += 1;
        }
    }

    pub fn select_prev(&mut self) {
        let (selection, _) = self.selection_mut();
        *selection = selection.saturating_sub(1);
    }

    fn selection_mut(&mut self) -> (&mut usize, usize) {
        match self.view {
            View::Products => {
                let len = self.visible_products().len();
                (&mut self.product_selection, len)
            }
            View::Cart => {
                let len = self.engine.aggregate().line_count;
                (&mut self.cart_selection, len)
            }
        }
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Products => View::Cart,
            View::Cart => View::Products,
        };
        self.cart_selection = 0;
    }

    // ===== Cart =====

    pub fn cart_lines(&self) -> Vec<&CartLine> {
        self.engine.lines().collect()
    }

    fn selected_product_id(&self) -> Option<String> {
        self.visible_products()
            .get(self.product_selection)
            .map(|p| p.id.clone())
    }

    fn selected_cart_id(&self) -> Option<String> {
        self.cart_lines().get(self.cart_selection).map(|l| l.id.clone())
    }

    /// Runs a UI action against the selected row.
    ///
    /// Actions use the same tags as the command dispatcher: `inc`, `dec`,
    /// `addToCart`, `removeFromCart`.
    pub fn apply(&mut self, action: &str) {
        let target = match action {
            "removeFromCart" => self.selected_cart_id(),
            _ => self.selected_product_id(),
        };
        let Some(product_id) = target else {
            return;
        };

        let command = match Command::parse(action, &product_id) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "Ignoring action");
                return;
            }
        };

        match dispatch(&mut self.engine, &command) {
            CommandOutcome::CartChanged { total_quantity } => {
                self.status_message = Some(match command {
                    Command::AddToCart(_) => format!("Added to cart ({} items)", total_quantity),
                    _ => format!("Removed from cart ({} items)", total_quantity),
                });
                let lines = self.engine.aggregate().line_count;
                if self.cart_selection >= lines {
                    self.cart_selection = lines.saturating_sub(1);
                }
            }
            CommandOutcome::Unchanged => {
                if matches!(command, Command::AddToCart(_)) {
                    self.status_message = Some("Choose a quantity first".to_string());
                }
            }
            CommandOutcome::Staged(_) => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cartcache_core::proxy::{CacheStorage, HttpFetcher, ProxySettings, Url};
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "categories": [
            { "id": "dispensa", "label": "Pantry" },
            { "id": "freschi", "label": "Fresh" }
        ],
        "products": [
            { "id": "dispensa_pasta", "name": "Pasta", "description": "500g",
              "price": 1.2, "category": "dispensa", "image": "assets/img/pasta.jpg" },
            { "id": "dispensa_rice", "name": "Rice", "description": "1kg",
              "price": 2.5, "category": "dispensa", "image": "assets/img/rice.jpg" },
            { "id": "freschi_milk", "name": "Milk", "description": "1L",
              "price": 1.35, "category": "freschi", "image": "assets/img/milk.jpg" }
        ]
    }"#;

    pub(crate) fn create_test_app() -> (App, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(CacheStorage::new(temp_dir.path().join("cache")).unwrap());
        let settings = ProxySettings::new(Url::parse("http://localhost:3000").unwrap(), "v1");
        let fetcher = Arc::new(HttpFetcher::new(None).unwrap());
        let proxy = Arc::new(OfflineProxy::new(settings, storage, fetcher));
        let engine = CartEngine::hydrate(FileCartStorage::new(&temp_dir.path().join("data")));

        let mut app = App::new(proxy, engine);
        app.on_catalog_loaded(Ok(Catalog::from_json(CATALOG.as_bytes()).unwrap()));
        (app, temp_dir)
    }

    #[test]
    fn test_catalog_load_starts_on_first_category() {
        let (app, _temp_dir) = create_test_app();
        assert_eq!(app.state, AppState::Browsing);
        assert_eq!(app.current_category().unwrap().id, "dispensa");
        assert_eq!(app.visible_products().len(), 2);
    }

    #[test]
    fn test_failed_load_shows_error_state() {
        let (mut app, _temp_dir) = create_test_app();
        app.on_catalog_loaded(Err("offline".to_string()));
        assert_eq!(app.state, AppState::LoadFailed(LOAD_ERROR_MESSAGE.to_string()));
        assert!(app.visible_products().is_empty());
    }

    #[test]
    fn test_category_cycling_wraps() {
        let (mut app, _temp_dir) = create_test_app();
        app.next_category();
        assert_eq!(app.current_category().unwrap().id, "freschi");
        app.next_category();
        assert_eq!(app.current_category().unwrap().id, "dispensa");
        app.prev_category();
        assert_eq!(app.current_category().unwrap().id, "freschi");
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let (mut app, _temp_dir) = create_test_app();
        app.select_prev();
        assert_eq!(app.product_selection, 0);
        app.select_next();
        app.select_next();
        assert_eq!(app.product_selection, 1);
    }

    #[test]
    fn test_stage_add_and_remove_through_actions() {
        let (mut app, _temp_dir) = create_test_app();

        app.apply("inc");
        app.apply("inc");
        assert_eq!(app.engine.staged("dispensa_pasta"), 2);

        app.apply("addToCart");
        assert_eq!(app.engine.aggregate().total_quantity, 2);
        assert_eq!(app.engine.staged("dispensa_pasta"), 0);

        app.toggle_view();
        assert_eq!(app.view, View::Cart);
        app.apply("removeFromCart");
        assert!(app.engine.is_empty());
    }

    #[test]
    fn test_add_without_quantity_hints_user() {
        let (mut app, _temp_dir) = create_test_app();
        app.apply("addToCart");
        assert!(app.engine.is_empty());
        assert_eq!(app.status_message.as_deref(), Some("Choose a quantity first"));
    }

    #[test]
    fn test_cart_survives_restart() {
        let (mut app, temp_dir) = create_test_app();
        app.next_category();
        app.apply("inc");
        app.apply("addToCart");
        drop(app);

        let engine = CartEngine::hydrate(FileCartStorage::new(&temp_dir.path().join("data")));
        assert_eq!(engine.total_quantity(), 1);
        assert_eq!(engine.line("freschi_milk").unwrap().name, "Milk");
    }
}
