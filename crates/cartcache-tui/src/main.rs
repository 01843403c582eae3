//! cartcache - a terminal catalog browser and shopping cart.
//!
//! Every catalog and asset read goes through the offline cache proxy, so the
//! app keeps working from its stores when the shop is unreachable.

mod app;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cartcache_core::cart::{CartEngine, FileCartStorage};
use cartcache_core::config::Config;
use cartcache_core::connectivity::Connectivity;
use cartcache_core::proxy::{CacheStorage, HttpFetcher, OfflineProxy};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "cartcache.log";

const STORES_DIR: &str = "caches";

/// Logs go to a file; the terminal belongs to the UI.
/// Use RUST_LOG to control the level (e.g., RUST_LOG=cartcache_core=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

/// Stores get their own directory so nothing else in the cache dir is
/// mistaken for one.
fn stores_root(cache_dir: &Path) -> PathBuf {
    cache_dir.join(STORES_DIR)
}

fn build_proxy(config: &Config, cache_dir: &Path) -> Result<OfflineProxy> {
    let storage = Arc::new(CacheStorage::new(stores_root(cache_dir))?);
    let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
    Ok(OfflineProxy::new(config.proxy_settings()?, storage, fetcher)
        .with_connectivity(Connectivity::default()))
}

/// Makes sure the current cache version is installed and older ones are gone.
async fn prepare_proxy(proxy: &OfflineProxy) {
    if !proxy.is_installed().await {
        match proxy.install().await {
            Ok(count) => info!(count, "App shell cached"),
            // Not fatal: the stores fill on demand once the shop is reachable
            Err(e) => warn!(error = %e, "Install failed, continuing without primed cache"),
        }
    }
    if let Err(e) = proxy.activate().await {
        warn!(error = %e, "Failed to evict old cache versions");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let status_only = args.len() > 1 && args[1] == "--status";

    let config = Config::load()?.with_env_overrides();
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    let data_dir = config.data_dir().unwrap_or_else(|_| PathBuf::from("./data"));
    std::fs::create_dir_all(&cache_dir)?;

    let _guard = init_tracing(&cache_dir);
    info!(version = config.cache_version(), "cartcache starting");

    let proxy = build_proxy(&config, &cache_dir)?;
    let engine = CartEngine::hydrate(FileCartStorage::new(&data_dir));

    // Read-only: no network, no eviction
    if status_only {
        let status = status_report(&proxy, &engine).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    prepare_proxy(&proxy).await;
    let proxy = Arc::new(proxy);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(proxy, engine);
    app.start_catalog_load();

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("cartcache shutting down");
    Ok(())
}

/// The cache stores and cart contents, for `--status`.
async fn status_report(
    proxy: &OfflineProxy,
    engine: &CartEngine<FileCartStorage>,
) -> Result<serde_json::Value> {
    let storage = proxy.storage();
    let mut stores = Vec::new();
    for name in storage.keys().await? {
        let store = storage.open(&name).await?;
        stores.push(serde_json::json!({
            "name": name,
            "entries": store.len().await,
            "urls": store.urls().await,
        }));
    }

    let summary = engine.aggregate();
    Ok(serde_json::json!({
        "origin": proxy.settings().origin.as_str(),
        "version": proxy.settings().version,
        "installed": proxy.is_installed().await,
        "stores_dir": storage.root().display().to_string(),
        "stores": stores,
        "cart": {
            "file": engine.storage().path().display().to_string(),
            "lines": summary.line_count,
            "items": summary.total_quantity,
            "total": summary.total_value,
        },
    }))
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartcache_core::proxy::{ProxyRequest, ProxyResponse, Url};
    use tempfile::TempDir;

    fn test_config() -> Config {
        Config {
            // Nothing listens here, so any fetch would fail loudly
            origin: Some("http://127.0.0.1:1".to_string()),
            cache_version: Some("v2".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_stores_live_below_cache_dir() {
        let cache_dir = Path::new("/tmp/cartcache");
        assert_eq!(stores_root(cache_dir), cache_dir.join("caches"));
    }

    #[tokio::test]
    async fn test_status_report_leaves_stores_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let cache_dir = temp_dir.path().join("cache");
        std::fs::create_dir_all(cache_dir.join("logs")).unwrap();
        std::fs::write(cache_dir.join(LOG_FILE), "log line").unwrap();

        let proxy = build_proxy(&test_config(), &cache_dir).unwrap();
        let old = proxy.storage().open("static-v1").await.unwrap();
        let request = ProxyRequest::get(Url::parse("http://127.0.0.1:1/").unwrap());
        old.put(&request, ProxyResponse::new(200, "shell")).await.unwrap();

        let engine = CartEngine::hydrate(FileCartStorage::new(&temp_dir.path().join("data")));
        let status = status_report(&proxy, &engine).await.unwrap();

        // Only real stores are listed, and the previous version survives
        assert_eq!(status["stores"].as_array().unwrap().len(), 1);
        assert_eq!(status["stores"][0]["name"], "static-v1");
        assert_eq!(status["stores"][0]["urls"][0], "http://127.0.0.1:1/");
        assert_eq!(status["installed"], false);
        assert!(!proxy.storage().has("static-v2").await);
        assert!(cache_dir.join("caches").join("static-v1").is_dir());
        assert!(cache_dir.join(LOG_FILE).is_file());
    }

    #[tokio::test]
    async fn test_status_report_summarizes_cart() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(
            data_dir.join("cart_v1.json"),
            r#"{
                "a": { "id": "a", "name": "Pasta", "price": 1.2, "quantity": 2 },
                "b": { "id": "b", "name": "Rice", "price": 2.5, "quantity": 3 }
            }"#,
        )
        .unwrap();

        let proxy = build_proxy(&test_config(), &temp_dir.path().join("cache")).unwrap();
        let engine = CartEngine::hydrate(FileCartStorage::new(&data_dir));
        let status = status_report(&proxy, &engine).await.unwrap();

        assert_eq!(status["cart"]["lines"], 2);
        assert_eq!(status["cart"]["items"], 5);
        assert!(status["cart"]["file"].as_str().unwrap().ends_with("cart_v1.json"));
        assert!(status["stores"].as_array().unwrap().is_empty());
    }
}
