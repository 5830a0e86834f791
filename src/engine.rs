//! Top-level engine wiring
//!
//! Owns the store and the long-lived workers (fetch worker, feed listener,
//! session refresher) and exposes the user-facing actions. Workers are
//! started here and stopped here; nothing else spawns tasks that touch the
//! shared state.

use crate::alerts;
use crate::brokers::angel::AngelClient;
use crate::config::{AppConfig, SeedSymbol};
use crate::error::{AppError, Result};
use crate::feed::router::TickRouter;
use crate::feed::FeedManager;
use crate::queue::{FetchQueue, DEFAULT_PACING};
use crate::scheduler::spawn_session_refresher;
use crate::scrips::{Scrip, ScripIndex};
use crate::state::{ExchangeSegment, Instrument, WatchlistStore};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The acquisition and alerting engine
pub struct Engine {
    store: Arc<WatchlistStore>,
    scrips: Arc<ScripIndex>,
    client: Arc<AngelClient>,
    queue: FetchQueue,
    feed: FeedManager,
    config: Mutex<AppConfig>,
    config_path: Option<PathBuf>,
    queue_handle: Mutex<Option<JoinHandle<()>>>,
    feed_handle: Mutex<Option<JoinHandle<()>>>,
    aux_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Build the engine and start its workers. Expects a logged-in client;
    /// the seed watchlist is enqueued for fetching immediately. With a
    /// config path, watchlist changes are written back to disk.
    pub fn start(
        config: &AppConfig,
        config_path: Option<PathBuf>,
        client: Arc<AngelClient>,
    ) -> Self {
        let store = Arc::new(WatchlistStore::new());
        for seed in &config.watchlist {
            store.add_entry(Instrument {
                symbol: seed.symbol.clone(),
                token: seed.token.clone(),
                exchange: ExchangeSegment::Nse,
            });
        }

        let (queue, queue_handle) =
            FetchQueue::start(store.clone(), client.clone(), DEFAULT_PACING);
        let feed = FeedManager::new(store.clone());
        let refresher = spawn_session_refresher(client.clone());

        let engine = Self {
            store,
            scrips: Arc::new(ScripIndex::new()),
            client,
            queue,
            feed,
            config: Mutex::new(config.clone()),
            config_path,
            queue_handle: Mutex::new(Some(queue_handle)),
            feed_handle: Mutex::new(None),
            aux_handles: Mutex::new(vec![refresher]),
        };
        engine.refresh_all();
        engine
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    pub fn scrips(&self) -> &Arc<ScripIndex> {
        &self.scrips
    }

    /// Connect the live feed with the current session credentials.
    pub async fn connect_feed(&self) -> Result<()> {
        let credentials = self
            .client
            .credentials()
            .ok_or_else(|| AppError::Auth("not logged in".to_string()))?;
        let router = TickRouter::new(self.store.clone());
        let handle = self
            .feed
            .connect(
                self.client.api_key(),
                self.client.client_id(),
                &credentials,
                router,
            )
            .await?;
        *self.feed_handle.lock() = Some(handle);
        Ok(())
    }

    /// Load the scrip master in the background so search becomes
    /// available without blocking startup.
    pub fn spawn_scrip_load(&self, cache_path: PathBuf) {
        let scrips = self.scrips.clone();
        let handle = tokio::spawn(async move {
            let http = reqwest::Client::new();
            if let Err(e) = scrips.refresh(&http, &cache_path).await {
                warn!("scrip master load failed: {}", e);
            }
        });
        self.aux_handles.lock().push(handle);
    }

    /// Add a scrip to the watchlist: fetch its data and subscribe its
    /// token on the live feed. Duplicate adds are ignored.
    pub async fn add_symbol(&self, scrip: &Scrip) -> bool {
        let added = self.store.add_entry(Instrument {
            symbol: scrip.symbol.clone(),
            token: scrip.token.clone(),
            exchange: ExchangeSegment::Nse,
        });
        if !added {
            return false;
        }
        self.queue.enqueue(&scrip.token);
        self.feed.subscribe(vec![scrip.token.clone()]).await;
        self.persist_watchlist();
        true
    }

    /// Add a symbol by scrip-master token, for callers resolving a
    /// search hit back to its record.
    pub async fn add_symbol_by_token(&self, token: &str) -> Result<bool> {
        let scrip = self.scrips.get(token).ok_or_else(|| {
            AppError::NotFound(format!("token {} not in scrip master", token))
        })?;
        Ok(self.add_symbol(&scrip).await)
    }

    /// Remove an entry. The feed subscription is left in place; stale
    /// ticks for the token are dropped by the router.
    pub fn remove_symbol(&self, token: &str) -> bool {
        let removed = self.store.remove_entry(token);
        if removed {
            self.persist_watchlist();
        }
        removed
    }

    /// Rewrite the persisted watchlist after a membership change.
    /// Save failures are logged; the in-memory state stays authoritative.
    fn persist_watchlist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        let mut config = self.config.lock();
        config.watchlist = self
            .store
            .entries()
            .into_iter()
            .map(|e| SeedSymbol {
                symbol: e.instrument.symbol,
                token: e.instrument.token,
            })
            .collect();
        if let Err(e) = config.save(path) {
            warn!("config save failed: {}", e);
        }
    }

    /// Re-fetch every watchlist entry.
    pub fn refresh_all(&self) {
        for token in self.store.tokens() {
            self.queue.enqueue(&token);
        }
    }

    /// Run the ladder generator over the watchlist.
    pub fn generate_alerts(&self) -> usize {
        alerts::generate_for_watchlist(&self.store)
    }

    /// Schedule a one-shot ladder generation after `delay`, once the
    /// initial fetch pass has had time to land reference closes. The task
    /// is tracked and aborted on shutdown.
    pub fn spawn_delayed_generation(&self, delay: Duration) {
        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let added = alerts::generate_for_watchlist(&store);
            info!("initial ladder generation added {} alerts", added);
        });
        self.aux_handles.lock().push(handle);
    }

    /// Flip alert evaluation on or off. Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        self.store.toggle_paused()
    }

    /// Stop all workers: drain the queue up to the sentinel, close the
    /// feed, cancel the refresher and any auxiliary tasks.
    pub async fn shutdown(&self) {
        info!("engine shutting down");
        self.queue.stop();
        if let Some(handle) = self.queue_handle.lock().take() {
            let _ = handle.await;
        }

        self.feed.disconnect().await;
        if let Some(handle) = self.feed_handle.lock().take() {
            let _ = handle.await;
        }

        for handle in self.aux_handles.lock().drain(..) {
            handle.abort();
        }
        info!("engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedCommand;

    fn tcs() -> Scrip {
        Scrip {
            symbol: "TCS-EQ".to_string(),
            token: "11536".to_string(),
            name: "TATA CONSULTANCY SERVICES".to_string(),
            exch_seg: "NSE".to_string(),
        }
    }

    fn empty_config() -> AppConfig {
        AppConfig {
            watchlist: Vec::new(),
            ..AppConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_jobs_fail_cleanly_without_session() {
        // No login: every fetch fails with an auth error, the worker keeps
        // draining, and loading never sticks.
        let config = AppConfig::default();
        let client = Arc::new(AngelClient::new("key", "C123"));
        let engine = Engine::start(&config, None, client);

        assert_eq!(engine.store().entries().len(), 2);

        engine.shutdown().await;

        for entry in engine.store().entries() {
            assert!(!entry.loading);
            assert_eq!(entry.last_traded_price, 0.0);
            assert_eq!(entry.reference_close, 0.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_symbol_is_idempotent() {
        let client = Arc::new(AngelClient::new("key", "C123"));
        let engine = Engine::start(&empty_config(), None, client);

        let scrip = tcs();
        assert!(engine.add_symbol(&scrip).await);
        assert!(!engine.add_symbol(&scrip).await);
        assert_eq!(engine.store().entries().len(), 1);

        assert!(engine.remove_symbol("11536"));
        assert!(!engine.remove_symbol("11536"));

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_symbol_subscribes_token_on_the_feed() {
        let client = Arc::new(AngelClient::new("key", "C123"));
        let engine = Engine::start(&empty_config(), None, client);

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        engine.feed.install_sender(tx);

        assert!(engine.add_symbol(&tcs()).await);

        match rx.recv().await {
            Some(FeedCommand::Subscribe(tokens)) => {
                assert_eq!(tokens, vec!["11536".to_string()]);
            }
            other => panic!("unexpected feed command: {:?}", other),
        }

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchlist_changes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = empty_config();
        config.api_key = "key".to_string();
        config.client_id = "C123".to_string();

        let client = Arc::new(AngelClient::new("key", "C123"));
        let engine = Engine::start(&config, Some(path.clone()), client);

        assert!(engine.add_symbol(&tcs()).await);
        let saved = AppConfig::load(&path).unwrap();
        assert_eq!(saved.watchlist.len(), 1);
        assert_eq!(saved.watchlist[0].token, "11536");
        assert_eq!(saved.api_key, "key");

        assert!(engine.remove_symbol("11536"));
        let saved = AppConfig::load(&path).unwrap();
        assert!(saved.watchlist.is_empty());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_generation_is_tracked_and_runs() {
        let client = Arc::new(AngelClient::new("key", "C123"));
        let engine = Engine::start(&empty_config(), None, client);

        engine.spawn_delayed_generation(Duration::from_secs(60));
        // Refresher plus the generation task
        assert_eq!(engine.aux_handles.lock().len(), 2);

        tokio::time::sleep(Duration::from_secs(61)).await;

        let logs = engine.store().logs();
        assert_eq!(logs[0].symbol, "SYSTEM");
        assert_eq!(logs[0].message, "Auto-added 0 alerts");

        engine.shutdown().await;
    }
}
