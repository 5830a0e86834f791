//! Live price feed session
//!
//! Owns the SmartAPI stream connection: one listener task per session,
//! commanded over a channel. Parsed tick batches go straight to the
//! `TickRouter`; connectivity changes surface through the store's feed
//! status. There is no automatic reconnect; a disconnect ends the task.

pub mod codec;
pub mod router;

use crate::brokers::SessionCredentials;
use crate::error::Result;
use crate::state::{FeedStatus, WatchlistStore};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use router::TickRouter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use url::Url;

const FEED_URL: &str = "wss://smartapisocket.angelone.in/smart-stream";

/// Server expects a heartbeat at least every 30s.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub(crate) enum FeedCommand {
    Subscribe(Vec<String>),
    Disconnect,
}

/// Manages the live feed connection and subscriptions
pub struct FeedManager {
    store: Arc<WatchlistStore>,
    sender: RwLock<Option<mpsc::Sender<FeedCommand>>>,
}

impl FeedManager {
    pub fn new(store: Arc<WatchlistStore>) -> Self {
        Self {
            store,
            sender: RwLock::new(None),
        }
    }

    /// Connect and start the listener task. Subscribes the current
    /// watchlist tokens immediately after the socket opens.
    pub async fn connect(
        &self,
        api_key: &str,
        client_id: &str,
        credentials: &SessionCredentials,
        router: TickRouter,
    ) -> Result<JoinHandle<()>> {
        let url = Url::parse_with_params(
            FEED_URL,
            &[
                ("clientCode", client_id),
                ("feedToken", credentials.feed_token.as_str()),
                ("apiKey", api_key),
            ],
        )
        .map_err(|e| crate::error::AppError::Config(format!("bad feed url: {}", e)))?;

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<FeedCommand>(100);
        *self.sender.write() = Some(tx);

        self.store.set_feed_status(FeedStatus::Connected);
        info!("live feed connected");

        let store = self.store.clone();
        let initial_tokens = store.tokens();

        let handle = tokio::spawn(async move {
            if !initial_tokens.is_empty() {
                let msg = codec::subscribe_message("watchlist", &initial_tokens);
                if let Err(e) = write.send(Message::Text(msg)).await {
                    warn!("initial subscribe failed: {}", e);
                }
            }

            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await; // first tick fires immediately

            loop {
                tokio::select! {
                    message = read.next() => {
                        match message {
                            Some(Ok(Message::Binary(data))) => {
                                if let Some(tick) = codec::parse_ltp_frame(&data) {
                                    router.route_batch(vec![tick]);
                                }
                            }
                            Some(Ok(Message::Text(_))) => {
                                // pong and server notices
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("feed closed by server: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("feed error: {}", e);
                                break;
                            }
                            None => break,
                        }
                    }
                    command = rx.recv() => {
                        match command {
                            Some(FeedCommand::Subscribe(tokens)) => {
                                let msg = codec::subscribe_message("add", &tokens);
                                if let Err(e) = write.send(Message::Text(msg)).await {
                                    warn!("subscribe failed: {}", e);
                                }
                            }
                            Some(FeedCommand::Disconnect) | None => {
                                let _ = write.close().await;
                                break;
                            }
                        }
                    }
                    _ = heartbeat.tick() => {
                        if let Err(e) = write.send(Message::Text(codec::PING.to_string())).await {
                            warn!("heartbeat failed: {}", e);
                            break;
                        }
                    }
                }
            }

            store.set_feed_status(FeedStatus::Disconnected);
            info!("live feed listener stopped");
        });

        Ok(handle)
    }

    /// Subscribe additional tokens on the live stream. Best-effort: a
    /// disconnected feed ignores the request.
    pub async fn subscribe(&self, tokens: Vec<String>) {
        let sender = self.sender.read().clone();
        if let Some(tx) = sender {
            let _ = tx.send(FeedCommand::Subscribe(tokens)).await;
        }
    }

    /// Close the feed connection.
    pub async fn disconnect(&self) {
        let sender = self.sender.write().take();
        if let Some(tx) = sender {
            let _ = tx.send(FeedCommand::Disconnect).await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.store.feed_status() == FeedStatus::Connected
    }

    /// Wire a command channel without a live socket.
    #[cfg(test)]
    pub(crate) fn install_sender(&self, tx: mpsc::Sender<FeedCommand>) {
        *self.sender.write() = Some(tx);
    }
}
