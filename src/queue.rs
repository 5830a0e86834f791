//! Rate-limited fetch job queue
//!
//! Serializes every quote-API call through one worker so the aggregate call
//! rate never exceeds the broker's published limit. Jobs run strictly FIFO;
//! after each job the worker pauses for a fixed pacing interval regardless
//! of how long the job took.

use crate::brokers::types::{today_ist, Candle, CandleInterval, CandleRequest};
use crate::brokers::QuoteClient;
use crate::error::Result;
use crate::state::{Instrument, WatchlistStore};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Minimum spacing between jobs. Angel One allows ~1 historical call per
/// second; 1.5s keeps a margin for the paired LTP call.
pub const DEFAULT_PACING: Duration = Duration::from_millis(1500);

const CANDLE_RETRY_ATTEMPTS: u32 = 3;
const CANDLE_RETRY_STEP: Duration = Duration::from_secs(4);

enum Job {
    Fetch(String),
    Stop,
}

/// Handle for enqueueing fetch jobs. Cheap to clone via the inner sender.
pub struct FetchQueue {
    tx: mpsc::UnboundedSender<Job>,
    store: Arc<WatchlistStore>,
}

impl FetchQueue {
    /// Spawn the single drain worker and return the queue handle.
    pub fn start(
        store: Arc<WatchlistStore>,
        client: Arc<dyn QuoteClient>,
        pacing: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            store: store.clone(),
        };
        let handle = tokio::spawn(drain(rx, store, client, pacing));
        (queue, handle)
    }

    /// Append a fetch job for the entry with this token.
    ///
    /// Flips the entry's loading flag immediately so callers see the
    /// pending fetch before the worker picks it up. Never blocks; pending
    /// jobs are not de-duplicated (last write wins).
    pub fn enqueue(&self, token: &str) {
        self.store.mark_loading(token);
        // Send fails only after stop(); at that point jobs are moot.
        let _ = self.tx.send(Job::Fetch(token.to_string()));
    }

    /// Cooperative shutdown: a sentinel job drained in FIFO order.
    pub fn stop(&self) {
        let _ = self.tx.send(Job::Stop);
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<Job>,
    store: Arc<WatchlistStore>,
    client: Arc<dyn QuoteClient>,
    pacing: Duration,
) {
    info!("fetch worker started");
    while let Some(job) = rx.recv().await {
        match job {
            Job::Stop => break,
            Job::Fetch(token) => {
                run_job(&store, client.as_ref(), &token).await;
                tokio::time::sleep(pacing).await;
            }
        }
    }
    info!("fetch worker stopped");
}

/// Execute one fetch job. Individual fetch failures are logged and
/// non-fatal; the loading flag is cleared on every path.
async fn run_job(store: &WatchlistStore, client: &dyn QuoteClient, token: &str) {
    let Some(entry) = store.entry(token) else {
        // Entry removed while the job was queued
        return;
    };
    let instrument = entry.instrument;

    let ltp = match client.fetch_last_price(&instrument).await {
        Ok(price) => Some(price),
        Err(e) => {
            warn!("LTP fetch failed for {}: {}", instrument.symbol, e);
            None
        }
    };

    let reference_close = match fetch_reference_close(client, &instrument).await {
        Ok(close) => close,
        Err(e) => {
            warn!(
                "reference close fetch failed for {}: {}",
                instrument.symbol, e
            );
            None
        }
    };

    store.apply_fetch(token, ltp, reference_close);
}

/// Weekly candles first; when they fail or yield no bar strictly before
/// this week's Monday, retry at daily granularity. A weekly series whose
/// only bars belong to the in-progress week counts as no data.
async fn fetch_reference_close(
    client: &dyn QuoteClient,
    instrument: &Instrument,
) -> Result<Option<f64>> {
    let weekly = CandleRequest::trailing_year(
        instrument.exchange,
        &instrument.token,
        CandleInterval::Weekly,
    );
    let today = today_ist();

    match fetch_candles_with_retry(client, &weekly).await {
        Ok(candles) => {
            if let Some(close) = reference_close_before(&candles, today) {
                return Ok(Some(close));
            }
            warn!(
                "no qualifying weekly bar for {}, trying daily",
                instrument.symbol
            );
        }
        Err(e) => {
            warn!(
                "weekly fetch failed for {}: {}, trying daily",
                instrument.symbol, e
            );
        }
    }

    let daily =
        fetch_candles_with_retry(client, &weekly.with_interval(CandleInterval::Daily)).await?;
    Ok(reference_close_before(&daily, today))
}

/// Bounded retry with linearly increasing backoff, transient errors only.
async fn fetch_candles_with_retry(
    client: &dyn QuoteClient,
    request: &CandleRequest,
) -> Result<Vec<Candle>> {
    let mut attempt = 1;
    loop {
        match client.fetch_candles(request).await {
            Ok(candles) => return Ok(candles),
            Err(e) if e.is_transient() && attempt < CANDLE_RETRY_ATTEMPTS => {
                let wait = CANDLE_RETRY_STEP * attempt;
                warn!(
                    "candle fetch attempt {} failed for {}: {}, retrying in {:?}",
                    attempt, request.token, e, wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Close of the most recent candle dated strictly before the Monday of the
/// week containing `today`. Scans newest to oldest; `None` when no bar
/// qualifies rather than guessing with an in-progress week.
pub fn reference_close_before(candles: &[Candle], today: NaiveDate) -> Option<f64> {
    let week_start =
        today - chrono::Duration::days(i64::from(today.weekday().num_days_from_monday()));
    candles
        .iter()
        .rev()
        .find(|c| c.date < week_start)
        .map(|c| c.close)
}
