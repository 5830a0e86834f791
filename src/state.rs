//! Shared watchlist state
//!
//! `WatchlistStore` is the one mutable collection touched by more than one
//! worker (fetch worker, feed task, user actions). Every accessor either
//! mutates under a lock or hands back a snapshot clone, so callers never
//! iterate a collection that another task is mutating.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Exchange segment. NSE equity only for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeSegment {
    Nse,
}

impl ExchangeSegment {
    /// Wire name used by the broker API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeSegment::Nse => "NSE",
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tradable security
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Exchange-assigned identifier; the join key across feed ticks,
    /// fetch jobs and alerts. Treated as an opaque string throughout.
    pub token: String,
    pub exchange: ExchangeSegment,
}

/// One tracked instrument on the watchlist
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistEntry {
    pub instrument: Instrument,
    /// Last traded price, 0 = unknown
    pub last_traded_price: f64,
    /// Prior-week close used as the ladder anchor, 0 = unknown
    pub reference_close: f64,
    /// True while a fetch job for this entry is outstanding
    pub loading: bool,
}

impl WatchlistEntry {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            last_traded_price: 0.0,
            reference_close: 0.0,
            loading: false,
        }
    }
}

/// Alert trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCondition {
    Above,
    Below,
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCondition::Above => f.write_str("ABOVE"),
            AlertCondition::Below => f.write_str("BELOW"),
        }
    }
}

/// A standing price watch. Never mutated; removed atomically with firing.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub token: String,
    pub symbol: String,
    pub target_price: f64,
    pub condition: AlertCondition,
}

impl Alert {
    pub fn new(token: &str, symbol: &str, target_price: f64, condition: AlertCondition) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.to_string(),
            symbol: symbol.to_string(),
            target_price,
            condition,
        }
    }
}

/// Immutable audit record, newest first
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub message: String,
}

/// Live feed connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedStatus {
    Connected,
    Disconnected,
}

/// Shared mutable data model for the acquisition and alerting engine
pub struct WatchlistStore {
    entries: RwLock<Vec<WatchlistEntry>>,
    alerts: RwLock<Vec<Alert>>,
    logs: RwLock<Vec<LogEntry>>,
    paused: AtomicBool,
    feed_status: RwLock<FeedStatus>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            logs: RwLock::new(Vec::new()),
            paused: AtomicBool::new(false),
            feed_status: RwLock::new(FeedStatus::Disconnected),
        }
    }

    // ------------------------------------------------------------------
    // Watchlist entries
    // ------------------------------------------------------------------

    /// Add an instrument to the watchlist. Idempotent on token.
    pub fn add_entry(&self, instrument: Instrument) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.instrument.token == instrument.token) {
            return false;
        }
        entries.push(WatchlistEntry::new(instrument));
        true
    }

    /// Remove an entry by token.
    pub fn remove_entry(&self, token: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.instrument.token != token);
        entries.len() != before
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<WatchlistEntry> {
        self.entries.read().clone()
    }

    /// Snapshot of a single entry.
    pub fn entry(&self, token: &str) -> Option<WatchlistEntry> {
        self.entries
            .read()
            .iter()
            .find(|e| e.instrument.token == token)
            .cloned()
    }

    /// All subscribed tokens, watchlist order.
    pub fn tokens(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|e| e.instrument.token.clone())
            .collect()
    }

    /// Mark an entry as having an outstanding fetch job.
    pub fn mark_loading(&self, token: &str) {
        if let Some(entry) = self
            .entries
            .write()
            .iter_mut()
            .find(|e| e.instrument.token == token)
        {
            entry.loading = true;
        }
    }

    /// Write fetch results and clear the loading flag.
    ///
    /// Fields passed as `None` keep their previous value; the loading flag
    /// is always cleared, even when every fetch step failed.
    pub fn apply_fetch(&self, token: &str, ltp: Option<f64>, reference_close: Option<f64>) {
        if let Some(entry) = self
            .entries
            .write()
            .iter_mut()
            .find(|e| e.instrument.token == token)
        {
            if let Some(ltp) = ltp {
                entry.last_traded_price = ltp;
            }
            if let Some(close) = reference_close {
                entry.reference_close = close;
            }
            entry.loading = false;
        }
    }

    /// Update an entry's price from a live tick. Returns a snapshot of the
    /// updated entry, or `None` when the token is not on the watchlist.
    pub fn update_price(&self, token: &str, price: f64) -> Option<WatchlistEntry> {
        let mut entries = self.entries.write();
        let entry = entries.iter_mut().find(|e| e.instrument.token == token)?;
        entry.last_traded_price = price;
        Some(entry.clone())
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    /// Snapshot of all live alerts.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Snapshot of live alerts for one token, insertion order.
    pub fn alerts_for(&self, token: &str) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| a.token == token)
            .cloned()
            .collect()
    }

    /// Insert an alert unless an identical (token, price, condition)
    /// alert is already live.
    pub fn insert_alert(&self, alert: Alert) -> bool {
        let mut alerts = self.alerts.write();
        let duplicate = alerts.iter().any(|a| {
            a.token == alert.token
                && a.target_price == alert.target_price
                && a.condition == alert.condition
        });
        if duplicate {
            return false;
        }
        alerts.push(alert);
        true
    }

    /// Remove an alert by id.
    pub fn remove_alert(&self, id: Uuid) -> bool {
        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        alerts.len() != before
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Append an audit record, newest first.
    pub fn push_log(&self, symbol: &str, message: String) {
        self.logs.write().insert(
            0,
            LogEntry {
                timestamp: Utc::now(),
                symbol: symbol.to_string(),
                message,
            },
        );
    }

    /// Snapshot of the log, newest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().clone()
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Flip the pause flag, returning the new state.
    pub fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn feed_status(&self) -> FeedStatus {
        *self.feed_status.read()
    }

    pub fn set_feed_status(&self, status: FeedStatus) {
        *self.feed_status.write() = status;
    }
}

impl Default for WatchlistStore {
    fn default() -> Self {
        Self::new()
    }
}
