//! Alert evaluation
//!
//! Matches price updates against the live alert set. An alert fires at
//! most once: the transition appends a log entry and removes the alert
//! atomically with respect to the store's lock.

pub mod ladder;

use crate::state::{Alert, AlertCondition, WatchlistEntry, WatchlistStore};
use std::sync::Arc;
use tracing::info;

/// Evaluates alerts against price updates
#[derive(Clone)]
pub struct AlertEngine {
    store: Arc<WatchlistStore>,
}

impl AlertEngine {
    pub fn new(store: Arc<WatchlistStore>) -> Self {
        Self { store }
    }

    /// Evaluate all live alerts for this entry against its current price.
    ///
    /// No-op while the store is paused. Iterates a snapshot of the alert
    /// set since firing removes from the same collection; every qualifying
    /// alert fires before returning.
    pub fn evaluate(&self, entry: &WatchlistEntry) {
        if self.store.is_paused() {
            return;
        }

        let price = entry.last_traded_price;
        for alert in self.store.alerts_for(&entry.instrument.token) {
            let hit = match alert.condition {
                AlertCondition::Above => price >= alert.target_price,
                AlertCondition::Below => price <= alert.target_price,
            };
            if !hit {
                continue;
            }

            // Remove first so a racing evaluation cannot fire it twice
            if self.store.remove_alert(alert.id) {
                let message = format!(
                    "{} hit {} ({})",
                    alert.symbol, alert.target_price, alert.condition
                );
                info!("alert fired: {}", message);
                self.store.push_log(&entry.instrument.symbol, message);
            }
        }
    }
}

/// Ladder-generation action: derive levels for every entry with a known
/// price and anchor, insert the ones not already live, and record the
/// batch in the log. Returns the number of alerts added.
///
/// De-duplication against existing (token, price, condition) triples
/// happens here; the ladder itself is unaware of the live alert set.
pub fn generate_for_watchlist(store: &WatchlistStore) -> usize {
    let mut added = 0;
    for entry in store.entries() {
        if entry.last_traded_price <= 0.0 || entry.reference_close <= 0.0 {
            continue;
        }
        for level in ladder::generate_levels(entry.last_traded_price, entry.reference_close) {
            let alert = Alert::new(
                &entry.instrument.token,
                &entry.instrument.symbol,
                level.price,
                level.condition,
            );
            if store.insert_alert(alert) {
                added += 1;
            }
        }
    }
    info!("ladder generation added {} alerts", added);
    store.push_log("SYSTEM", format!("Auto-added {} alerts", added));
    added
}
