//! Live tick routing
//!
//! Demultiplexes the price feed onto the watchlist. Tokens are matched as
//! opaque strings; ticks for unknown tokens and malformed ticks are dropped
//! without error.

use crate::alerts::AlertEngine;
use crate::state::WatchlistStore;
use std::sync::Arc;

/// One feed tick before validation. Prices arrive scaled in hundredths of
/// the currency unit.
#[derive(Debug, Clone)]
pub struct RawTick {
    pub token: Option<String>,
    pub scaled_price: Option<i64>,
}

/// Routes tick batches to watchlist entries and triggers alert evaluation
#[derive(Clone)]
pub struct TickRouter {
    store: Arc<WatchlistStore>,
    alerts: AlertEngine,
}

impl TickRouter {
    pub fn new(store: Arc<WatchlistStore>) -> Self {
        Self {
            alerts: AlertEngine::new(store.clone()),
            store,
        }
    }

    /// Apply one batch of ticks in order.
    pub fn route_batch(&self, ticks: Vec<RawTick>) {
        for tick in ticks {
            let (Some(token), Some(scaled)) = (tick.token, tick.scaled_price) else {
                continue;
            };
            let price = scaled as f64 / 100.0;
            if let Some(entry) = self.store.update_price(&token, price) {
                self.alerts.evaluate(&entry);
            }
        }
    }
}
