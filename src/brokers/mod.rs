//! Broker adapters module

pub mod angel;
pub mod types;

use crate::error::Result;
use crate::state::Instrument;
use async_trait::async_trait;
use types::{Candle, CandleRequest};

/// Opaque session credential set returned by broker login.
///
/// The engine never parses these; they are handed back to the quote and
/// feed transports as-is and replaced wholesale on renewal.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub jwt_token: String,
    pub feed_token: String,
    pub refresh_token: String,
}

/// Quote-side broker boundary consumed by the fetch queue
#[async_trait]
pub trait QuoteClient: Send + Sync {
    /// Fetch the last traded price for an instrument.
    async fn fetch_last_price(&self, instrument: &Instrument) -> Result<f64>;

    /// Fetch a historical candle series, ordered oldest to newest.
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Candle>>;
}
