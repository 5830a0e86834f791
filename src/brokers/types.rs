//! Common broker data types

use crate::state::ExchangeSegment;
use chrono::NaiveDate;
use chrono_tz::Asia::Kolkata;
use serde::{Deserialize, Serialize};

/// Candle interval for historical requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleInterval {
    Weekly,
    Daily,
}

impl CandleInterval {
    /// Wire name used by the broker API.
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::Weekly => "ONE_WEEK",
            CandleInterval::Daily => "ONE_DAY",
        }
    }
}

/// One historical bar. `date` is the trade date of the bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Historical candle request
#[derive(Debug, Clone)]
pub struct CandleRequest {
    pub exchange: ExchangeSegment,
    pub token: String,
    pub interval: CandleInterval,
    /// Inclusive range bounds, broker date format `%Y-%m-%d %H:%M`
    pub from_date: String,
    pub to_date: String,
}

impl CandleRequest {
    /// Request covering the trailing 365 days, in exchange (IST) time.
    /// A year of history guarantees enough bars for the weekly anchor.
    pub fn trailing_year(exchange: ExchangeSegment, token: &str, interval: CandleInterval) -> Self {
        let now = chrono::Utc::now().with_timezone(&Kolkata);
        let from = now - chrono::Duration::days(365);
        Self {
            exchange,
            token: token.to_string(),
            interval,
            from_date: format!("{} 09:15", from.format("%Y-%m-%d")),
            to_date: now.format("%Y-%m-%d %H:%M").to_string(),
        }
    }

    /// Same request with a different interval, for the daily fallback.
    pub fn with_interval(&self, interval: CandleInterval) -> Self {
        Self {
            interval,
            ..self.clone()
        }
    }
}

/// Today's date on the exchange clock (IST).
pub fn today_ist() -> NaiveDate {
    chrono::Utc::now().with_timezone(&Kolkata).date_naive()
}
