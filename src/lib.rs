//! Levelwatch - NSE equity watchlist monitor
//!
//! Pulls live and historical prices for an Angel One account, derives
//! alert thresholds from a 3-6-9 price ladder anchored on the prior
//! week's close, and fires one-shot notifications when prices cross them.
//!
//! The engine is headless: it exposes snapshots of the watchlist, alert
//! set and log for any outer surface to render.

pub mod alerts;
pub mod brokers;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod queue;
pub mod scheduler;
pub mod scrips;
pub mod state;

pub use engine::Engine;
pub use error::{AppError, Result};
