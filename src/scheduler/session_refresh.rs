//! Periodic session token renewal
//!
//! Angel One JWTs expire well within a trading day; renewing on a fixed
//! half-hour cadence keeps the quote and feed transports authenticated
//! without any token introspection.

use crate::brokers::angel::AngelClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Spawn the long-lived refresher worker. Renewal failures are logged and
/// retried on the next cadence; the loop never exits on its own.
pub fn spawn_session_refresher(client: Arc<AngelClient>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("session refresher started");
        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        interval.tick().await; // the first tick completes immediately

        loop {
            interval.tick().await;
            match client.renew_session().await {
                Ok(()) => info!("session token refreshed"),
                Err(e) => warn!("session refresh failed: {}", e),
            }
        }
    })
}
