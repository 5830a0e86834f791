//! Headless watchlist monitor
//!
//! Logs in with credentials from the config file and environment, starts
//! the engine and runs until Ctrl-C. Alert fires land in the log output.

use levelwatch::brokers::angel::AngelClient;
use levelwatch::config::AppConfig;
use levelwatch::error::{AppError, Result};
use levelwatch::Engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "levelwatch.json";
const SCRIP_CACHE_FILE: &str = "scripmaster.json";

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{} not set", name)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "levelwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load(Path::new(CONFIG_FILE))?;
    if config.api_key.is_empty() || config.client_id.is_empty() {
        return Err(AppError::Config(format!(
            "api_key and client_id must be set in {}",
            CONFIG_FILE
        )));
    }

    // Password and a current TOTP code come from the environment; they
    // are never written to disk.
    let password = env_var("ANGEL_PASSWORD")?;
    let totp = env_var("ANGEL_TOTP")?;

    let client = Arc::new(AngelClient::new(&config.api_key, &config.client_id));
    client.login(&password, &totp).await?;
    info!("login successful for {}", config.client_id);

    let engine = Engine::start(&config, Some(PathBuf::from(CONFIG_FILE)), client);
    engine.connect_feed().await?;
    engine.spawn_scrip_load(PathBuf::from(SCRIP_CACHE_FILE));

    // Derive ladder levels once the initial fetch pass has had time to
    // land reference closes for the seed symbols.
    engine.spawn_delayed_generation(std::time::Duration::from_secs(60));

    info!(
        "monitoring {} symbols, Ctrl-C to stop",
        engine.store().entries().len()
    );
    tokio::signal::ctrl_c().await?;

    engine.shutdown().await;
    Ok(())
}
