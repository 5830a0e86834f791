//! Application configuration
//!
//! A small JSON file holding the API credentials' non-secret half and the
//! seed watchlist. Password and TOTP are never persisted; they come from
//! the environment at startup.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One persisted watchlist membership record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSymbol {
    pub symbol: String,
    pub token: String,
}

/// Application config, durable across restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<SeedSymbol>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            client_id: String::new(),
            watchlist: default_watchlist(),
        }
    }
}

fn default_watchlist() -> Vec<SeedSymbol> {
    vec![
        SeedSymbol {
            symbol: "RELIANCE-EQ".to_string(),
            token: "2885".to_string(),
        },
        SeedSymbol {
            symbol: "SBIN-EQ".to_string(),
            token: "3045".to_string(),
        },
    ]
}

impl AppConfig {
    /// Load from disk; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist the current config.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
