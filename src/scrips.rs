//! NSE scrip master reference index
//!
//! Large, read-only table of tradable instruments, consulted only by the
//! add-symbol search. Loaded once per day from a disk cache or the broker's
//! public master file.

use crate::error::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const SCRIP_MASTER_URL: &str =
    "https://margincalculator.angelone.in/OpenAPI_File/files/OpenAPIScripMaster.json";

/// Cached master file is reused for a day before re-downloading.
const CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// One scrip record from the master file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scrip {
    pub symbol: String,
    pub token: String,
    #[serde(default)]
    pub name: String,
    pub exch_seg: String,
}

/// Searchable scrip master, keyed by token
pub struct ScripIndex {
    scrips: DashMap<String, Scrip>,
}

impl ScripIndex {
    pub fn new() -> Self {
        Self {
            scrips: DashMap::new(),
        }
    }

    /// Populate the index from the disk cache when fresh, otherwise from
    /// the remote master file (NSE records only). Returns the loaded count.
    pub async fn refresh(&self, http: &reqwest::Client, cache_path: &Path) -> Result<usize> {
        let scrips = if cache_is_fresh(cache_path) {
            info!("loading scrip master from cache");
            read_cache(cache_path)?
        } else {
            info!("downloading scrip master (this may take a while)");
            let scrips = download(http).await?;
            write_cache(cache_path, &scrips)?;
            scrips
        };

        let count = scrips.len();
        self.install(scrips);
        info!("loaded {} NSE scrips", count);
        Ok(count)
    }

    /// Prefix search over symbol and company name, case-insensitive.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Scrip> {
        if query.len() < 2 {
            return Vec::new();
        }
        let q = query.to_uppercase();
        self.scrips
            .iter()
            .filter(|entry| {
                let s = entry.value();
                s.symbol.to_uppercase().starts_with(&q) || s.name.to_uppercase().starts_with(&q)
            })
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, token: &str) -> Option<Scrip> {
        self.scrips.get(token).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.scrips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrips.is_empty()
    }

    fn install(&self, scrips: Vec<Scrip>) {
        self.scrips.clear();
        for scrip in scrips {
            self.scrips.insert(scrip.token.clone(), scrip);
        }
    }
}

impl Default for ScripIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_is_fresh(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .map(|age| age < CACHE_MAX_AGE)
        .unwrap_or(false)
}

fn read_cache(path: &Path) -> Result<Vec<Scrip>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_cache(path: &Path, scrips: &[Scrip]) -> Result<()> {
    std::fs::write(path, serde_json::to_string(scrips)?)?;
    Ok(())
}

async fn download(http: &reqwest::Client) -> Result<Vec<Scrip>> {
    let all: Vec<Scrip> = http.get(SCRIP_MASTER_URL).send().await?.json().await?;
    // Equity watchlist scope: keep NSE records only
    Ok(all.into_iter().filter(|s| s.exch_seg == "NSE").collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrip(symbol: &str, token: &str, name: &str) -> Scrip {
        Scrip {
            symbol: symbol.to_string(),
            token: token.to_string(),
            name: name.to_string(),
            exch_seg: "NSE".to_string(),
        }
    }

    #[test]
    fn test_search_matches_symbol_and_name_prefix() {
        let index = ScripIndex::new();
        index.install(vec![
            scrip("RELIANCE-EQ", "2885", "RELIANCE INDUSTRIES"),
            scrip("SBIN-EQ", "3045", "STATE BANK OF INDIA"),
            scrip("TCS-EQ", "11536", "TATA CONSULTANCY SERVICES"),
        ]);

        let by_symbol = index.search("reli", 20);
        assert_eq!(by_symbol.len(), 1);
        assert_eq!(by_symbol[0].token, "2885");

        let by_name = index.search("STATE", 20);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].symbol, "SBIN-EQ");
    }

    #[test]
    fn test_search_requires_two_characters_and_honors_limit() {
        let index = ScripIndex::new();
        index.install(vec![
            scrip("TCS-EQ", "11536", "TATA CONSULTANCY SERVICES"),
            scrip("TATAMOTORS-EQ", "3456", "TATA MOTORS"),
        ]);

        assert!(index.search("T", 20).is_empty());
        assert_eq!(index.search("TA", 1).len(), 1);
    }

    #[test]
    fn test_cache_roundtrip_and_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripmaster.json");

        assert!(!cache_is_fresh(&path));

        let scrips = vec![scrip("SBIN-EQ", "3045", "STATE BANK OF INDIA")];
        write_cache(&path, &scrips).unwrap();

        assert!(cache_is_fresh(&path));
        let loaded = read_cache(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].token, "3045");
    }
}
