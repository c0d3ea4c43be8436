//! Two-tier collection cache: process memory in front of JSON files on disk.
//!
//! Keys are `"{season}_{data_type}"`. Only unfiltered (whole-season) fetches are
//! saved; team-scoped lookups are answered by filtering a cached collection.

use crate::persist::write_atomic;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub type Collection = Arc<Vec<Value>>;

/// Thread-safe collection cache. Cloning shares the same memory tier.
#[derive(Clone)]
pub struct CollectionCache {
    dir: Option<PathBuf>,
    inner: Arc<RwLock<HashMap<String, Collection>>>,
}

pub fn cache_key(data_type: &str, season: &str) -> String {
    format!("{}_{}", season, data_type)
}

impl CollectionCache {
    /// Cache backed by JSON files under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cache that never hits and never persists.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    fn file_for(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{}.json", key)))
    }

    /// Memory first, then disk. A disk hit is copied into memory.
    pub async fn load(&self, data_type: &str, season: &str) -> Option<Collection> {
        let key = cache_key(data_type, season);
        let path = self.file_for(&key)?;

        {
            let cache = self.inner.read().await;
            if let Some(hit) = cache.get(&key) {
                debug!("Cache hit (memory) for {}", key);
                return Some(hit.clone());
            }
        }

        let collection = read_collection(&path).await?;
        info!("Loaded {} cached {} records from {}", collection.len(), data_type, path.display());

        let mut cache = self.inner.write().await;
        // Another task may have raced us here; the disk content is the same either way.
        let entry = cache.entry(key).or_insert(collection);
        Some(entry.clone())
    }

    /// Replace the whole collection for `(data_type, season)` in both tiers.
    pub async fn save(&self, data_type: &str, season: &str, collection: Vec<Value>) -> Result<()> {
        let key = cache_key(data_type, season);
        let Some(path) = self.file_for(&key) else {
            return Ok(());
        };

        let payload = serde_json::to_vec(&collection).context("Failed to serialize cache entry")?;
        write_atomic(&path, &payload)?;

        let count = collection.len();
        self.inner.write().await.insert(key, Arc::new(collection));
        info!("Cached {} {} records for season {}", count, data_type, season);
        Ok(())
    }

    /// Pull any on-disk entries for `season` into memory. Returns how many were found.
    pub async fn preload(&self, season: &str, data_types: &[&str]) -> usize {
        let mut found = 0;
        for data_type in data_types {
            if self.load(data_type, season).await.is_some() {
                found += 1;
            }
        }
        if found > 0 {
            debug!("Preloaded {} cached collections for season {}", found, season);
        }
        found
    }

    /// Team-scoped view of a cached unfiltered collection.
    pub async fn load_for_team(&self, data_type: &str, season: &str, team: &str) -> Option<Vec<Value>> {
        let collection = self.load(data_type, season).await?;
        Some(filter_for_team(&collection, team))
    }
}

async fn read_collection(path: &Path) -> Option<Collection> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<Vec<Value>>(&content) {
        Ok(items) => Some(Arc::new(items)),
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
            None
        }
    }
}

/// Records whose `homeTeam`, `awayTeam` or `team` field equals `team`.
pub fn filter_for_team(items: &[Value], team: &str) -> Vec<Value> {
    items
        .iter()
        .filter(|item| {
            ["homeTeam", "awayTeam", "team"]
                .iter()
                .any(|field| item.get(field).and_then(Value::as_str) == Some(team))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_then_load_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CollectionCache::open(dir.path());
        cache
            .save("games", "2025", vec![json!({"id": 1}), json!({"id": 2})])
            .await
            .unwrap();
        assert!(dir.path().join("2025_games.json").exists());

        let fresh = CollectionCache::open(dir.path());
        let loaded = fresh.load("games", "2025").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(fresh.load("games", "2024").await.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_whole_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CollectionCache::open(dir.path());
        cache.save("lines", "2025", vec![json!({"a": 1}), json!({"a": 2})]).await.unwrap();
        cache.save("lines", "2025", vec![json!({"a": 3})]).await.unwrap();

        assert_eq!(cache.load("lines", "2025").await.unwrap().as_slice(), &[json!({"a": 3})]);
        let fresh = CollectionCache::open(dir.path());
        assert_eq!(fresh.load("lines", "2025").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2025_games.json"), "{not json").unwrap();
        let cache = CollectionCache::open(dir.path());
        assert!(cache.load("games", "2025").await.is_none());
    }

    #[tokio::test]
    async fn test_preload_fills_memory_tier() {
        let dir = tempfile::tempdir().unwrap();
        CollectionCache::open(dir.path())
            .save("games", "2025", vec![json!({"id": 1, "homeTeam": "Duke"})])
            .await
            .unwrap();

        let cache = CollectionCache::open(dir.path());
        assert_eq!(cache.preload("2025", &["games", "betting_lines"]).await, 1);

        // Later lookups no longer need the file
        std::fs::remove_file(dir.path().join("2025_games.json")).unwrap();
        assert_eq!(cache.load_for_team("games", "2025", "Duke").await.unwrap().len(), 1);
        assert!(cache.load("betting_lines", "2025").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = CollectionCache::disabled();
        tokio_test::assert_ok!(cache.save("games", "2025", vec![json!({"id": 1})]).await);
        assert!(cache.load("games", "2025").await.is_none());
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn test_team_filter_matches_home_away_team() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CollectionCache::open(dir.path());
        cache
            .save(
                "games",
                "2025",
                vec![
                    json!({"id": 1, "homeTeam": "Duke", "awayTeam": "UNC"}),
                    json!({"id": 2, "homeTeam": "Kansas", "awayTeam": "Duke"}),
                    json!({"id": 3, "homeTeam": "Kansas", "awayTeam": "Baylor"}),
                    json!({"team": "Duke", "pace": 70}),
                ],
            )
            .await
            .unwrap();

        let duke = cache.load_for_team("games", "2025", "Duke").await.unwrap();
        assert_eq!(duke.len(), 3);
        let nobody = cache.load_for_team("games", "2025", "Gonzaga").await.unwrap();
        assert!(nobody.is_empty());
    }
}
