//! In-memory sketch store.
//!
//! Entries are keyed by [`SketchId`]. Storing under an existing id merges
//! the registers (cardinality union) and keeps the newer metadata.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::errors::StoreError;
use crate::domain::sketch::HEADER_LEN;
use crate::ports::{ListOptions, SketchId, SketchStore, StoredSketch};
use crate::proto::StoreStats;

/// Process-local [`SketchStore`].
#[derive(Debug, Default)]
pub struct InMemorySketchStore {
    sketches: RwLock<BTreeMap<SketchId, StoredSketch>>,
    /// `None` means unbounded.
    max_sketches: Option<usize>,
}

impl InMemorySketchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_sketches: usize) -> Self {
        Self {
            sketches: RwLock::new(BTreeMap::new()),
            max_sketches: Some(max_sketches),
        }
    }

    pub fn len(&self) -> usize {
        self.sketches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sketches.read().is_empty()
    }

    pub fn get(&self, id: &SketchId) -> Option<StoredSketch> {
        self.sketches.read().get(id).cloned()
    }
}

#[async_trait]
impl SketchStore for InMemorySketchStore {
    async fn store(&self, sketch: StoredSketch) -> Result<(), StoreError> {
        let mut sketches = self.sketches.write();
        if let Some(existing) = sketches.get_mut(&sketch.id) {
            let mut merged = existing.sketch.clone();
            merged.merge(&sketch.sketch)?;
            existing.sketch = merged;
            existing.metadata = sketch.metadata;
            return Ok(());
        }
        if let Some(max) = self.max_sketches {
            if sketches.len() >= max {
                return Err(StoreError::CapacityExceeded { max });
            }
        }
        sketches.insert(sketch.id.clone(), sketch);
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> Result<Vec<StoredSketch>, StoreError> {
        let sketches = self.sketches.read();
        let mut matching: Vec<&StoredSketch> = sketches
            .values()
            .filter(|s| s.id.timestamp >= options.since)
            .collect();
        matching.sort_by(|a, b| {
            a.id.timestamp
                .cmp(&b.id.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matching
            .into_iter()
            .take(options.limit)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let sketches = self.sketches.read();
        let clusters: HashSet<&str> = sketches.keys().map(|id| id.cluster_id.as_str()).collect();
        let antibodies: HashSet<&str> = sketches
            .values()
            .map(|s| s.metadata.antibody_id.as_str())
            .collect();
        let total_bytes: usize = sketches
            .values()
            .map(|s| HEADER_LEN + s.sketch.config().register_count())
            .sum();
        Ok(StoreStats {
            total_sketches: sketches.len() as u64,
            clusters: clusters.len() as u64,
            antibodies: antibodies.len() as u64,
            total_bytes: total_bytes as u64,
            oldest_timestamp: sketches.keys().map(|id| id.timestamp).min().unwrap_or(0),
            newest_timestamp: sketches.keys().map(|id| id.timestamp).max().unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sketch::{CardinalitySketch, SketchConfig};
    use crate::proto::{Phase, SketchMetadata};

    fn stored(cluster: &str, timestamp: i64, items: std::ops::Range<u64>) -> StoredSketch {
        let mut sketch = CardinalitySketch::new(SketchConfig::default()).unwrap();
        for i in items {
            sketch.add_hash64(i);
        }
        StoredSketch {
            id: SketchId {
                cluster_id: cluster.to_string(),
                phase: Phase::Shadow,
                timestamp,
            },
            metadata: SketchMetadata {
                antibody_id: format!("ab-{}", cluster),
                environment: "prod".into(),
                ..Default::default()
            },
            sketch,
        }
    }

    #[tokio::test]
    async fn test_store_and_list_since() {
        let store = InMemorySketchStore::new();
        store.store(stored("alpha", 300, 0..10)).await.unwrap();
        store.store(stored("beta", 100, 0..10)).await.unwrap();
        store.store(stored("gamma", 200, 0..10)).await.unwrap();

        let all = store
            .list(ListOptions {
                since: 0,
                limit: 10,
            })
            .await
            .unwrap();
        let order: Vec<i64> = all.iter().map(|s| s.id.timestamp).collect();
        assert_eq!(order, vec![100, 200, 300]);

        let recent = store
            .list(ListOptions {
                since: 200,
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id.cluster_id, "gamma");
    }

    #[tokio::test]
    async fn test_same_id_merges_registers() {
        let store = InMemorySketchStore::new();
        store.store(stored("alpha", 100, 0..1000)).await.unwrap();
        store.store(stored("alpha", 100, 1000..2000)).await.unwrap();
        assert_eq!(store.len(), 1);

        let merged = store.list(ListOptions { since: 0, limit: 1 }).await.unwrap();
        let estimate = merged[0].sketch.count() as f64;
        assert!((estimate - 2000.0).abs() / 2000.0 < 0.05, "estimate {}", estimate);
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let store = InMemorySketchStore::with_capacity_limit(1);
        store.store(stored("alpha", 100, 0..1)).await.unwrap();
        assert_eq!(
            store.store(stored("beta", 100, 0..1)).await,
            Err(StoreError::CapacityExceeded { max: 1 })
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemorySketchStore::new();
        assert_eq!(store.stats().await.unwrap().total_sketches, 0);

        store.store(stored("alpha", 100, 0..1)).await.unwrap();
        store.store(stored("alpha", 250, 0..1)).await.unwrap();
        store.store(stored("beta", 150, 0..1)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_sketches, 3);
        assert_eq!(stats.clusters, 2);
        assert_eq!(stats.antibodies, 2);
        assert_eq!(stats.oldest_timestamp, 100);
        assert_eq!(stats.newest_timestamp, 250);
        assert_eq!(stats.total_bytes, 3 * (19 + (1 << 14)));
    }
}
