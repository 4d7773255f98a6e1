//! Outbound Ports (Driven Ports)
//!
//! Dependencies the federation service needs from its environment.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::domain::errors::StoreError;
use crate::domain::sketch::CardinalitySketch;
use crate::proto::{Phase, SketchMetadata, StoreStats};

/// Store key: the sending cluster, rollout phase and request timestamp.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SketchId {
    pub cluster_id: String,
    pub phase: Phase,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// A sketch with the metadata it was attested under.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredSketch {
    pub id: SketchId,
    pub metadata: SketchMetadata,
    pub sketch: CardinalitySketch,
}

/// Query bounds for [`SketchStore::list`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Inclusive lower bound on `SketchId::timestamp`.
    pub since: i64,
    pub limit: usize,
}

/// Sketch persistence (Driven Port)
///
/// Each call is atomic: it either applies fully or fails.
#[async_trait]
pub trait SketchStore: Send + Sync {
    async fn store(&self, sketch: StoredSketch) -> Result<(), StoreError>;

    /// Oldest first, at most `options.limit` entries.
    async fn list(&self, options: ListOptions) -> Result<Vec<StoredSketch>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Peer key lookup (Driven Port)
pub trait Keyring: Send + Sync {
    /// Shared HMAC secret for `cluster_id`.
    fn hmac_key(&self, cluster_id: &str) -> Option<Zeroizing<Vec<u8>>>;

    /// Ed25519 public key for `cluster_id` (32 bytes when well formed).
    fn ed25519_public_key(&self, cluster_id: &str) -> Option<Vec<u8>>;
}

/// Wall-clock source (Driven Port)
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}
