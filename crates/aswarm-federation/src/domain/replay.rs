//! # Per-Cluster Replay Guard
//!
//! Rejects duplicate and out-of-order requests.
//!
//! ## Security Design
//!
//! Each cluster has:
//! - a monotonic **watermark**: any request older than the newest timestamp
//!   seen so far is rejected, even with a fresh token, so an old message
//!   re-signed with a new nonce cannot slip through;
//! - a **token set** with TTL expiry: a token may be used once while live.
//!
//! Timestamps further than `max_skew` ahead of the local clock are refused
//! and never move the watermark.
//!
//! Expired tokens are collected on write, at most `gc_scan_limit` per call,
//! so cleanup cost per request stays bounded without a background sweep.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use super::errors::ReplayError;

/// Default token lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default number of expired entries examined per accepted request.
pub const DEFAULT_GC_SCAN_LIMIT: usize = 64;

/// Default tolerance for peer clocks running ahead of ours.
pub const DEFAULT_MAX_SKEW: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct ReplayRecord {
    watermark: i64,
    /// token -> expiry (epoch ms)
    tokens: HashMap<Vec<u8>, i64>,
    /// Insertion order; expiries are non-decreasing for a fixed TTL.
    expiry_queue: VecDeque<(Vec<u8>, i64)>,
}

impl ReplayRecord {
    fn collect_expired(&mut self, now_ms: i64, limit: usize) -> usize {
        let mut removed = 0;
        while removed < limit {
            match self.expiry_queue.front() {
                Some((_, expiry)) if *expiry <= now_ms => {}
                _ => break,
            }
            if let Some((token, expiry)) = self.expiry_queue.pop_front() {
                // A token re-recorded after expiry has a newer entry; keep it.
                if self.tokens.get(&token) == Some(&expiry) {
                    self.tokens.remove(&token);
                }
                removed += 1;
            }
        }
        removed
    }
}

/// Watermark plus TTL token set, per cluster.
#[derive(Debug)]
pub struct ReplayGuard {
    ttl_ms: i64,
    max_skew_ms: i64,
    gc_scan_limit: usize,
    records: Mutex<HashMap<String, ReplayRecord>>,
}

impl ReplayGuard {
    pub fn new(ttl: Duration, gc_scan_limit: usize) -> Self {
        Self {
            ttl_ms: duration_ms(ttl),
            max_skew_ms: duration_ms(DEFAULT_MAX_SKEW),
            gc_scan_limit,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Accept timestamps at most `max_skew` ahead of `now_ms`.
    pub fn with_max_skew(mut self, max_skew: Duration) -> Self {
        self.max_skew_ms = duration_ms(max_skew);
        self
    }

    /// Check `(timestamp, token)` for `cluster_id` and record it on success.
    pub fn check(
        &self,
        cluster_id: &str,
        timestamp: i64,
        token: &[u8],
        now_ms: i64,
    ) -> Result<(), ReplayError> {
        let limit = now_ms.saturating_add(self.max_skew_ms);
        if timestamp > limit {
            return Err(ReplayError::FromFuture { timestamp, limit });
        }

        let mut records = self.records.lock();
        let record = records.entry(cluster_id.to_string()).or_default();

        if timestamp < record.watermark {
            return Err(ReplayError::Stale {
                timestamp,
                watermark: record.watermark,
            });
        }
        record.watermark = timestamp;

        if token.is_empty() {
            return Err(ReplayError::MissingToken);
        }
        if let Some(&expires_at) = record.tokens.get(token) {
            if expires_at > now_ms {
                return Err(ReplayError::Replayed { expires_at });
            }
        }

        let expiry = now_ms.saturating_add(self.ttl_ms);
        record.tokens.insert(token.to_vec(), expiry);
        record.expiry_queue.push_back((token.to_vec(), expiry));
        record.collect_expired(now_ms, self.gc_scan_limit);
        Ok(())
    }

    /// Current watermark for `cluster_id` (0 if never seen).
    pub fn watermark(&self, cluster_id: &str) -> i64 {
        self.records
            .lock()
            .get(cluster_id)
            .map(|r| r.watermark)
            .unwrap_or(0)
    }

    /// Number of live-or-uncollected tokens for `cluster_id`.
    pub fn tracked_tokens(&self, cluster_id: &str) -> usize {
        self.records
            .lock()
            .get(cluster_id)
            .map(|r| r.tokens.len())
            .unwrap_or(0)
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_GC_SCAN_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn guard() -> ReplayGuard {
        ReplayGuard::new(Duration::from_secs(600), 4)
    }

    #[test]
    fn test_fresh_token_accepted_then_replay_rejected() {
        let guard = guard();
        assert!(guard.check("alpha", 100, b"tok-1", NOW).is_ok());
        assert!(matches!(
            guard.check("alpha", 100, b"tok-1", NOW),
            Err(ReplayError::Replayed { .. })
        ));
    }

    #[test]
    fn test_timestamp_below_watermark_rejected_even_with_new_token() {
        let guard = guard();
        guard.check("alpha", 200, b"tok-1", NOW).unwrap();

        let err = guard.check("alpha", 199, b"brand-new", NOW).unwrap_err();
        assert_eq!(
            err,
            ReplayError::Stale {
                timestamp: 199,
                watermark: 200
            }
        );
    }

    #[test]
    fn test_equal_timestamp_with_fresh_token_accepted() {
        let guard = guard();
        guard.check("alpha", 200, b"tok-1", NOW).unwrap();
        assert!(guard.check("alpha", 200, b"tok-2", NOW).is_ok());
        assert_eq!(guard.watermark("alpha"), 200);
    }

    #[test]
    fn test_empty_token_rejected() {
        let guard = guard();
        assert_eq!(
            guard.check("alpha", 1, b"", NOW),
            Err(ReplayError::MissingToken)
        );
    }

    #[test]
    fn test_clusters_are_isolated() {
        let guard = guard();
        guard.check("alpha", 500, b"shared", NOW).unwrap();
        assert!(guard.check("beta", 1, b"shared", NOW).is_ok());
        assert_eq!(guard.watermark("beta"), 1);
    }

    #[test]
    fn test_expired_token_may_be_reused() {
        let guard = guard();
        guard.check("alpha", 1, b"tok", NOW).unwrap();
        let later = NOW + 600_000;
        assert!(guard.check("alpha", 2, b"tok", later).is_ok());
    }

    #[test]
    fn test_gc_is_bounded_per_call() {
        let guard = guard();
        for i in 0..10u8 {
            guard.check("alpha", 1, &[i + 1], NOW).unwrap();
        }
        assert_eq!(guard.tracked_tokens("alpha"), 10);

        // All ten expired; one accepted request collects at most four.
        let later = NOW + 600_001;
        guard.check("alpha", 2, b"next", later).unwrap();
        assert_eq!(guard.tracked_tokens("alpha"), 7);

        guard.check("alpha", 3, b"again", later).unwrap();
        assert_eq!(guard.tracked_tokens("alpha"), 4);
    }

    #[test]
    fn test_future_timestamp_rejected_without_moving_watermark() {
        let guard = guard().with_max_skew(Duration::from_secs(60));
        guard.check("alpha", NOW, b"a", NOW).unwrap();

        let err = guard.check("alpha", i64::MAX, b"b", NOW).unwrap_err();
        assert_eq!(
            err,
            ReplayError::FromFuture {
                timestamp: i64::MAX,
                limit: NOW + 60_000
            }
        );
        assert_eq!(guard.watermark("alpha"), NOW);

        // Still within tolerance, and the cluster is not locked out.
        assert!(guard.check("alpha", NOW + 60_000, b"c", NOW).is_ok());
        assert!(guard.check("alpha", NOW + 60_001, b"d", NOW).is_err());
    }

    #[test]
    fn test_newer_timestamp_advances_watermark() {
        let guard = guard();
        guard.check("alpha", 10, b"a", NOW).unwrap();
        guard.check("alpha", 20, b"b", NOW).unwrap();
        assert_eq!(guard.watermark("alpha"), 20);
        assert!(guard.check("alpha", 15, b"c", NOW).is_err());
    }
}
