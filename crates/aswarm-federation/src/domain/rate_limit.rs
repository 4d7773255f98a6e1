//! # Per-Cluster Rate Limiter
//!
//! Token bucket per peer cluster, refilled to capacity on each wall-clock
//! minute boundary (fixed window, not sliding).
//!
//! Buckets are created lazily on first request and never removed; the
//! number of peer clusters is small and pre-configured.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Refill window in milliseconds.
pub const WINDOW_MS: i64 = 60_000;

/// Default requests per window per cluster.
pub const DEFAULT_CAPACITY: u32 = 100;

/// Result of a rate-limit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub granted: bool,
    /// Epoch milliseconds at which the bucket refills.
    pub reset_at: i64,
    pub remaining: u32,
}

#[derive(Debug)]
struct RateBucket {
    tokens: u32,
    reset_at: i64,
}

/// Token-bucket limiter keyed by cluster id.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    buckets: Mutex<HashMap<String, RateBucket>>,
}

impl RateLimiter {
    /// Create a limiter; non-positive capacities are clamped to 1.
    pub fn new(capacity: i64) -> Self {
        let capacity = capacity.clamp(1, i64::from(u32::MAX)) as u32;
        Self {
            capacity,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Consume one token for `cluster_id` if available.
    pub fn allow(&self, cluster_id: &str, now_ms: i64) -> RateDecision {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(cluster_id.to_string())
            .or_insert_with(|| RateBucket {
                tokens: self.capacity,
                reset_at: next_boundary(now_ms),
            });

        if now_ms >= bucket.reset_at {
            bucket.tokens = self.capacity;
            bucket.reset_at = next_boundary(now_ms);
        }

        let granted = bucket.tokens > 0;
        if granted {
            bucket.tokens -= 1;
        }

        RateDecision {
            granted,
            reset_at: bucket.reset_at,
            remaining: bucket.tokens,
        }
    }

    /// Highest fraction of capacity consumed by any cluster in the current window.
    pub fn load(&self, now_ms: i64) -> f64 {
        let buckets = self.buckets.lock();
        buckets
            .values()
            .filter(|b| b.reset_at > now_ms)
            .map(|b| f64::from(self.capacity - b.tokens) / f64::from(self.capacity))
            .fold(0.0, f64::max)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(i64::from(DEFAULT_CAPACITY))
    }
}

fn next_boundary(now_ms: i64) -> i64 {
    (now_ms.div_euclid(WINDOW_MS) + 1) * WINDOW_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const T0: i64 = 1_700_000_040_000;

    #[test]
    fn test_exhausted_bucket_blocks_only_that_cluster() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.allow("alpha", T0).granted);
        }

        let denied = limiter.allow("alpha", T0);
        assert!(!denied.granted);
        assert_eq!(denied.remaining, 0);

        let other = limiter.allow("beta", T0);
        assert!(other.granted);
        assert_eq!(other.remaining, 2);
    }

    #[test]
    fn test_refills_on_minute_boundary() {
        let limiter = RateLimiter::new(1);
        let first = limiter.allow("alpha", T0);
        assert!(first.granted);
        assert_eq!(first.reset_at, 1_700_000_100_000);

        assert!(!limiter.allow("alpha", first.reset_at - 1).granted);

        let refilled = limiter.allow("alpha", first.reset_at);
        assert!(refilled.granted);
        assert_eq!(refilled.reset_at, first.reset_at + WINDOW_MS);
    }

    #[test]
    fn test_non_positive_capacity_is_clamped() {
        assert_eq!(RateLimiter::new(0).capacity(), 1);
        assert_eq!(RateLimiter::new(-5).capacity(), 1);

        let limiter = RateLimiter::new(0);
        assert!(limiter.allow("alpha", T0).granted);
        assert!(!limiter.allow("alpha", T0).granted);
    }

    #[test]
    fn test_load_tracks_busiest_cluster() {
        let limiter = RateLimiter::new(4);
        assert_eq!(limiter.load(T0), 0.0);
        limiter.allow("alpha", T0);
        limiter.allow("alpha", T0);
        limiter.allow("beta", T0);
        assert!((limiter.load(T0) - 0.5).abs() < f64::EPSILON);
        assert_eq!(limiter.load(T0 + WINDOW_MS), 0.0);
    }

    #[test]
    fn test_concurrent_requests_never_exceed_capacity() {
        let limiter = Arc::new(RateLimiter::new(100));
        let granted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    scope.spawn(move || {
                        (0..50)
                            .filter(|_| limiter.allow("alpha", T0).granted)
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(granted, 100);
    }
}
