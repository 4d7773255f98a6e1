//! Counters for federation request outcomes
//!
//! One counter per response status plus sketch flow counters. All updates
//! are relaxed atomics; a [`MetricsSnapshot`] is a consistent-enough view
//! for logging and health reports.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::proto::Status;

/// Metrics collector for the federation service
#[derive(Debug, Default)]
pub struct FederationMetrics {
    pub success: AtomicU64,
    pub rate_limited: AtomicU64,
    pub invalid_signature: AtomicU64,
    pub replay_detected: AtomicU64,
    pub trust_below_threshold: AtomicU64,
    pub invalid_sketch: AtomicU64,
    pub internal_error: AtomicU64,
    pub invalid_request: AtomicU64,
    /// Sketches accepted into the store
    pub sketches_stored: AtomicU64,
    /// Sketches returned to peers
    pub sketches_exported: AtomicU64,
    /// Stored sketches skipped during export because they failed to re-pack
    pub sketches_skipped: AtomicU64,
    /// Frames handled on federation streams
    pub stream_frames: AtomicU64,
}

impl FederationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response outcome.
    pub fn record_status(&self, status: Status) {
        let counter = match status {
            Status::Success => &self.success,
            Status::RateLimited => &self.rate_limited,
            Status::InvalidSignature => &self.invalid_signature,
            Status::ReplayDetected => &self.replay_detected,
            Status::TrustBelowThreshold => &self.trust_below_threshold,
            Status::InvalidSketch => &self.invalid_sketch,
            Status::InternalError => &self.internal_error,
            Status::InvalidRequest | Status::Unspecified => &self.invalid_request,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.sketches_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exported(&self, count: usize) {
        self.sketches_exported
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.sketches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_frame(&self) {
        self.stream_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            success: self.success.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            invalid_signature: self.invalid_signature.load(Ordering::Relaxed),
            replay_detected: self.replay_detected.load(Ordering::Relaxed),
            trust_below_threshold: self.trust_below_threshold.load(Ordering::Relaxed),
            invalid_sketch: self.invalid_sketch.load(Ordering::Relaxed),
            internal_error: self.internal_error.load(Ordering::Relaxed),
            invalid_request: self.invalid_request.load(Ordering::Relaxed),
            sketches_stored: self.sketches_stored.load(Ordering::Relaxed),
            sketches_exported: self.sketches_exported.load(Ordering::Relaxed),
            sketches_skipped: self.sketches_skipped.load(Ordering::Relaxed),
            stream_frames: self.stream_frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FederationMetrics`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub success: u64,
    pub rate_limited: u64,
    pub invalid_signature: u64,
    pub replay_detected: u64,
    pub trust_below_threshold: u64,
    pub invalid_sketch: u64,
    pub internal_error: u64,
    pub invalid_request: u64,
    pub sketches_stored: u64,
    pub sketches_exported: u64,
    pub sketches_skipped: u64,
    pub stream_frames: u64,
}

impl MetricsSnapshot {
    /// Responses of any status.
    pub fn total_requests(&self) -> u64 {
        self.success
            + self.rate_limited
            + self.invalid_signature
            + self.replay_detected
            + self.trust_below_threshold
            + self.invalid_sketch
            + self.internal_error
            + self.invalid_request
    }

    /// Responses other than `SUCCESS`.
    pub fn rejected(&self) -> u64 {
        self.total_requests() - self.success
    }
}
