//! # Federation Service
//!
//! Request pipeline for `ShareSketch`:
//!
//! 1. Structural check (non-empty, not our own cluster id) -> `Err`
//! 2. Rate limit -> `RATE_LIMITED`
//! 3. Signature -> `INVALID_SIGNATURE`
//! 4. Replay guard -> `REPLAY_DETECTED`
//! 5. Trust gate -> `TRUST_BELOW_THRESHOLD`
//! 6. Codec unpack -> `INVALID_SKETCH`
//! 7. Store -> `INTERNAL_ERROR` on failure
//! 8. Trust success -> `SUCCESS`
//!
//! `RequestSketch` runs steps 1-5 then lists the store; `ReportHealth` runs
//! steps 1-4 and never touches the store beyond reading its statistics.
//!
//! Security outcomes are response statuses, not `Err`, so peers can back
//! off without treating them as protocol faults.

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::domain::codec;
use crate::domain::errors::{CodecError, ConfigError, FederationError};
use crate::domain::{FederationConfig, RateDecision, RateLimiter, ReplayGuard, TrustRegistry};
use crate::metrics::FederationMetrics;
use crate::ports::{
    FederationApi, Keyring, ListOptions, SketchId, SketchStore, StoredSketch, TimeSource,
};
use crate::proto::{
    FederationFrame, HealthReportRequest, HealthReportResponse, RequestSketchRequest,
    RequestSketchResponse, ShareSketchRequest, ShareSketchResponse, SketchAttestation, Status,
    StoreStats, CAPABILITIES,
};
use crate::security::{self, SignedRequest};

/// Outcome of the shared admission steps.
pub(crate) struct Rejection {
    pub status: Status,
    pub message: String,
}

impl Rejection {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Federation service implementation
///
/// Implements the `FederationApi` port using injected dependencies. All
/// per-peer state (rate buckets, replay records, trust scores) is owned by
/// the instance.
pub struct FederationService<S, K, T>
where
    S: SketchStore,
    K: Keyring,
    T: TimeSource,
{
    config: FederationConfig,
    store: Arc<S>,
    keyring: Arc<K>,
    clock: Arc<T>,
    rate_limiter: RateLimiter,
    replay_guard: ReplayGuard,
    trust: TrustRegistry,
    metrics: Arc<FederationMetrics>,
}

impl<S, K, T> FederationService<S, K, T>
where
    S: SketchStore,
    K: Keyring,
    T: TimeSource,
{
    /// Create a service; fails if `config` does not validate.
    pub fn new(
        config: FederationConfig,
        store: Arc<S>,
        keyring: Arc<K>,
        clock: Arc<T>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            rate_limiter: RateLimiter::new(config.rate_limit_per_minute),
            replay_guard: ReplayGuard::new(config.replay_ttl, config.replay_gc_scan_limit)
                .with_max_skew(config.max_clock_skew),
            trust: TrustRegistry::new(config.trust.clone()),
            metrics: Arc::new(FederationMetrics::new()),
            config,
            store,
            keyring,
            clock,
        })
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn cluster_id(&self) -> &str {
        &self.config.cluster_id
    }

    pub fn trust(&self) -> &TrustRegistry {
        &self.trust
    }

    pub fn metrics(&self) -> Arc<FederationMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn check_origin(&self, cluster_id: &str) -> Result<(), FederationError> {
        let reason = if cluster_id.is_empty() {
            "cluster_id is empty"
        } else if cluster_id == self.config.cluster_id {
            "cluster_id refers to the receiving cluster"
        } else {
            return Ok(());
        };
        self.metrics.record_status(Status::InvalidRequest);
        warn!(cluster_id, reason, "Rejected malformed federation request");
        Err(FederationError::InvalidRequest(reason.to_string()))
    }

    fn penalize(&self, cluster_id: &str, authenticated: bool) {
        if self.config.trust.rejection_penalty.applies(authenticated) {
            let score = self.trust.update_on_outcome(cluster_id, false);
            debug!(cluster_id, reliability = score.reliability, "Trust penalty applied");
        }
    }

    /// Steps 2-4: rate limit, signature, replay.
    fn admit<R: SignedRequest>(
        &self,
        request: &R,
        now_ms: i64,
    ) -> (RateDecision, Result<(), Rejection>) {
        let cluster_id = request.cluster_id();

        let rate = self.rate_limiter.allow(cluster_id, now_ms);
        if !rate.granted {
            warn!(cluster_id, reset_at = rate.reset_at, "Rate limit exceeded");
            return (
                rate,
                Err(Rejection::new(Status::RateLimited, "rate limit exceeded")),
            );
        }

        if let Err(e) = security::verify(self.keyring.as_ref(), request) {
            warn!(cluster_id, reason = %e, "Signature verification failed");
            self.penalize(cluster_id, false);
            return (
                rate,
                Err(Rejection::new(Status::InvalidSignature, e.to_string())),
            );
        }

        let token = request.uniqueness_key();
        if let Err(e) = self
            .replay_guard
            .check(cluster_id, request.timestamp(), &token, now_ms)
        {
            warn!(cluster_id, reason = %e, "Replay detected");
            self.penalize(cluster_id, true);
            return (
                rate,
                Err(Rejection::new(Status::ReplayDetected, e.to_string())),
            );
        }

        (rate, Ok(()))
    }

    /// Step 5.
    fn gate(&self, cluster_id: &str) -> Result<(), Rejection> {
        self.trust.check_gate(cluster_id).map(|_| ()).map_err(|e| {
            warn!(
                cluster_id,
                reliability = e.reliability,
                threshold = e.threshold,
                "Trust below threshold"
            );
            Rejection::new(Status::TrustBelowThreshold, e.to_string())
        })
    }

    async fn handle_share(&self, request: ShareSketchRequest) -> ShareSketchResponse {
        let now = self.clock.now_millis();
        let (rate, admitted) = self.admit(&request, now);
        let reply = |status: Status, message: String| ShareSketchResponse {
            status: status as i32,
            receiver_cluster_id: self.config.cluster_id.clone(),
            processed_at: now,
            message,
            rate_limit_reset: rate.reset_at,
            rate_limit_remaining: rate.remaining,
        };
        let cluster_id = request.cluster_id.as_str();

        if let Err(rejection) = admitted.and_then(|()| self.gate(cluster_id)) {
            return reply(rejection.status, rejection.message);
        }

        let sketch = match codec::unpack(request.attestation.as_ref(), &self.config.sketch) {
            Ok(sketch) => sketch,
            Err(e) => {
                warn!(cluster_id, reason = %e, "Invalid sketch");
                if !matches!(e, CodecError::Incompatible(_)) {
                    self.penalize(cluster_id, true);
                }
                return reply(Status::InvalidSketch, e.to_string());
            }
        };

        // The signed request phase keys the store; exports must agree with it.
        let mut metadata = request
            .attestation
            .as_ref()
            .and_then(|a| a.metadata.clone())
            .unwrap_or_default();
        metadata.phase = request.phase;
        let stored = StoredSketch {
            id: SketchId {
                cluster_id: cluster_id.to_string(),
                phase: request.phase(),
                timestamp: request.timestamp,
            },
            metadata,
            sketch,
        };
        let antibody_id = stored.metadata.antibody_id.clone();

        if let Err(e) = self.store.store(stored).await {
            error!(cluster_id, error = %e, "Failed to store sketch");
            return reply(Status::InternalError, "failed to store sketch".to_string());
        }
        self.metrics.record_stored();

        let score = self.trust.update_on_outcome(cluster_id, true);
        debug!(
            cluster_id,
            antibody_id = %antibody_id,
            sequence = request.sequence,
            reliability = score.reliability,
            "Accepted shared sketch"
        );
        reply(Status::Success, String::new())
    }

    async fn handle_request(&self, request: RequestSketchRequest) -> RequestSketchResponse {
        let now = self.clock.now_millis();
        let (rate, admitted) = self.admit(&request, now);
        let reply = |status: Status, message: String, sketches: Vec<SketchAttestation>| {
            RequestSketchResponse {
                status: status as i32,
                cluster_id: self.config.cluster_id.clone(),
                server_timestamp: now,
                sketches,
                message,
                rate_limit_reset: rate.reset_at,
                rate_limit_remaining: rate.remaining,
            }
        };
        let cluster_id = request.cluster_id.as_str();

        if let Err(rejection) = admitted.and_then(|()| self.gate(cluster_id)) {
            return reply(rejection.status, rejection.message, Vec::new());
        }

        let options = ListOptions {
            since: request.since,
            limit: self.config.effective_limit(request.limit),
        };
        let stored = match self.store.list(options).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(cluster_id, error = %e, "Failed to list sketches");
                return reply(
                    Status::InternalError,
                    "failed to list sketches".to_string(),
                    Vec::new(),
                );
            }
        };

        let mut sketches = Vec::with_capacity(stored.len());
        for entry in &stored {
            match codec::repack(&entry.metadata, &entry.sketch) {
                Ok(attestation) => sketches.push(attestation),
                Err(e) => {
                    warn!(
                        cluster_id,
                        source_cluster = %entry.id.cluster_id,
                        timestamp = entry.id.timestamp,
                        reason = %e,
                        "Skipping sketch that failed to convert"
                    );
                    self.metrics.record_skipped();
                }
            }
        }
        self.metrics.record_exported(sketches.len());
        debug!(cluster_id, since = request.since, returned = sketches.len(), "Served sketch request");
        reply(Status::Success, String::new(), sketches)
    }

    async fn handle_health(&self, request: HealthReportRequest) -> HealthReportResponse {
        let now = self.clock.now_millis();
        let (rate, admitted) = self.admit(&request, now);
        let reply = |status: Status, message: String, stats: Option<StoreStats>| {
            HealthReportResponse {
                status: status as i32,
                cluster_id: self.config.cluster_id.clone(),
                server_timestamp: now,
                stats,
                capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
                load: self.rate_limiter.load(now),
                message,
                rate_limit_reset: rate.reset_at,
                rate_limit_remaining: rate.remaining,
            }
        };
        let cluster_id = request.cluster_id.as_str();

        if let Err(rejection) = admitted {
            return reply(rejection.status, rejection.message, None);
        }

        match self.store.stats().await {
            Ok(stats) => {
                debug!(cluster_id, peer_capabilities = ?request.capabilities, "Served health report");
                reply(Status::Success, String::new(), Some(stats))
            }
            Err(e) => {
                error!(cluster_id, error = %e, "Failed to read store statistics");
                reply(Status::InternalError, "failed to read store statistics".to_string(), None)
            }
        }
    }
}

#[async_trait]
impl<S, K, T> FederationApi for FederationService<S, K, T>
where
    S: SketchStore + 'static,
    K: Keyring + 'static,
    T: TimeSource + 'static,
{
    async fn share_sketch(
        &self,
        request: ShareSketchRequest,
    ) -> Result<ShareSketchResponse, FederationError> {
        self.check_origin(&request.cluster_id)?;
        let response = self.handle_share(request).await;
        self.metrics.record_status(response.status());
        Ok(response)
    }

    async fn request_sketch(
        &self,
        request: RequestSketchRequest,
    ) -> Result<RequestSketchResponse, FederationError> {
        self.check_origin(&request.cluster_id)?;
        let response = self.handle_request(request).await;
        self.metrics.record_status(response.status());
        Ok(response)
    }

    async fn report_health(
        &self,
        request: HealthReportRequest,
    ) -> Result<HealthReportResponse, FederationError> {
        self.check_origin(&request.cluster_id)?;
        let response = self.handle_health(request).await;
        self.metrics.record_status(response.status());
        Ok(response)
    }

    async fn federation_stream<St>(
        &self,
        inbound: St,
        outbound: mpsc::Sender<FederationFrame>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), FederationError>
    where
        St: Stream<Item = Result<FederationFrame, FederationError>> + Send + Unpin + 'static,
    {
        self.run_stream(inbound, outbound, shutdown).await
    }
}
