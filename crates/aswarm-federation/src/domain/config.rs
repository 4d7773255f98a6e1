//! Federation service configuration and validation
//!
//! All tunables are explicit; there are no process-wide defaults hidden in
//! statics. Environment overrides are applied by the node binary.

use std::time::Duration;

use super::errors::ConfigError;
use super::rate_limit::DEFAULT_CAPACITY;
use super::replay::{DEFAULT_GC_SCAN_LIMIT, DEFAULT_MAX_SKEW, DEFAULT_TTL};
use super::sketch::SketchConfig;
use super::trust::TrustConfig;

/// Default TCP port of the federation listener.
pub const DEFAULT_LISTEN_PORT: u16 = 9443;

/// Upper bound on sketches returned by one `RequestSketch`.
pub const DEFAULT_REQUEST_LIMIT_MAX: u32 = 100;

/// Federation service configuration
#[derive(Clone, Debug)]
pub struct FederationConfig {
    /// Identity of this cluster. Peers may not claim it.
    pub cluster_id: String,
    pub listen_port: u16,
    /// Requests per peer per minute; non-positive values clamp to 1.
    pub rate_limit_per_minute: i64,
    /// Replay token lifetime.
    pub replay_ttl: Duration,
    /// Expired tokens examined per accepted request.
    pub replay_gc_scan_limit: usize,
    /// How far a request timestamp may run ahead of the local clock.
    pub max_clock_skew: Duration,
    /// Cap (and default) for `RequestSketch.limit`.
    pub request_limit_max: u32,
    /// Parameters every accepted sketch must match.
    pub sketch: SketchConfig,
    pub trust: TrustConfig,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            cluster_id: String::new(),
            listen_port: DEFAULT_LISTEN_PORT,
            rate_limit_per_minute: i64::from(DEFAULT_CAPACITY),
            replay_ttl: DEFAULT_TTL,
            replay_gc_scan_limit: DEFAULT_GC_SCAN_LIMIT,
            max_clock_skew: DEFAULT_MAX_SKEW,
            request_limit_max: DEFAULT_REQUEST_LIMIT_MAX,
            sketch: SketchConfig::default(),
            trust: TrustConfig::default(),
        }
    }
}

impl FederationConfig {
    /// Default configuration for `cluster_id`.
    pub fn for_cluster(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_id.trim().is_empty() {
            return Err(ConfigError::MissingClusterId);
        }
        if self.replay_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "replay_ttl",
                reason: "must be greater than zero".into(),
            });
        }
        if self.replay_gc_scan_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "replay_gc_scan_limit",
                reason: "must be greater than zero".into(),
            });
        }
        if self.request_limit_max == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_limit_max",
                reason: "must be greater than zero".into(),
            });
        }
        self.sketch.validate()?;
        self.trust.validate().map_err(ConfigError::Trust)?;
        Ok(())
    }

    /// Effective page size for a `RequestSketch.limit` value.
    pub fn effective_limit(&self, requested: u32) -> usize {
        if requested == 0 {
            self.request_limit_max as usize
        } else {
            requested.min(self.request_limit_max) as usize
        }
    }
}
