//! Domain Layer - Pure federation logic
//!
//! This layer contains:
//! - Cardinality sketch and its binary format
//! - Attestation codec (pack / unpack / compatibility)
//! - Per-cluster rate limiter, replay guard and trust registry
//! - Configuration and error types
//!
//! RULES:
//! - No I/O operations
//! - No async code
//! - Time is passed in by the caller

pub mod codec;
pub mod config;
pub mod errors;
pub mod rate_limit;
pub mod replay;
pub mod sketch;
pub mod trust;

pub use codec::{pack, repack, sketch_hash, unpack, validate_compatibility};
pub use config::{FederationConfig, DEFAULT_LISTEN_PORT, DEFAULT_REQUEST_LIMIT_MAX};
pub use errors::{
    AuthError, CodecError, ConfigError, FederationError, KeyringError, ReplayError, SketchError,
    StoreError, TrustError,
};
pub use rate_limit::{RateDecision, RateLimiter};
pub use replay::ReplayGuard;
pub use sketch::{CardinalitySketch, SketchConfig, SketchHeader, SketchVersion, HEADER_LEN};
pub use trust::{RejectionPenalty, TrustConfig, TrustRegistry, TrustScore};
