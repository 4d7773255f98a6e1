//! # A-SWARM Federation
//!
//! Cross-cluster exchange of threat-intelligence cardinality sketches
//! between mutually distrustful clusters.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `CardinalitySketch`: HyperLogLog with a versioned binary header
//!   - `codec`: pack / unpack attestations, incompatible vs corrupt
//!   - `RateLimiter`, `ReplayGuard`, `TrustRegistry`: per-peer defenses
//!
//! - **Security** (`security/`): sign views, domain-separated signing,
//!   Ed25519 and HMAC-SHA256 verification, replay uniqueness keys
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `FederationApi`: Driving port (the four RPC operations)
//!   - `SketchStore`, `Keyring`, `TimeSource`: Driven ports
//!
//! - **Service Layer** (`service/`): `FederationService` implements
//!   `FederationApi`
//!
//! - **Adapters Layer** (`adapters/`): in-memory store, JSON keyring,
//!   clocks, length-delimited TCP transport
//!
//! ## Security
//!
//! Every request passes, in order: rate limit, signature, replay guard,
//! trust gate (state-changing requests only), sketch validation. Each
//! failure maps to its own response status.
//!
//! ## Invariants
//!
//! - A request older than a peer's watermark is rejected whatever its nonce
//! - Incompatible sketches are never merged
//! - Identical logical content always encodes to identical sign-view bytes
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aswarm_federation::{
//!     FederationConfig, FederationService, InMemorySketchStore, StaticKeyring, SystemTimeSource,
//! };
//!
//! let keyring = StaticKeyring::new().with_hmac_key("alpha", b"shared-secret".to_vec());
//! let service = FederationService::new(
//!     FederationConfig::for_cluster("beta"),
//!     Arc::new(InMemorySketchStore::new()),
//!     Arc::new(keyring),
//!     Arc::new(SystemTimeSource),
//! )?;
//! ```

pub mod adapters;
pub mod client;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod proto;
pub mod security;
pub mod service;

pub use adapters::{InMemorySketchStore, ManualClock, StaticKeyring, SystemTimeSource};
pub use client::RequestFactory;
pub use domain::{
    AuthError, CardinalitySketch, CodecError, ConfigError, FederationConfig, FederationError,
    KeyringError, RejectionPenalty, SketchConfig, SketchError, SketchVersion, StoreError,
    TrustConfig, TrustRegistry, TrustScore,
};
pub use metrics::{FederationMetrics, MetricsSnapshot};
pub use ports::{
    FederationApi, Keyring, ListOptions, SketchId, SketchStore, StoredSketch, TimeSource,
};
pub use security::RequestSigner;
pub use service::FederationService;
