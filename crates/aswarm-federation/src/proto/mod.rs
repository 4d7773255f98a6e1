//! # Federation Wire Protocol
//!
//! Protocol-buffer messages exchanged between clusters, generated by
//! `prost-build` from `proto/federation.proto`. Tags are stable and must
//! never be renumbered.
//!
//! ## Determinism
//!
//! `prost` encodes known fields in ascending tag order and none of these
//! messages contain maps, so identical logical content always yields
//! identical bytes. Sign views rely on this.

include!(concat!(env!("OUT_DIR"), "/aswarm.federation.v1.rs"));

mod auth;
mod frames;
mod labels;

pub use auth::AuthTag;

/// Capabilities advertised by this implementation in health reports.
pub const CAPABILITIES: &[&str] = &[
    "sketch-share",
    "sketch-request",
    "health-report",
    "federation-stream",
    "auth-ed25519",
    "auth-hmac-sha256",
];
