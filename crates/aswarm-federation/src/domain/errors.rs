//! # Domain Errors
//!
//! Error types for the federation subsystem, one enum per concern.
//!
//! Codec failures keep *incompatibility* (peer is misconfigured, reconfigure
//! to match) separate from *corruption* (possible tampering, investigate).

use thiserror::Error;

/// Errors from the cardinality sketch itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SketchError {
    #[error("Invalid precision: {precision} (must be between {min} and {max})")]
    InvalidPrecision { precision: u8, min: u8, max: u8 },

    #[error("Unsupported sketch version: {0}")]
    UnsupportedVersion(String),

    #[error("Sketch too short: {len} bytes (header is {header} bytes)")]
    Truncated { len: usize, header: usize },

    #[error("Header mismatch on {field}: expected {expected}, got {actual}")]
    HeaderMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Unsupported sketch flags: {0:#04x}")]
    UnsupportedFlags(u8),

    #[error("Register length {actual} does not match precision (expected {expected})")]
    RegisterLength { expected: usize, actual: usize },

    #[error("Payload length {actual} does not match header (expected {expected})")]
    PayloadLength { expected: usize, actual: usize },

    #[error("Register {index} holds out-of-range value {value}")]
    InvalidRegister { index: usize, value: u8 },

    #[error("Cannot merge sketches with different configurations")]
    MergeMismatch,
}

/// Errors from packing and unpacking attestations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Required metadata missing or malformed.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Sketch built with different structural parameters than ours.
    #[error("Incompatible sketch: {0}")]
    Incompatible(String),

    /// Payload bytes are damaged or were altered.
    #[error("Corrupt sketch: {0}")]
    Corrupt(String),
}

/// Authentication failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no auth provided")]
    NoAuth,

    #[error("no {kind} key for cluster {cluster_id}")]
    UnknownKey {
        kind: &'static str,
        cluster_id: String,
    },

    #[error("invalid {kind} key for cluster {cluster_id}")]
    InvalidKey {
        kind: &'static str,
        cluster_id: String,
    },

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("hmac verification failed")]
    HmacMismatch,

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Replay guard rejections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Stale request: timestamp {timestamp} is behind watermark {watermark}")]
    Stale { timestamp: i64, watermark: i64 },

    #[error("Request from the future: timestamp {timestamp} exceeds {limit}")]
    FromFuture { timestamp: i64, limit: i64 },

    #[error("Missing uniqueness token")]
    MissingToken,

    #[error("Replayed request (token seen, expires at {expires_at})")]
    Replayed { expires_at: i64 },
}

/// Trust gate rejection.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Trust below threshold for {cluster_id}: reliability {reliability:.3} < {threshold:.3}")]
pub struct TrustError {
    pub cluster_id: String,
    pub reliability: f64,
    pub threshold: f64,
}

/// Sketch store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store capacity exceeded: {max} sketches")]
    CapacityExceeded { max: usize },

    #[error("Sketch error: {0}")]
    Sketch(#[from] SketchError),
}

/// Keyring loading failures.
#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("Failed to read keyring: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse keyring: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid key for cluster {cluster_id}: {reason}")]
    InvalidKey { cluster_id: String, reason: String },
}

/// Configuration validation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Cluster id must not be empty")]
    MissingClusterId,

    #[error("Invalid sketch configuration: {0}")]
    Sketch(#[from] SketchError),

    #[error("Invalid trust configuration: {0}")]
    Trust(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Structural and transport errors of the federation service.
///
/// Security outcomes are never reported here; they travel as response
/// status codes.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stream receive failed: {0}")]
    Receive(String),

    #[error("Stream send failed: {0}")]
    Send(String),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
