//! Human-readable labels for the protocol enumerations.

use super::{Phase, SignatureType, Status};

impl SignatureType {
    /// Wire label (`ioc-hash`, `behavioral`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureType::Unknown => "unknown",
            SignatureType::IocHash => "ioc-hash",
            SignatureType::Behavioral => "behavioral",
            SignatureType::Network => "network",
            SignatureType::Process => "process",
        }
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Shadow => "shadow",
            Phase::Staged => "staged",
            Phase::Canary => "canary",
            Phase::Enforce => "enforce",
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unspecified => "UNSPECIFIED",
            Status::Success => "SUCCESS",
            Status::RateLimited => "RATE_LIMITED",
            Status::InvalidSignature => "INVALID_SIGNATURE",
            Status::ReplayDetected => "REPLAY_DETECTED",
            Status::TrustBelowThreshold => "TRUST_BELOW_THRESHOLD",
            Status::InvalidSketch => "INVALID_SKETCH",
            Status::InternalError => "INTERNAL_ERROR",
            Status::InvalidRequest => "INVALID_REQUEST",
        }
    }
}
