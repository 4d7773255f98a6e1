//! Request construction for the sending side.
//!
//! A [`RequestFactory`] stamps each request with the current time, the
//! next sequence number and a fresh nonce, then signs it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::errors::AuthError;
use crate::ports::TimeSource;
use crate::proto::{
    HealthReportRequest, Phase, RequestSketchRequest, ShareSketchRequest, SketchAttestation,
    CAPABILITIES,
};
use crate::security::RequestSigner;

/// Builds signed requests on behalf of one cluster.
pub struct RequestFactory<T: TimeSource> {
    cluster_id: String,
    signer: RequestSigner,
    clock: Arc<T>,
    sequence: AtomicU64,
}

impl<T: TimeSource> RequestFactory<T> {
    pub fn new(cluster_id: impl Into<String>, signer: RequestSigner, clock: Arc<T>) -> Self {
        Self::resume(cluster_id, signer, clock, 0)
    }

    /// Continue numbering after `last_sequence` (e.g. after a reconnect).
    pub fn resume(
        cluster_id: impl Into<String>,
        signer: RequestSigner,
        clock: Arc<T>,
        last_sequence: u64,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            signer,
            clock,
            sequence: AtomicU64::new(last_sequence),
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Last sequence number handed out.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn share_sketch(
        &self,
        attestation: SketchAttestation,
        phase: Phase,
    ) -> Result<ShareSketchRequest, AuthError> {
        let mut request = ShareSketchRequest {
            cluster_id: self.cluster_id.clone(),
            timestamp: self.clock.now_millis(),
            sequence: self.next_sequence(),
            nonce: Vec::new(),
            attestation: Some(attestation),
            phase: phase as i32,
            auth: None,
        };
        self.signer.sign(&mut request)?;
        Ok(request)
    }

    pub fn request_sketch(&self, since: i64, limit: u32) -> Result<RequestSketchRequest, AuthError> {
        let mut request = RequestSketchRequest {
            cluster_id: self.cluster_id.clone(),
            timestamp: self.clock.now_millis(),
            sequence: self.next_sequence(),
            nonce: Vec::new(),
            since,
            limit,
            auth: None,
        };
        self.signer.sign(&mut request)?;
        Ok(request)
    }

    /// Health report advertising this implementation's capabilities.
    pub fn health_report(&self) -> Result<HealthReportRequest, AuthError> {
        let mut request = HealthReportRequest {
            cluster_id: self.cluster_id.clone(),
            timestamp: self.clock.now_millis(),
            sequence: self.next_sequence(),
            nonce: Vec::new(),
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            auth: None,
        };
        self.signer.sign(&mut request)?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ManualClock;
    use crate::proto::AuthTag;
    use crate::security::SignedRequest;

    fn factory() -> RequestFactory<ManualClock> {
        RequestFactory::new(
            "alpha",
            RequestSigner::hmac(b"secret".to_vec()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let factory = factory();
        let a = factory.request_sketch(0, 10).unwrap();
        let b = factory.health_report().unwrap();
        let c = factory.request_sketch(0, 10).unwrap();
        assert_eq!((a.sequence, b.sequence, c.sequence), (1, 2, 3));
        assert_eq!(factory.last_sequence(), 3);
    }

    #[test]
    fn test_requests_are_signed_with_fresh_nonce() {
        let factory = factory();
        let a = factory.request_sketch(0, 10).unwrap();
        let b = factory.request_sketch(0, 10).unwrap();
        assert_eq!(a.nonce.len(), 16);
        assert_ne!(a.nonce, b.nonce);
        assert!(matches!(a.auth(), Some(AuthTag::Hmac(tag)) if tag.len() == 32));
        assert_eq!(a.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_resume_continues_numbering() {
        let factory = RequestFactory::resume(
            "alpha",
            RequestSigner::ed25519_from_seed(&[3u8; 32]),
            Arc::new(ManualClock::new(0)),
            41,
        );
        let request = factory.health_report().unwrap();
        assert_eq!(request.sequence, 42);
        assert!(matches!(request.auth(), Some(AuthTag::Ed25519(sig)) if sig.len() == 64));
    }
}
