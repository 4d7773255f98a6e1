//! Sign views and uniqueness keys for the three request types.

use prost::Message;

use super::UNIQUENESS_KEY_LEN;
use crate::proto::{
    AuthTag, HealthReportRequest, HealthReportSignView, RequestSketchRequest,
    RequestSketchSignView, ShareSketchRequest, ShareSketchSignView,
};

/// A request envelope that carries exactly one auth tag.
pub trait SignedRequest {
    fn cluster_id(&self) -> &str;
    fn timestamp(&self) -> i64;
    fn sequence(&self) -> u64;
    fn nonce(&self) -> &[u8];
    fn nonce_mut(&mut self) -> &mut Vec<u8>;
    fn auth(&self) -> Option<AuthTag>;
    fn set_auth(&mut self, tag: AuthTag);

    /// Deterministic encoding of every field except the auth tag.
    fn sign_view_bytes(&self) -> Vec<u8>;

    /// Request-specific bytes whose first 8 end the uniqueness key.
    fn uniqueness_source(&self) -> &[u8];

    /// `sequence (8, BE) || timestamp (8, BE) || source[..8]`, zero padded.
    fn uniqueness_key(&self) -> [u8; UNIQUENESS_KEY_LEN] {
        let mut key = [0u8; UNIQUENESS_KEY_LEN];
        key[..8].copy_from_slice(&self.sequence().to_be_bytes());
        key[8..16].copy_from_slice(&self.timestamp().to_be_bytes());
        let source = self.uniqueness_source();
        let n = source.len().min(8);
        key[16..16 + n].copy_from_slice(&source[..n]);
        key
    }
}

macro_rules! envelope_fields {
    () => {
        fn cluster_id(&self) -> &str {
            &self.cluster_id
        }

        fn timestamp(&self) -> i64 {
            self.timestamp
        }

        fn sequence(&self) -> u64 {
            self.sequence
        }

        fn nonce(&self) -> &[u8] {
            &self.nonce
        }

        fn nonce_mut(&mut self) -> &mut Vec<u8> {
            &mut self.nonce
        }

        fn auth(&self) -> Option<AuthTag> {
            self.auth.clone().map(AuthTag::from)
        }

        fn set_auth(&mut self, tag: AuthTag) {
            self.auth = Some(tag.into());
        }
    };
}

impl SignedRequest for ShareSketchRequest {
    envelope_fields!();

    fn sign_view_bytes(&self) -> Vec<u8> {
        ShareSketchSignView {
            cluster_id: self.cluster_id.clone(),
            timestamp: self.timestamp,
            sequence: self.sequence,
            nonce: self.nonce.clone(),
            attestation: self.attestation.clone(),
            phase: self.phase,
        }
        .encode_to_vec()
    }

    fn uniqueness_source(&self) -> &[u8] {
        self.attestation
            .as_ref()
            .and_then(|a| a.metadata.as_ref())
            .map(|m| m.sketch_hash.as_slice())
            .unwrap_or(&[])
    }
}

impl SignedRequest for RequestSketchRequest {
    envelope_fields!();

    fn sign_view_bytes(&self) -> Vec<u8> {
        RequestSketchSignView {
            cluster_id: self.cluster_id.clone(),
            timestamp: self.timestamp,
            sequence: self.sequence,
            nonce: self.nonce.clone(),
            since: self.since,
            limit: self.limit,
        }
        .encode_to_vec()
    }

    fn uniqueness_source(&self) -> &[u8] {
        &self.nonce
    }
}

impl SignedRequest for HealthReportRequest {
    envelope_fields!();

    fn sign_view_bytes(&self) -> Vec<u8> {
        HealthReportSignView {
            cluster_id: self.cluster_id.clone(),
            timestamp: self.timestamp,
            sequence: self.sequence,
            nonce: self.nonce.clone(),
            capabilities: self.capabilities.clone(),
        }
        .encode_to_vec()
    }

    fn uniqueness_source(&self) -> &[u8] {
        &self.nonce
    }
}
