//! Outbound request signing.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{fill_nonce, signing_bytes, SignedRequest};
use crate::domain::errors::AuthError;
use crate::proto::AuthTag;

type HmacSha256 = Hmac<Sha256>;

/// Key material used to authenticate outgoing requests.
pub enum RequestSigner {
    /// Pre-shared secret, HMAC-SHA256.
    Hmac(Zeroizing<Vec<u8>>),
    /// Ed25519 signing key (zeroized on drop).
    Ed25519(SigningKey),
}

impl RequestSigner {
    pub fn hmac(key: impl Into<Vec<u8>>) -> Self {
        Self::Hmac(Zeroizing::new(key.into()))
    }

    pub fn ed25519_from_seed(seed: &[u8; 32]) -> Self {
        Self::Ed25519(SigningKey::from_bytes(seed))
    }

    /// Fill the nonce if empty, then attach the auth tag.
    pub fn sign<R: SignedRequest>(&self, request: &mut R) -> Result<(), AuthError> {
        fill_nonce(request);
        let message = signing_bytes(&request.sign_view_bytes());
        let tag = match self {
            Self::Hmac(key) => {
                if key.is_empty() {
                    return Err(AuthError::SigningFailed("empty hmac key".into()));
                }
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
                mac.update(&message);
                AuthTag::Hmac(mac.finalize().into_bytes().to_vec())
            }
            Self::Ed25519(key) => AuthTag::Ed25519(key.sign(&message).to_bytes().to_vec()),
        };
        request.set_auth(tag);
        Ok(())
    }

    /// Public half of an Ed25519 signer.
    pub fn verifying_key_bytes(&self) -> Option<[u8; 32]> {
        match self {
            Self::Ed25519(key) => Some(key.verifying_key().to_bytes()),
            Self::Hmac(_) => None,
        }
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hmac(_) => f.write_str("RequestSigner::Hmac(..)"),
            Self::Ed25519(_) => f.write_str("RequestSigner::Ed25519(..)"),
        }
    }
}
