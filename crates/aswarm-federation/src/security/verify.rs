//! Inbound request verification.

use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{signing_bytes, SignedRequest};
use crate::domain::errors::AuthError;
use crate::ports::outbound::Keyring;
use crate::proto::AuthTag;

type HmacSha256 = Hmac<Sha256>;

/// Verify the request's auth tag against the claimed cluster's key.
///
/// Dispatches on which tag is present. A missing or malformed key, a
/// mismatching tag and an absent tag are all authentication failures.
pub fn verify<K, R>(keyring: &K, request: &R) -> Result<(), AuthError>
where
    K: Keyring + ?Sized,
    R: SignedRequest,
{
    let cluster_id = request.cluster_id();
    let message = signing_bytes(&request.sign_view_bytes());

    match request.auth() {
        None => Err(AuthError::NoAuth),
        Some(AuthTag::Hmac(tag)) => {
            let key = keyring
                .hmac_key(cluster_id)
                .ok_or_else(|| AuthError::UnknownKey {
                    kind: "hmac",
                    cluster_id: cluster_id.to_string(),
                })?;
            if key.is_empty() {
                return Err(AuthError::InvalidKey {
                    kind: "hmac",
                    cluster_id: cluster_id.to_string(),
                });
            }
            let mut mac =
                HmacSha256::new_from_slice(&key).map_err(|_| AuthError::InvalidKey {
                    kind: "hmac",
                    cluster_id: cluster_id.to_string(),
                })?;
            mac.update(&message);
            mac.verify_slice(&tag).map_err(|_| AuthError::HmacMismatch)
        }
        Some(AuthTag::Ed25519(sig)) => {
            let key = keyring
                .ed25519_public_key(cluster_id)
                .ok_or_else(|| AuthError::UnknownKey {
                    kind: "ed25519",
                    cluster_id: cluster_id.to_string(),
                })?;
            let key: [u8; PUBLIC_KEY_LENGTH] =
                key.as_slice().try_into().map_err(|_| AuthError::InvalidKey {
                    kind: "ed25519",
                    cluster_id: cluster_id.to_string(),
                })?;
            let verifying_key =
                VerifyingKey::from_bytes(&key).map_err(|_| AuthError::InvalidKey {
                    kind: "ed25519",
                    cluster_id: cluster_id.to_string(),
                })?;
            let signature = Signature::from_slice(&sig)
                .map_err(|e| AuthError::MalformedSignature(e.to_string()))?;
            verifying_key
                .verify(&message, &signature)
                .map_err(|_| AuthError::SignatureMismatch)
        }
    }
}
