//! # Request Signing Layer
//!
//! Every request type has a *sign view*: the request minus its auth tag,
//! encoded deterministically with `prost`. The bytes actually signed or
//! MAC'd are
//!
//! ```text
//! "ASWARM-FEDERATION-V1" || 0x00 || encode(sign_view)
//! ```
//!
//! so a signature produced for this protocol is never valid in another
//! context using the same keys.
//!
//! ## Security Properties
//!
//! - The auth tag is excluded from what it authenticates
//! - Nonces are 16 bytes from the OS RNG, filled only if absent
//! - HMAC comparison is constant-time (`Mac::verify_slice`)

mod sign_view;
mod signer;
mod verify;

pub use sign_view::SignedRequest;
pub use signer::RequestSigner;
pub use verify::verify;

use rand::rngs::OsRng;
use rand::RngCore;

/// Domain separation tag prepended to every signed payload.
pub const DOMAIN_TAG: &[u8] = b"ASWARM-FEDERATION-V1";

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 16;

/// Width of the replay uniqueness key.
pub const UNIQUENESS_KEY_LEN: usize = 24;

/// `DOMAIN_TAG || 0x00 || sign_view_bytes`.
pub fn signing_bytes(sign_view: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(DOMAIN_TAG.len() + 1 + sign_view.len());
    out.extend_from_slice(DOMAIN_TAG);
    out.push(0x00);
    out.extend_from_slice(sign_view);
    out
}

/// Fill the nonce with random bytes if it is empty. Returns `true` if filled.
pub fn fill_nonce<R: SignedRequest>(request: &mut R) -> bool {
    if !request.nonce().is_empty() {
        return false;
    }
    let mut nonce = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    *request.nonce_mut() = nonce;
    true
}
