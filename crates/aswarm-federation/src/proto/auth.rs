//! The authentication tag shared by all request types.
//!
//! Each request carries its own generated `auth` oneof with identical
//! variants; [`AuthTag`] is the single type the signing layer works with.

use super::{health_report_request, request_sketch_request, share_sketch_request};

/// Exactly one authentication tag per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthTag {
    /// Ed25519 signature (64 bytes).
    Ed25519(Vec<u8>),
    /// HMAC-SHA256 tag (32 bytes).
    Hmac(Vec<u8>),
}

macro_rules! auth_oneof {
    ($($oneof:ident),+ $(,)?) => {$(
        impl From<AuthTag> for $oneof::Auth {
            fn from(tag: AuthTag) -> Self {
                match tag {
                    AuthTag::Ed25519(sig) => Self::Ed25519(sig),
                    AuthTag::Hmac(mac) => Self::Hmac(mac),
                }
            }
        }

        impl From<$oneof::Auth> for AuthTag {
            fn from(auth: $oneof::Auth) -> Self {
                match auth {
                    $oneof::Auth::Ed25519(sig) => Self::Ed25519(sig),
                    $oneof::Auth::Hmac(mac) => Self::Hmac(mac),
                }
            }
        }
    )+};
}

auth_oneof!(share_sketch_request, request_sketch_request, health_report_request);
