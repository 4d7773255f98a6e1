//! Service Layer
//!
//! Composes the rate limiter, signature verification, replay guard, trust
//! gate and codec around the sketch store.

pub mod federation_service;
mod stream;

pub use federation_service::FederationService;
