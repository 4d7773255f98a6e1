//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - the federation RPC surface
//! - Driven Ports (outbound) - sketch storage, key lookup and time

pub mod inbound;
pub mod outbound;

pub use inbound::FederationApi;
pub use outbound::{Keyring, ListOptions, SketchId, SketchStore, StoredSketch, TimeSource};
