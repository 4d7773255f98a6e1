//! Adapters Layer
//!
//! Implementations of the driven ports plus the TCP transport.
//!
//! ## Adapters
//!
//! - `InMemorySketchStore` - process-local sketch store
//! - `StaticKeyring` - keyring loaded from JSON
//! - `SystemTimeSource` / `ManualClock` - wall clock and test clock
//! - `tcp` - length-delimited `FederationFrame` transport

pub mod clock;
pub mod keyring;
pub mod memory_store;
pub mod tcp;

pub use clock::{ManualClock, SystemTimeSource};
pub use keyring::StaticKeyring;
pub use memory_store::InMemorySketchStore;
