//! # A-SWARM Federation Node
//!
//! Wiring for the `aswarm-node` binary:
//!
//! - `config` - `ASWARM_*` environment overrides on top of library defaults
//! - `logging` - `tracing-subscriber` setup (pretty or JSON)
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging
//! 2. Load configuration from the environment (cluster id is mandatory)
//! 3. Load the peer keyring
//! 4. Serve the federation stream until Ctrl+C

pub mod config;
pub mod logging;

pub use config::{load_keyring, NodeSettings};
pub use logging::init_logging;
