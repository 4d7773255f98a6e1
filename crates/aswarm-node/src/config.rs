//! # Node Configuration
//!
//! Library defaults overridden by `ASWARM_*` environment variables.
//! Malformed values are logged and the default is kept; a missing cluster
//! id is fatal.
//!
//! | Variable | Default |
//! |---|---|
//! | `ASWARM_CLUSTER_ID` | required |
//! | `ASWARM_FEDERATION_PORT` | 9443 |
//! | `ASWARM_RATE_LIMIT` | 100 per minute |
//! | `ASWARM_REPLAY_TTL_SECS` | 3600 |
//! | `ASWARM_REPLAY_GC_SCAN` | 64 |
//! | `ASWARM_MAX_CLOCK_SKEW_SECS` | 300 |
//! | `ASWARM_REQUEST_LIMIT_MAX` | 100 |
//! | `ASWARM_SKETCH_PRECISION` | 14 |
//! | `ASWARM_SKETCH_SALT` | 0 |
//! | `ASWARM_TRUST_MIN_RELIABILITY` | 0.3 |
//! | `ASWARM_REJECTION_PENALTY` | `authenticated` |
//! | `ASWARM_KEYRING` | unset (no peers) |
//! | `ASWARM_METRICS_INTERVAL_SECS` | 60 |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use aswarm_federation::{FederationConfig, RejectionPenalty, StaticKeyring};
use tracing::{info, warn};

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub federation: FederationConfig,
    pub keyring_path: Option<PathBuf>,
    pub metrics_interval: Duration,
}

impl NodeSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cluster_id = lookup("ASWARM_CLUSTER_ID")
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if cluster_id.is_empty() {
            bail!("ASWARM_CLUSTER_ID must be set");
        }

        let mut config = FederationConfig::for_cluster(cluster_id);
        override_parsed(&lookup, "ASWARM_FEDERATION_PORT", &mut config.listen_port);
        override_parsed(&lookup, "ASWARM_RATE_LIMIT", &mut config.rate_limit_per_minute);
        override_parsed(&lookup, "ASWARM_REPLAY_GC_SCAN", &mut config.replay_gc_scan_limit);
        override_parsed(&lookup, "ASWARM_REQUEST_LIMIT_MAX", &mut config.request_limit_max);
        override_parsed(&lookup, "ASWARM_SKETCH_PRECISION", &mut config.sketch.precision);
        override_parsed(&lookup, "ASWARM_SKETCH_SALT", &mut config.sketch.salt);
        override_parsed(
            &lookup,
            "ASWARM_TRUST_MIN_RELIABILITY",
            &mut config.trust.min_reliability,
        );

        let mut ttl_secs = config.replay_ttl.as_secs();
        override_parsed(&lookup, "ASWARM_REPLAY_TTL_SECS", &mut ttl_secs);
        config.replay_ttl = Duration::from_secs(ttl_secs);

        let mut skew_secs = config.max_clock_skew.as_secs();
        override_parsed(&lookup, "ASWARM_MAX_CLOCK_SKEW_SECS", &mut skew_secs);
        config.max_clock_skew = Duration::from_secs(skew_secs);

        if let Some(raw) = lookup("ASWARM_REJECTION_PENALTY") {
            match parse_penalty(&raw) {
                Some(policy) => config.trust.rejection_penalty = policy,
                None => warn!(
                    value = %raw,
                    "ASWARM_REJECTION_PENALTY must be none, authenticated or all; keeping default"
                ),
            }
        }

        let mut metrics_secs = 60u64;
        override_parsed(&lookup, "ASWARM_METRICS_INTERVAL_SECS", &mut metrics_secs);

        config
            .validate()
            .context("invalid federation configuration")?;

        Ok(Self {
            federation: config,
            keyring_path: lookup("ASWARM_KEYRING")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            metrics_interval: Duration::from_secs(metrics_secs.max(1)),
        })
    }
}

/// Replace `target` with the parsed variable if present and well formed.
fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = %raw, default = %target, "Malformed value; keeping default"),
    }
}

fn parse_penalty(raw: &str) -> Option<RejectionPenalty> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" => Some(RejectionPenalty::None),
        "authenticated" => Some(RejectionPenalty::Authenticated),
        "all" => Some(RejectionPenalty::All),
        _ => None,
    }
}

/// Load the keyring file, or an empty keyring when no path is configured.
pub fn load_keyring(path: Option<&Path>) -> Result<StaticKeyring> {
    match path {
        Some(path) => StaticKeyring::from_json_file(path)
            .with_context(|| format!("failed to load keyring from {}", path.display())),
        None => {
            warn!("ASWARM_KEYRING not set; every peer request will fail authentication");
            Ok(StaticKeyring::new())
        }
    }
}

/// Log the effective configuration (no key material).
pub fn log_settings(settings: &NodeSettings) {
    let config = &settings.federation;
    info!(
        cluster_id = %config.cluster_id,
        port = config.listen_port,
        rate_limit = config.rate_limit_per_minute,
        replay_ttl_secs = config.replay_ttl.as_secs(),
        max_clock_skew_secs = config.max_clock_skew.as_secs(),
        sketch_precision = config.sketch.precision,
        min_reliability = config.trust.min_reliability,
        rejection_penalty = ?config.trust.rejection_penalty,
        "Federation configuration loaded"
    );
}
