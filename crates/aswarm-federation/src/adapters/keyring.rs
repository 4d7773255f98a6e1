//! Static keyring.
//!
//! File format:
//!
//! ```json
//! {
//!   "clusters": {
//!     "beta": { "hmac_key": "<hex>", "ed25519_public_key": "<hex, 32 bytes>" }
//!   }
//! }
//! ```
//!
//! Either key may be omitted. Secrets are zeroized on drop and never logged.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use zeroize::Zeroizing;

use crate::domain::errors::KeyringError;
use crate::ports::Keyring;

#[derive(Debug, Deserialize)]
struct KeyringFile {
    #[serde(default)]
    clusters: HashMap<String, KeyringFileEntry>,
}

#[derive(Debug, Deserialize)]
struct KeyringFileEntry {
    #[serde(default)]
    hmac_key: Option<String>,
    #[serde(default)]
    ed25519_public_key: Option<String>,
}

#[derive(Default)]
struct PeerKeys {
    hmac: Option<Zeroizing<Vec<u8>>>,
    ed25519: Option<[u8; 32]>,
}

/// In-memory keyring keyed by cluster id.
#[derive(Default)]
pub struct StaticKeyring {
    peers: HashMap<String, PeerKeys>,
}

impl StaticKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hmac_key(mut self, cluster_id: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        self.peers.entry(cluster_id.into()).or_default().hmac = Some(Zeroizing::new(key.into()));
        self
    }

    pub fn with_ed25519_key(mut self, cluster_id: impl Into<String>, key: [u8; 32]) -> Self {
        self.peers.entry(cluster_id.into()).or_default().ed25519 = Some(key);
        self
    }

    /// Parse the JSON keyring format.
    pub fn from_json(json: &str) -> Result<Self, KeyringError> {
        let file: KeyringFile = serde_json::from_str(json)?;
        let mut keyring = Self::new();
        for (cluster_id, entry) in file.clusters {
            let mut keys = PeerKeys::default();
            if let Some(hex_key) = entry.hmac_key {
                let key = Zeroizing::new(hex::decode(hex_key.trim()).map_err(|e| {
                    KeyringError::InvalidKey {
                        cluster_id: cluster_id.clone(),
                        reason: format!("hmac_key: {}", e),
                    }
                })?);
                if key.is_empty() {
                    return Err(KeyringError::InvalidKey {
                        cluster_id,
                        reason: "hmac_key is empty".into(),
                    });
                }
                keys.hmac = Some(key);
            }
            if let Some(hex_key) = entry.ed25519_public_key {
                let bytes =
                    hex::decode(hex_key.trim()).map_err(|e| KeyringError::InvalidKey {
                        cluster_id: cluster_id.clone(),
                        reason: format!("ed25519_public_key: {}", e),
                    })?;
                let key: [u8; 32] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| KeyringError::InvalidKey {
                            cluster_id: cluster_id.clone(),
                            reason: format!("ed25519_public_key is {} bytes, expected 32", bytes.len()),
                        })?;
                keys.ed25519 = Some(key);
            }
            keyring.peers.insert(cluster_id, keys);
        }
        Ok(keyring)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, KeyringError> {
        let path = path.as_ref();
        let json = Zeroizing::new(std::fs::read_to_string(path)?);
        let keyring = Self::from_json(&json)?;
        info!(path = %path.display(), peers = keyring.len(), "Loaded federation keyring");
        Ok(keyring)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Keyring for StaticKeyring {
    fn hmac_key(&self, cluster_id: &str) -> Option<Zeroizing<Vec<u8>>> {
        self.peers.get(cluster_id)?.hmac.clone()
    }

    fn ed25519_public_key(&self, cluster_id: &str) -> Option<Vec<u8>> {
        self.peers.get(cluster_id)?.ed25519.map(|k| k.to_vec())
    }
}

impl std::fmt::Debug for StaticKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyring")
            .field("peers", &self.peers.keys().collect::<Vec<_>>())
            .finish()
    }
}
