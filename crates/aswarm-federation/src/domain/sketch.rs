//! # Cardinality Sketch
//!
//! Mergeable HyperLogLog sketch used to summarise observed attack
//! signatures without exposing the raw observations.
//!
//! ## Binary Format
//!
//! ```text
//! offset  size  field
//! 0       1     version (1 = "v1")
//! 1       1     precision
//! 2       8     salt (u64, little-endian)
//! 10      4     sparse threshold (u32, little-endian)
//! 14      1     flags (0 = dense)
//! 15      4     register length (u32, little-endian)
//! 19      n     registers, one byte each, n == 2^precision
//! ```
//!
//! ## Invariants
//!
//! - Merge is commutative, associative and idempotent (register-wise max).
//! - Only sketches with identical precision and salt can be merged.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use super::errors::SketchError;

/// Size of the fixed sketch header in bytes.
pub const HEADER_LEN: usize = 19;

/// Smallest supported precision (16 registers).
pub const MIN_PRECISION: u8 = 4;

/// Largest supported precision (262144 registers).
pub const MAX_PRECISION: u8 = 18;

/// Flags value for the dense register layout.
pub const FLAGS_DENSE: u8 = 0;

/// Sketch format version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SketchVersion {
    #[default]
    V1,
}

impl SketchVersion {
    pub const fn as_byte(self) -> u8 {
        match self {
            SketchVersion::V1 => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(SketchVersion::V1),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SketchVersion::V1 => "v1",
        }
    }
}

impl fmt::Display for SketchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SketchVersion {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(SketchVersion::V1),
            other => Err(SketchError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Structural parameters two clusters must agree on to merge sketches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SketchConfig {
    pub version: SketchVersion,
    pub precision: u8,
    pub salt: u64,
    /// Carried in the header; this implementation always writes dense registers.
    pub sparse_threshold: u32,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            version: SketchVersion::V1,
            precision: 14,
            salt: 0,
            sparse_threshold: 0,
        }
    }
}

impl SketchConfig {
    pub fn new(version: SketchVersion, precision: u8, salt: u64) -> Result<Self, SketchError> {
        let config = Self {
            version,
            precision,
            salt,
            sparse_threshold: 0,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SketchError> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.precision) {
            return Err(SketchError::InvalidPrecision {
                precision: self.precision,
                min: MIN_PRECISION,
                max: MAX_PRECISION,
            });
        }
        Ok(())
    }

    /// Number of registers, `2^precision`.
    pub fn register_count(&self) -> usize {
        1usize << self.precision
    }

    /// Largest value a register may hold.
    pub fn max_register_value(&self) -> u8 {
        64 - self.precision + 1
    }
}

/// Decoded fixed header of a serialized sketch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SketchHeader {
    pub version: u8,
    pub precision: u8,
    pub salt: u64,
    pub sparse_threshold: u32,
    pub flags: u8,
    pub register_length: u32,
}

impl SketchHeader {
    /// Parse the first [`HEADER_LEN`] bytes of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, SketchError> {
        if data.len() < HEADER_LEN {
            return Err(SketchError::Truncated {
                len: data.len(),
                header: HEADER_LEN,
            });
        }

        let mut salt = [0u8; 8];
        salt.copy_from_slice(&data[2..10]);
        let mut sparse = [0u8; 4];
        sparse.copy_from_slice(&data[10..14]);
        let mut reg_len = [0u8; 4];
        reg_len.copy_from_slice(&data[15..19]);

        Ok(Self {
            version: data[0],
            precision: data[1],
            salt: u64::from_le_bytes(salt),
            sparse_threshold: u32::from_le_bytes(sparse),
            flags: data[14],
            register_length: u32::from_le_bytes(reg_len),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.version;
        out[1] = self.precision;
        out[2..10].copy_from_slice(&self.salt.to_le_bytes());
        out[10..14].copy_from_slice(&self.sparse_threshold.to_le_bytes());
        out[14] = self.flags;
        out[15..19].copy_from_slice(&self.register_length.to_le_bytes());
        out
    }

    /// Check version, precision and salt against a local configuration.
    pub fn check_compatible(&self, config: &SketchConfig) -> Result<(), SketchError> {
        if SketchVersion::from_byte(self.version) != Some(config.version) {
            return Err(SketchError::HeaderMismatch {
                field: "version",
                expected: config.version.to_string(),
                actual: format!("v{}", self.version),
            });
        }
        if self.precision != config.precision {
            return Err(SketchError::HeaderMismatch {
                field: "precision",
                expected: config.precision.to_string(),
                actual: self.precision.to_string(),
            });
        }
        if self.salt != config.salt {
            return Err(SketchError::HeaderMismatch {
                field: "salt",
                expected: format!("{:#018x}", config.salt),
                actual: format!("{:#018x}", self.salt),
            });
        }
        Ok(())
    }
}

/// Dense HyperLogLog sketch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardinalitySketch {
    config: SketchConfig,
    registers: Vec<u8>,
}

impl CardinalitySketch {
    pub fn new(config: SketchConfig) -> Result<Self, SketchError> {
        config.validate()?;
        Ok(Self {
            registers: vec![0u8; config.register_count()],
            config,
        })
    }

    /// Build a sketch of `config` from serialized bytes.
    pub fn from_binary(config: SketchConfig, data: &[u8]) -> Result<Self, SketchError> {
        let mut sketch = Self::new(config)?;
        sketch.unmarshal_binary(data)?;
        Ok(sketch)
    }

    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    /// Record a pre-hashed observation.
    pub fn add_hash64(&mut self, hash: u64) {
        let p = u32::from(self.config.precision);
        let x = mix64(hash ^ self.config.salt);
        let index = (x >> (64 - p)) as usize;
        // Guard bit bounds the rank at 64 - p + 1.
        let rest = (x << p) | (1u64 << (p - 1));
        let rank = rest.leading_zeros() as u8 + 1;
        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    /// Record a raw observation (hashed with SHA-256).
    pub fn add(&mut self, item: &[u8]) {
        let digest = Sha256::digest(item);
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        self.add_hash64(u64::from_le_bytes(word));
    }

    /// Estimated number of distinct observations.
    pub fn count(&self) -> u64 {
        let m = self.registers.len() as f64;
        let mut sum = 0.0;
        let mut zeros = 0usize;
        for &r in &self.registers {
            sum += 2f64.powi(-i32::from(r));
            if r == 0 {
                zeros += 1;
            }
        }

        let alpha = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };
        let raw = alpha * m * m / sum;

        let estimate = if raw <= 2.5 * m && zeros > 0 {
            // Linear counting for the small range.
            m * (m / zeros as f64).ln()
        } else {
            raw
        };
        estimate.round() as u64
    }

    /// Register-wise max with `other`.
    pub fn merge(&mut self, other: &CardinalitySketch) -> Result<(), SketchError> {
        if self.config.precision != other.config.precision
            || self.config.salt != other.config.salt
            || self.config.version != other.config.version
        {
            return Err(SketchError::MergeMismatch);
        }
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }
        Ok(())
    }

    pub fn header(&self) -> SketchHeader {
        SketchHeader {
            version: self.config.version.as_byte(),
            precision: self.config.precision,
            salt: self.config.salt,
            sparse_threshold: self.config.sparse_threshold,
            flags: FLAGS_DENSE,
            register_length: self.registers.len() as u32,
        }
    }

    pub fn marshal_binary(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.registers.len());
        out.extend_from_slice(&self.header().encode());
        out.extend_from_slice(&self.registers);
        out
    }

    /// Replace this sketch's registers with the serialized `data`.
    ///
    /// The header must match this sketch's version, precision and salt.
    pub fn unmarshal_binary(&mut self, data: &[u8]) -> Result<(), SketchError> {
        let header = SketchHeader::parse(data)?;
        header.check_compatible(&self.config)?;

        if header.flags != FLAGS_DENSE {
            return Err(SketchError::UnsupportedFlags(header.flags));
        }

        let expected = self.config.register_count();
        if header.register_length as usize != expected {
            return Err(SketchError::RegisterLength {
                expected,
                actual: header.register_length as usize,
            });
        }
        if data.len() != HEADER_LEN + expected {
            return Err(SketchError::PayloadLength {
                expected: HEADER_LEN + expected,
                actual: data.len(),
            });
        }

        let body = &data[HEADER_LEN..];
        let max = self.config.max_register_value();
        if let Some((index, &value)) = body.iter().enumerate().find(|&(_, &v)| v > max) {
            return Err(SketchError::InvalidRegister { index, value });
        }

        self.registers.copy_from_slice(body);
        self.config.sparse_threshold = header.sparse_threshold;
        Ok(())
    }
}

/// SplitMix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
