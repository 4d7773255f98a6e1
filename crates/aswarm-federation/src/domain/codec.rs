//! # Sketch Codec
//!
//! Packs a [`CardinalitySketch`] and its metadata into a transportable
//! [`SketchAttestation`], and validates/unpacks attestations received from
//! peers before any payload byte is trusted.
//!
//! ## Error Classes
//!
//! - `InvalidMetadata`: required fields missing or malformed.
//! - `Incompatible`: header version/precision/salt differ from ours while the
//!   payload still matches the attested hash (peer is misconfigured).
//! - `Corrupt`: truncated, undecodable, or hash-mismatched payload.
//!
//! A header mismatch whose bytes no longer match `sketch_hash` is reported as
//! corruption: the header was altered after packing.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sha2::{Digest, Sha256};

use super::errors::CodecError;
use super::sketch::{CardinalitySketch, SketchConfig, SketchHeader, HEADER_LEN};
use crate::proto::{Phase, SignatureType, SketchAttestation, SketchMetadata};

/// SHA-256 of raw sketch bytes.
pub fn sketch_hash(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Pack a sketch into an attestation.
///
/// `window_start` is normalised to UTC epoch seconds. The confidence score
/// is left at 0.0 for the evolution engine to fill in.
pub fn pack<Tz: TimeZone>(
    antibody_id: &str,
    environment: &str,
    signature_type: SignatureType,
    window_start: DateTime<Tz>,
    window_size: Duration,
    sketch: &CardinalitySketch,
    phase: Phase,
) -> Result<SketchAttestation, CodecError> {
    if antibody_id.is_empty() {
        return Err(CodecError::InvalidMetadata("antibody_id is empty".into()));
    }
    if environment.is_empty() {
        return Err(CodecError::InvalidMetadata("environment is empty".into()));
    }
    if window_size < Duration::zero() {
        return Err(CodecError::InvalidMetadata(format!(
            "window_size is negative: {}s",
            window_size.num_seconds()
        )));
    }

    let sketch_data = sketch.marshal_binary();
    let metadata = SketchMetadata {
        antibody_id: antibody_id.to_string(),
        environment: environment.to_string(),
        window_start: window_start.with_timezone(&Utc).timestamp(),
        window_size_seconds: window_size.num_seconds(),
        signature_type: signature_type as i32,
        cardinality_estimate: sketch.count(),
        confidence_score: 0.0,
        sketch_hash: sketch_hash(&sketch_data),
        quorum_certificate: Vec::new(),
        lineage_hashes: Vec::new(),
        phase: phase as i32,
    };

    Ok(SketchAttestation {
        metadata: Some(metadata),
        sketch_data,
    })
}

/// Re-pack a stored sketch under existing metadata.
///
/// Payload, hash and cardinality estimate are recomputed from `sketch`;
/// every other metadata field is carried over.
pub fn repack(
    metadata: &SketchMetadata,
    sketch: &CardinalitySketch,
) -> Result<SketchAttestation, CodecError> {
    check_metadata(metadata)?;
    let sketch_data = sketch.marshal_binary();
    let mut metadata = metadata.clone();
    metadata.cardinality_estimate = sketch.count();
    metadata.sketch_hash = sketch_hash(&sketch_data);
    Ok(SketchAttestation {
        metadata: Some(metadata),
        sketch_data,
    })
}

/// Validate and extract the sketch from a peer's attestation.
pub fn unpack(
    attestation: Option<&SketchAttestation>,
    expected: &SketchConfig,
) -> Result<CardinalitySketch, CodecError> {
    let attestation =
        attestation.ok_or_else(|| CodecError::InvalidMetadata("missing attestation".into()))?;
    let metadata = attestation
        .metadata
        .as_ref()
        .ok_or_else(|| CodecError::InvalidMetadata("missing metadata".into()))?;
    check_metadata(metadata)?;

    let data = attestation.sketch_data.as_slice();
    if data.is_empty() {
        return Err(CodecError::InvalidMetadata("sketch_data is empty".into()));
    }

    if let Err(reason) = check_header(data, expected) {
        return Err(match reason {
            CodecError::Incompatible(_) if sketch_hash(data) != metadata.sketch_hash => {
                CodecError::Corrupt("header does not match attested sketch hash".into())
            }
            other => other,
        });
    }

    let mut sketch = CardinalitySketch::new(*expected)
        .map_err(|e| CodecError::Incompatible(format!("local sketch config: {}", e)))?;
    sketch
        .unmarshal_binary(data)
        .map_err(|e| CodecError::Corrupt(e.to_string()))?;

    if sketch_hash(data) != metadata.sketch_hash {
        return Err(CodecError::Corrupt("sketch hash mismatch".into()));
    }

    Ok(sketch)
}

/// Header-only compatibility check, without deserializing registers.
pub fn validate_compatibility(
    attestation: &SketchAttestation,
    local: &SketchConfig,
) -> Result<(), CodecError> {
    if attestation.sketch_data.is_empty() {
        return Err(CodecError::InvalidMetadata("sketch_data is empty".into()));
    }
    check_header(&attestation.sketch_data, local)
}

fn check_metadata(metadata: &SketchMetadata) -> Result<(), CodecError> {
    if metadata.antibody_id.is_empty() {
        return Err(CodecError::InvalidMetadata("antibody_id is empty".into()));
    }
    if metadata.environment.is_empty() {
        return Err(CodecError::InvalidMetadata("environment is empty".into()));
    }
    if metadata.window_size_seconds < 0 {
        return Err(CodecError::InvalidMetadata(format!(
            "window_size is negative: {}s",
            metadata.window_size_seconds
        )));
    }
    Ok(())
}

fn check_header(data: &[u8], expected: &SketchConfig) -> Result<(), CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::Corrupt(format!(
            "sketch is {} bytes, shorter than the {}-byte header",
            data.len(),
            HEADER_LEN
        )));
    }
    let header = SketchHeader::parse(data).map_err(|e| CodecError::Corrupt(e.to_string()))?;
    header
        .check_compatible(expected)
        .map_err(|e| CodecError::Incompatible(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sketch::SketchVersion;
    use chrono::FixedOffset;

    fn config(salt: u64) -> SketchConfig {
        SketchConfig::new(SketchVersion::V1, 6, salt).unwrap()
    }

    fn sample_sketch(cfg: SketchConfig) -> CardinalitySketch {
        let mut sketch = CardinalitySketch::new(cfg).unwrap();
        for i in 0..200u64 {
            sketch.add_hash64(i.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        }
        sketch
    }

    fn packed(cfg: SketchConfig) -> SketchAttestation {
        pack(
            "cve-evasion-v2",
            "prod",
            SignatureType::Behavioral,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Duration::seconds(300),
            &sample_sketch(cfg),
            Phase::Canary,
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_count() {
        let cfg = config(42);
        let sketch = sample_sketch(cfg);
        let attestation = packed(cfg);

        let restored = unpack(Some(&attestation), &cfg).unwrap();
        assert_eq!(restored.count(), sketch.count());

        let metadata = attestation.metadata.unwrap();
        assert_eq!(metadata.cardinality_estimate, sketch.count());
        assert_eq!(metadata.window_size_seconds, 300);
        assert_eq!(metadata.confidence_score, 0.0);
        assert_eq!(metadata.phase(), Phase::Canary);
        assert_eq!(metadata.signature_type(), SignatureType::Behavioral);
        assert_eq!(metadata.sketch_hash, sketch_hash(&attestation.sketch_data));
    }

    #[test]
    fn test_flipping_any_byte_is_corruption() {
        let cfg = config(42);
        let attestation = packed(cfg);

        for i in 0..attestation.sketch_data.len() {
            let mut tampered = attestation.clone();
            tampered.sketch_data[i] ^= 0x01;
            let err = unpack(Some(&tampered), &cfg).unwrap_err();
            assert!(
                matches!(err, CodecError::Corrupt(_)),
                "byte {} produced {:?}",
                i,
                err
            );
        }
    }

    #[test]
    fn test_salt_mismatch_is_incompatible() {
        let attestation = packed(config(1));
        let err = unpack(Some(&attestation), &config(2)).unwrap_err();
        assert!(matches!(err, CodecError::Incompatible(_)));
    }

    #[test]
    fn test_precision_mismatch_is_incompatible() {
        let attestation = packed(config(1));
        let other = SketchConfig::new(SketchVersion::V1, 8, 1).unwrap();
        assert!(matches!(
            unpack(Some(&attestation), &other),
            Err(CodecError::Incompatible(_))
        ));
    }

    #[test]
    fn test_short_payload_is_corruption() {
        let mut attestation = packed(config(1));
        attestation.sketch_data.truncate(12);
        assert!(matches!(
            unpack(Some(&attestation), &config(1)),
            Err(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn test_missing_pieces_are_metadata_errors() {
        let cfg = config(1);
        assert!(matches!(
            unpack(None, &cfg),
            Err(CodecError::InvalidMetadata(_))
        ));

        let mut no_metadata = packed(cfg);
        no_metadata.metadata = None;
        assert!(matches!(
            unpack(Some(&no_metadata), &cfg),
            Err(CodecError::InvalidMetadata(_))
        ));

        let mut no_data = packed(cfg);
        no_data.sketch_data.clear();
        assert!(matches!(
            unpack(Some(&no_data), &cfg),
            Err(CodecError::InvalidMetadata(_))
        ));

        let mut no_id = packed(cfg);
        if let Some(m) = no_id.metadata.as_mut() {
            m.antibody_id.clear();
        }
        assert!(matches!(
            unpack(Some(&no_id), &cfg),
            Err(CodecError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_pack_rejects_bad_metadata() {
        let sketch = sample_sketch(config(0));
        let start = Utc::now();

        let empty_id = pack(
            "",
            "prod",
            SignatureType::Network,
            start,
            Duration::seconds(60),
            &sketch,
            Phase::Shadow,
        );
        assert!(matches!(empty_id, Err(CodecError::InvalidMetadata(_))));

        let empty_env = pack(
            "ab-1",
            "",
            SignatureType::Network,
            start,
            Duration::seconds(60),
            &sketch,
            Phase::Shadow,
        );
        assert!(matches!(empty_env, Err(CodecError::InvalidMetadata(_))));

        let negative = pack(
            "ab-1",
            "prod",
            SignatureType::Network,
            start,
            Duration::seconds(-1),
            &sketch,
            Phase::Shadow,
        );
        assert!(matches!(negative, Err(CodecError::InvalidMetadata(_))));
    }

    #[test]
    fn test_window_start_is_normalised_to_utc() {
        let sketch = sample_sketch(config(0));
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.timestamp_opt(1_700_000_000, 0).unwrap();

        let attestation = pack(
            "ab-1",
            "staging",
            SignatureType::IocHash,
            local,
            Duration::zero(),
            &sketch,
            Phase::Staged,
        )
        .unwrap();
        assert_eq!(attestation.metadata.unwrap().window_start, 1_700_000_000);
    }

    #[test]
    fn test_validate_compatibility_checks_header_only() {
        let cfg = config(5);
        let mut attestation = packed(cfg);
        assert!(validate_compatibility(&attestation, &cfg).is_ok());
        assert!(matches!(
            validate_compatibility(&attestation, &config(6)),
            Err(CodecError::Incompatible(_))
        ));

        // Register bytes are not inspected here.
        let last = attestation.sketch_data.len() - 1;
        attestation.sketch_data[last] ^= 0xFF;
        assert!(validate_compatibility(&attestation, &cfg).is_ok());
    }

    #[test]
    fn test_repack_recomputes_hash() {
        let cfg = config(3);
        let attestation = packed(cfg);
        let metadata = attestation.metadata.clone().unwrap();

        let mut grown = unpack(Some(&attestation), &cfg).unwrap();
        for i in 1000..1100u64 {
            grown.add_hash64(i);
        }
        let again = repack(&metadata, &grown).unwrap();
        let new_meta = again.metadata.as_ref().unwrap();
        assert_eq!(new_meta.antibody_id, metadata.antibody_id);
        assert_ne!(new_meta.sketch_hash, metadata.sketch_hash);
        assert_eq!(unpack(Some(&again), &cfg).unwrap(), grown);
    }
}
