// Artifact envelope encoding: JSON, optionally gzip-compressed
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use modelvault_core::{ArtifactEnvelope, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest decoded envelope accepted, compressed or not.
pub const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

#[inline]
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Serialize an envelope, gzip-compressing it when asked.
pub fn encode_envelope(envelope: &ArtifactEnvelope, gzip: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(envelope)?;
    if !gzip {
        return Ok(json);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode raw artifact bytes. The error string is the corruption reason.
pub fn decode_envelope(bytes: &[u8]) -> std::result::Result<ArtifactEnvelope, String> {
    decode_limited(bytes, MAX_ARTIFACT_BYTES)
}

fn decode_limited(bytes: &[u8], limit: u64) -> std::result::Result<ArtifactEnvelope, String> {
    if bytes.is_empty() {
        return Err("artifact is empty".to_string());
    }
    let too_large = || format!("artifact exceeds {} bytes once decoded", limit);
    let json = if is_gzip(bytes) {
        let mut decoder = GzDecoder::new(bytes).take(limit + 1);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| format!("gzip stream is damaged: {}", e))?;
        if out.len() as u64 > limit {
            return Err(too_large());
        }
        out
    } else {
        if bytes.len() as u64 > limit {
            return Err(too_large());
        }
        bytes.to_vec()
    };
    serde_json::from_slice(&json).map_err(|e| format!("envelope does not parse: {}", e))
}

/// SHA-256 of the raw bytes, lowercase hex.
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelvault_core::{FeatureSchema, LinearModel, ModelPayload, TaskType};
    use std::collections::BTreeMap;

    fn envelope() -> ArtifactEnvelope {
        ArtifactEnvelope::new(
            TaskType::Shipping,
            FeatureSchema::numeric(["price"]),
            ModelPayload::Linear(LinearModel {
                intercept: 3.0,
                coefficients: BTreeMap::new(),
                categorical: BTreeMap::new(),
            }),
        )
    }

    #[test]
    fn test_plain_and_gzip_decode_alike() {
        let plain = encode_envelope(&envelope(), false).unwrap();
        let packed = encode_envelope(&envelope(), true).unwrap();
        assert!(!is_gzip(&plain));
        assert!(is_gzip(&packed));
        assert_eq!(decode_envelope(&plain).unwrap(), decode_envelope(&packed).unwrap());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_envelope(b"").is_err());
        assert!(decode_envelope(b"not json at all").is_err());
        assert!(decode_envelope(&[0x1f, 0x8b, 0x00, 0x01]).is_err());
        assert!(decode_envelope(br#"{"task": "shipping"}"#).is_err());
    }

    #[test]
    fn test_decoded_size_is_capped() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&vec![b' '; 100_000]).unwrap();
        let bomb = encoder.finish().unwrap();
        assert!(bomb.len() < 1_000);

        let err = decode_limited(&bomb, 10_000).unwrap_err();
        assert!(err.contains("exceeds"), "{}", err);
        assert!(decode_limited(&vec![b' '; 20_000], 10_000).unwrap_err().contains("exceeds"));

        let packed = encode_envelope(&envelope(), true).unwrap();
        assert!(decode_limited(&packed, 10_000).is_ok());
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let a = checksum(b"artifact");
        assert_eq!(a.len(), 64);
        assert_eq!(a, checksum(b"artifact"));
        assert_ne!(a, checksum(b"artifact2"));
    }
}
