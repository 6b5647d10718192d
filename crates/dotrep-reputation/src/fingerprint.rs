//! Canonical snapshot fingerprints.
//!
//! A fingerprint identifies one scoring problem: the snapshot together with
//! the configuration it is scored under. The pair is encoded as CBOR and
//! hashed with BLAKE3 in key-derivation mode:
//!
//! ```text
//! fingerprint = BLAKE3-derive-key("DotRep v1 snapshot-fingerprint", CBOR(snapshot, config))
//! ```
//!
//! Snapshots store nodes in id order and identity flags in a sorted set, so
//! two snapshots built from the same nodes in different input order share a
//! fingerprint. Edge order is part of the snapshot and does affect it.

use dotrep_types::GraphSnapshot;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::{ReputationError, Result};

/// BLAKE3 context string for snapshot fingerprints.
pub const SNAPSHOT_FINGERPRINT_CONTEXT: &str = "DotRep v1 snapshot-fingerprint";

/// A 32-byte snapshot fingerprint.
pub type Fingerprint = [u8; 32];

/// Serialize a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`ReputationError::Encoding`] if the value cannot be serialized.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| ReputationError::Encoding(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Fingerprint of `snapshot` scored under `config`.
pub fn fingerprint(snapshot: &GraphSnapshot, config: &EngineConfig) -> Result<Fingerprint> {
    let encoded = to_cbor(&(snapshot, config))?;
    let mut hasher = blake3::Hasher::new_derive_key(SNAPSHOT_FINGERPRINT_CONTEXT);
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}

/// Lowercase hex rendering used in logs and reports.
pub fn to_hex(fingerprint: &Fingerprint) -> String {
    hex::encode(fingerprint)
}
