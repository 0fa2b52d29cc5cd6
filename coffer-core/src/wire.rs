//! Snapshot format for treasury state.
//!
//! Uses CBOR (RFC 8949) for compact binary serialization. The persistence
//! collaborator loads a snapshot before an authorization cycle and saves
//! the post-mutation snapshot transactionally with the submitted action;
//! the engine itself only ever sees the in-memory value.
//!
//! ## Security Limits
//!
//! - **Payload size**: limited to [`MAX_SNAPSHOT_SIZE`] to prevent memory
//!   exhaustion; checked before deserialization is attempted
//! - **Versioning**: snapshots carry a format version and unknown versions
//!   are rejected

use crate::budget::BudgetLedger;
use crate::error::{Error, Result};
use crate::treasury::Treasury;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Maximum allowed size for a serialized snapshot in bytes (256 KB).
///
/// A treasury holds at most 256 roles and their budget entries; 256 KB
/// provides ample headroom while protecting against abuse.
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024;

/// Full persisted state of one treasury.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version, first field in the encoding.
    pub version: u8,
    pub treasury: Treasury,
    pub ledger: BudgetLedger,
    /// Last timestamp the engine observed, for the regression guard.
    pub last_observed: Option<DateTime<Utc>>,
}

/// Encode a snapshot to a compact binary format.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(snapshot, &mut buf)?;
    Ok(buf)
}

/// Decode a snapshot from binary format.
///
/// Returns `SnapshotTooLarge` if the input exceeds [`MAX_SNAPSHOT_SIZE`]
/// and `UnsupportedVersion` on a format mismatch.
pub fn decode(data: &[u8]) -> Result<Snapshot> {
    // Check size BEFORE attempting deserialization.
    if data.len() > MAX_SNAPSHOT_SIZE {
        return Err(Error::SnapshotTooLarge {
            size: data.len(),
            max: MAX_SNAPSHOT_SIZE,
        });
    }

    let snapshot: Snapshot = ciborium::de::from_reader(data)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::UnsupportedVersion(snapshot.version));
    }

    Ok(snapshot)
}

/// Encode a snapshot to a base64 string (for text transports).
pub fn encode_base64(snapshot: &Snapshot) -> Result<String> {
    let bytes = encode(snapshot)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a snapshot from a base64 string.
pub fn decode_base64(s: &str) -> Result<Snapshot> {
    // base64 encodes 3 bytes as 4 chars; lower bound on the decoded size.
    let estimated_size = (s.len() * 3) / 4;
    if estimated_size > MAX_SNAPSHOT_SIZE {
        return Err(Error::SnapshotTooLarge {
            size: estimated_size,
            max: MAX_SNAPSHOT_SIZE,
        });
    }

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::DeserializationError(e.to_string()))?;
    decode(&bytes)
}
