//! # Checkpoint Fingerprints
//!
//! A checkpoint records how many records existed and a BLAKE3 fingerprint of
//! all of them. The fingerprint input is the postcard encoding of each record
//! in id order, after a format tag, so it is independent of the storage
//! backend and of insertion order.

use crate::primitives::FINGERPRINT_DOMAIN;
use crate::{Node, TangleError};

/// Compute the hex BLAKE3 fingerprint of a record set.
///
/// Returns a 64-character lowercase hex string.
pub fn fingerprint(nodes: &[Node]) -> Result<String, TangleError> {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = blake3::Hasher::new();
    hasher.update(FINGERPRINT_DOMAIN);
    for node in sorted {
        let bytes =
            postcard::to_allocvec(node).map_err(|e| TangleError::SerializationError(e.to_string()))?;
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
