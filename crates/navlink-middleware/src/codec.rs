//! Wire codec for [`Envelope`].
//!
//! Each envelope travels as one JSON object in a single write with no length
//! prefix.  The receiver relies on one connection carrying exactly one
//! envelope.

use navlink_types::{Envelope, NavError};

/// Serialise `envelope` to the bytes written on the wire.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, NavError> {
    serde_json::to_vec(envelope).map_err(|e| NavError::Codec(e.to_string()))
}

/// Parse one envelope from a received buffer.
///
/// # Errors
///
/// Returns [`NavError::Codec`] for invalid UTF-8, invalid JSON, or a missing
/// `agent_name`/`message` field.
pub fn decode(bytes: &[u8]) -> Result<Envelope, NavError> {
    serde_json::from_slice(bytes).map_err(|e| NavError::Codec(e.to_string()))
}
