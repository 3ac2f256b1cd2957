//! JSON codec for lifecycle events.
//!
//! Encoding and decoding are symmetric: any event produced by [`encode`]
//! decodes back to an equal value with [`decode`].

use crate::error::{DecodingError, EncodingError};
use crate::events::types::Event;

/// Serializes an event into its JSON wire form.
pub fn encode(event: &Event) -> Result<Vec<u8>, EncodingError> {
    serde_json::to_vec(event).map_err(EncodingError::from)
}

/// Parses a JSON payload into an event.
///
/// Rejects payloads with missing required fields, unknown fields or an
/// unrecognized event type.
pub fn decode(payload: &[u8]) -> Result<Event, DecodingError> {
    serde_json::from_slice(payload).map_err(|source| DecodingError::new(source, payload))
}
