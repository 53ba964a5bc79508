//! JSON encoding.

use super::Envelope;
use crate::{ModelError, Result};

pub(super) fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(envelope)?)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(bytes).map_err(|e| ModelError::Corrupt(e.to_string()))
}
