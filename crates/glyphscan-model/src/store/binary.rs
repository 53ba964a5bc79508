//! Bincode encoding with a magic prefix and a size limit.

use bincode::Options;

use super::Envelope;
use crate::{ModelError, Result};

const MAGIC: &[u8; 4] = b"GLYM";

/// Upper bound on decoded artifact size, guards against garbage length prefixes.
const SIZE_LIMIT: u64 = 512 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(SIZE_LIMIT)
}

pub(super) fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    let mut bytes = MAGIC.to_vec();
    bytes.extend(options().serialize(envelope)?);
    Ok(bytes)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Envelope> {
    let payload = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| ModelError::Corrupt("missing artifact header".to_string()))?;

    options()
        .deserialize(payload)
        .map_err(|e| ModelError::Corrupt(e.to_string()))
}
