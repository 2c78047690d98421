//! Binary record codec — the single encode/decode path for every schema
//! record in the system.
//!
//! Records are encoded with bincode's varint options and trailing bytes are
//! rejected, so a buffer either decodes to exactly one structurally-valid
//! record or fails. The codec never resolves cross-references; that is the
//! loader's job.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_varint_encoding()
        .reject_trailing_bytes()
}

/// Encode one record. `schema` names the record kind for error reporting.
pub fn encode<T: Serialize>(schema: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    options()
        .serialize(value)
        .map_err(|e| CodecError::Unencodable(schema, e))
}

/// Decode exactly one record from `bytes`.
pub fn decode<T: DeserializeOwned>(schema: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    options()
        .deserialize(bytes)
        .map_err(|e| CodecError::Malformed(schema, e))
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed {0} record: {1}")]
    Malformed(&'static str, bincode::Error),

    #[error("failed to encode {0} record: {1}")]
    Unencodable(&'static str, bincode::Error),
}
