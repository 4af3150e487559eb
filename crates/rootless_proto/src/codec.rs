//! Wire (de)serialization. No padding or batching — spec.md names "no
//! on-wire framing beyond the canonical byte layout of signed objects" as
//! a non-goal, so this crate carries no cryptographic logic of its own,
//! just JSON in and out.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtoError;

pub fn to_wire_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtoError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn from_wire_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtoError> {
    Ok(serde_json::from_slice(bytes)?)
}
