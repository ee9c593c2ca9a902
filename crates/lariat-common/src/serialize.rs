use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, RpcError};

/// Configuration key of the JSON serializer.
pub const SERIALIZER_JSON: &str = "json";

/// Body serializer, selected at startup by string key and carried per
/// message as a one-byte id in the frame header.
///
/// JSON is the shipped format; further formats slot in as variants with
/// their own id. Bodies contain dynamic `serde_json::Value` parameters, so
/// any additional format must be self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializer {
    Json,
}

impl Serializer {
    /// Resolve a configured serializer key. Unknown keys are a
    /// configuration error detected at lookup time.
    pub fn for_key(key: &str) -> Result<Self> {
        match key {
            SERIALIZER_JSON => Ok(Serializer::Json),
            other => Err(RpcError::Config(format!(
                "unknown serializer key '{other}'"
            ))),
        }
    }

    /// Resolve the serializer id declared in a frame header. Unknown ids
    /// make the whole message undecodable.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Serializer::Json),
            other => Err(RpcError::Protocol(format!(
                "unrecognized serializer id {other}"
            ))),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Serializer::Json => 0,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Serializer::Json => SERIALIZER_JSON,
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Serializer::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Serializer::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }
}
