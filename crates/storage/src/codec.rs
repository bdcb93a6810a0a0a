//! Value codecs.
//!
//! JSON is the default encoding: a type opts in with an empty
//! `impl JsonValue for T {}`. Types with a canonical binary form implement
//! [`StoreValue`] directly.

use serde::{Serialize, de::DeserializeOwned};
use vertex_swarm_bandwidth_primitives::{Int256, Uint256};

use crate::{StoreError, StoreResult};

/// Encoding of a value stored under a key.
pub trait StoreValue: Sized {
    fn encode_value(&self) -> StoreResult<Vec<u8>>;

    fn decode_value(bytes: &[u8]) -> StoreResult<Self>;
}

/// Marker for values stored as JSON.
pub trait JsonValue: Serialize + DeserializeOwned {}

impl<T: JsonValue> StoreValue for T {
    fn encode_value(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn decode_value(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl JsonValue for u64 {}
impl JsonValue for i64 {}
impl JsonValue for bool {}
impl JsonValue for String {}

#[cfg(feature = "alloy")]
impl JsonValue for alloy_primitives::Address {}
#[cfg(feature = "alloy")]
impl JsonValue for alloy_primitives::B256 {}

impl StoreValue for Uint256 {
    fn encode_value(&self) -> StoreResult<Vec<u8>> {
        Ok(self.to_be_bytes().to_vec())
    }

    fn decode_value(bytes: &[u8]) -> StoreResult<Self> {
        Uint256::from_be_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl StoreValue for Int256 {
    fn encode_value(&self) -> StoreResult<Vec<u8>> {
        Ok(self.to_bytes())
    }

    fn decode_value(bytes: &[u8]) -> StoreResult<Self> {
        Int256::from_bytes(bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}
