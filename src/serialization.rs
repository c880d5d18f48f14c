//! Argument encoding for call signatures.
//!
//! Every argument that takes part in a call signature is first turned into a
//! byte string. Two argument values are the same key component exactly when
//! their encodings are equal, so an encoder must be deterministic: the same
//! value always produces the same bytes.

use crate::error::Error;
use crate::Result;
use serde::Serialize;
use std::fmt::Debug;

/// Trait for encoding argument values into key components.
pub trait KeyEncoder: Send + Sync + Debug {
    /// Encode a value into bytes.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;
}

/// Bincode encoder, used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeEncoder;

impl BincodeEncoder {
    /// Create a new BincodeEncoder.
    pub fn new() -> Self {
        Self
    }
}

impl KeyEncoder for BincodeEncoder {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| Error::invalid_key(format!("{}", e)))
    }
}

/// JSON encoder.
///
/// Produces larger keys than bincode but keeps them human readable, which
/// helps when inspecting signatures in logs.
#[cfg(feature = "serde_json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

#[cfg(feature = "serde_json")]
impl JsonEncoder {
    /// Create a new JsonEncoder.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "serde_json")]
impl KeyEncoder for JsonEncoder {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| Error::invalid_key(format!("JSON encoding error: {}", e)))
    }
}
