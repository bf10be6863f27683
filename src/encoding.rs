//! Boundary encodings
//!
//! The tree stores raw bytes. These convert application values at the API
//! edge, the way `keyEncoding` / `valueEncoding` options do for LevelDB-style
//! stores.

use crate::error::{BrambleError, Result};

/// Conversion between an application value and raw bytes
pub trait Encoding {
    type Value;

    fn encode(&self, value: &Self::Value) -> Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Value>;
}

/// Bytes as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

impl Encoding for Binary {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Vec<u8> {
        value.clone()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 strings
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl Encoding for Utf8 {
    type Value = String;

    fn encode(&self, value: &String) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| BrambleError::Serialization(format!("invalid UTF-8: {}", e)))
    }
}
