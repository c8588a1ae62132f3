//! Row encoding and key-column extraction.

use crate::error::{CodecError, CodecResult};
use crate::key::check_integer_key;
use kvtable_engine::Key;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes rows of one table as CBOR and extracts their key column.
///
/// Works for any serde row type that serializes to a map of named fields,
/// including [`crate::Row`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCodec {
    key_column: String,
}

impl RowCodec {
    /// Creates a codec for rows keyed by `key_column`.
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
        }
    }

    /// The key column name.
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Extracts the row's key and encodes the row.
    ///
    /// # Errors
    ///
    /// Fails if the row is not a map, lacks the key column, or its key is
    /// neither a supported integer nor a string.
    pub fn encode<R: Serialize>(&self, row: &R) -> CodecResult<(Key, Vec<u8>)> {
        let tree = ciborium::Value::serialized(row)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        let key = self.extract_key(&tree)?;
        let mut bytes = Vec::new();
        ciborium::into_writer(&tree, &mut bytes)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok((key, bytes))
    }

    /// Decodes a stored row.
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not a CBOR encoding of `R`.
    pub fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<R> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    fn extract_key(&self, tree: &ciborium::Value) -> CodecResult<Key> {
        let fields = tree.as_map().ok_or(CodecError::NotAMap)?;
        let value = fields
            .iter()
            .find(|(k, _)| k.as_text() == Some(self.key_column.as_str()))
            .map(|(_, v)| v)
            .ok_or_else(|| CodecError::MissingKeyColumn {
                column: self.key_column.clone(),
            })?;
        match value {
            ciborium::Value::Text(s) => Ok(Key::Text(s.clone())),
            ciborium::Value::Integer(n) => {
                let n = i128::from(*n);
                let n = u64::try_from(n)
                    .map_err(|_| CodecError::invalid_key(format!("negative integer key {n}")))?;
                check_integer_key(n)?;
                Ok(Key::Integer(n))
            }
            other => Err(CodecError::invalid_key(format!(
                "key column '{}' must be an integer or a string, found {other:?}",
                self.key_column
            ))),
        }
    }
}
