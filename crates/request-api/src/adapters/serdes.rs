//! Codecs for keys and values.

use crate::domain::error::SerdeError;
use crate::domain::request_id::RequestId;
use crate::ports::outbound::Serde;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// [`Serde`] implementation backed by `serde_json`.
pub struct JsonSerde<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerde<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerde<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Serde<T> for JsonSerde<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Vec<u8>, SerdeError> {
        serde_json::to_vec(value).map_err(SerdeError::from)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, SerdeError> {
        serde_json::from_slice(bytes).map_err(SerdeError::from)
    }
}

/// [`Serde`] for plain strings, encoded as raw UTF-8.
///
/// Used for the response-topic mapping value so downstream processors can
/// read the topic name without a JSON decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Serde;

impl Serde<String> for Utf8Serde {
    fn serialize(&self, value: &String) -> Result<Vec<u8>, SerdeError> {
        Ok(value.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String, SerdeError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| SerdeError(e.to_string()))
    }
}

/// [`Serde`] for request identifiers, encoded as the hyphenated UUID text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdSerde;

impl Serde<RequestId> for RequestIdSerde {
    fn serialize(&self, value: &RequestId) -> Result<Vec<u8>, SerdeError> {
        Ok(value.to_string().into_bytes())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<RequestId, SerdeError> {
        let text = std::str::from_utf8(bytes).map_err(|e| SerdeError(e.to_string()))?;
        RequestId::parse(text).map_err(|e| SerdeError(e.to_string()))
    }
}
