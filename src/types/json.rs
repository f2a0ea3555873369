//! JSON conversion for data-model records
//!
//! Every record exchanged between participants travels as a JSON string inside
//! an [`AppMessage`](crate::io::message::AppMessage). `serde_json` is the
//! serializer; this trait gives all serde types the same two entry points.

use crate::types::AppFlowError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Lossless JSON round-trip for any serde record
pub trait JsonConvertible: Sized {
    /// Serialize into a JSON string
    fn to_json(&self) -> Result<String, AppFlowError>;

    /// Deserialize from a JSON string
    fn from_json(json: &str) -> Result<Self, AppFlowError>;
}

impl<T> JsonConvertible for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_json(&self) -> Result<String, AppFlowError> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_json(json: &str) -> Result<Self, AppFlowError> {
        Ok(serde_json::from_str(json)?)
    }
}
