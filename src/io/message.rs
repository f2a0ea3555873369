//! Message envelope exchanged between client, orchestrator and service
//!
//! Every string sent over a channel is an [`AppMessage`]: a message type, a
//! JSON payload carried as a string, and side-channel [`InternalData`]
//! metadata (also carried as a JSON string).
//!
//! ```text
//! { "messageType": "request"|"response"|"failure"|"forceFinish"|"requestAck",
//!   "messageData": "<JSON string, default \"{}\">",
//!   "internalData": "<JSON string of InternalData, optional>" }
//! ```

use crate::types::{AppFlowError, FlowStage, JsonConvertible};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Protocol version spoken by this library
pub const API_VERSION: &str = "2.0.0";

/// Internal-data key carrying the stage name of a request
pub const STAGE_KEY: &str = "stage";

/// Payload of a message without data
pub const EMPTY_DATA: &str = "{}";

/// Well-known error codes carried in failure messages
pub mod error_codes {
    /// The receiver does not understand the message type
    pub const UNKNOWN_MESSAGE_TYPE: &str = "unknownMessageType";
    /// The service failed unexpectedly while processing the request
    pub const SERVICE_EXCEPTION: &str = "serviceException";
    /// A flow service reported a failure
    pub const FLOW_SERVICE_ERROR: &str = "flowServiceError";
    /// The envelope or its payload could not be decoded
    pub const INVALID_MESSAGE: &str = "invalidMessage";
    /// The service does not handle the requested stage
    pub const UNSUPPORTED_STAGE: &str = "unsupportedStage";
    /// The service tried to send a response that violates the protocol
    pub const INVALID_RESPONSE: &str = "invalidResponse";
}

/// Type of an [`AppMessage`]
///
/// Unrecognised types are preserved in `Unknown` so they can be reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Request,
    Response,
    Failure,
    ForceFinish,
    RequestAck,
    Unknown(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Failure => "failure",
            MessageType::ForceFinish => "forceFinish",
            MessageType::RequestAck => "requestAck",
            MessageType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "request" => MessageType::Request,
            "response" => MessageType::Response,
            "failure" => MessageType::Failure,
            "forceFinish" => MessageType::ForceFinish,
            "requestAck" => MessageType::RequestAck,
            _ => MessageType::Unknown(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side-channel metadata attached to a message
///
/// Never exposed to the business payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalData {
    pub sender_api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_component_name: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, String>,
}

impl InternalData {
    pub fn new(sender_api_version: &str, sender_component_name: Option<&str>) -> Self {
        InternalData {
            sender_api_version: sender_api_version.to_string(),
            sender_component_name: sender_component_name.map(str::to_string),
            additional_data: BTreeMap::new(),
        }
    }

    /// Record the stage a request is meant for
    pub fn with_stage(mut self, stage: FlowStage) -> Self {
        self.additional_data
            .insert(STAGE_KEY.to_string(), stage.as_str().to_string());
        self
    }

    /// Stage named in the metadata, `Unknown` if absent or unrecognised
    pub fn stage(&self) -> FlowStage {
        self.additional_data
            .get(STAGE_KEY)
            .map(|name| FlowStage::parse_lenient(name))
            .unwrap_or(FlowStage::Unknown)
    }
}

/// Payload of a `failure` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_code: String,
    pub error_message: String,
}

impl ErrorPayload {
    pub fn new(error_code: &str, error_message: &str) -> Self {
        ErrorPayload {
            error_code: error_code.to_string(),
            error_message: error_message.to_string(),
        }
    }
}

/// The wire envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMessage {
    message_type: MessageType,
    #[serde(default = "empty_data")]
    message_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    internal_data: Option<String>,
}

fn empty_data() -> String {
    EMPTY_DATA.to_string()
}

impl AppMessage {
    /// Create a message of the given type carrying `message_data`
    pub fn new(message_type: MessageType, message_data: &str) -> Self {
        AppMessage {
            message_type,
            message_data: message_data.to_string(),
            internal_data: None,
        }
    }

    pub fn request(message_data: &str) -> Self {
        Self::new(MessageType::Request, message_data)
    }

    pub fn response(message_data: &str) -> Self {
        Self::new(MessageType::Response, message_data)
    }

    pub fn request_ack() -> Self {
        Self::new(MessageType::RequestAck, EMPTY_DATA)
    }

    pub fn force_finish() -> Self {
        Self::new(MessageType::ForceFinish, EMPTY_DATA)
    }

    /// Create a `failure` message carrying an [`ErrorPayload`]
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the payload can not be encoded.
    pub fn failure(error_code: &str, error_message: &str) -> Result<Self, AppFlowError> {
        let payload = ErrorPayload::new(error_code, error_message).to_json()?;
        Ok(Self::new(MessageType::Failure, &payload))
    }

    /// Attach metadata, replacing any present
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the metadata can not be encoded.
    pub fn with_internal_data(mut self, internal_data: &InternalData) -> Result<Self, AppFlowError> {
        self.internal_data = Some(internal_data.to_json()?);
        Ok(self)
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn message_data(&self) -> &str {
        &self.message_data
    }

    /// Raw metadata string, if any
    pub fn raw_internal_data(&self) -> Option<&str> {
        self.internal_data.as_deref()
    }

    /// Decoded metadata
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the message carries no metadata.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the metadata is present but malformed.
    pub fn internal_data(&self) -> Result<Option<InternalData>, AppFlowError> {
        self.internal_data
            .as_deref()
            .map(InternalData::from_json)
            .transpose()
    }

    /// Decoded error payload of a `failure` message
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if self.message_type != MessageType::Failure {
            return None;
        }
        ErrorPayload::from_json(&self.message_data).ok()
    }
}

/// Result of comparing a peer's protocol version with ours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Match,
    RemoteNewer,
    RemoteOlder,
    Unparseable,
}

fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.trim().split('.');
    let mut next = || -> Option<u64> {
        match parts.next() {
            Some(part) => part.parse().ok(),
            None => Some(0),
        }
    };
    let version = (next()?, next()?, next()?);
    Some(version)
}

/// Compare two `major.minor.patch` versions; missing components count as 0
pub fn compare_api_versions(local: &str, remote: &str) -> VersionCheck {
    match (parse_version(local), parse_version(remote)) {
        (Some(local), Some(remote)) => match remote.cmp(&local) {
            Ordering::Equal => VersionCheck::Match,
            Ordering::Greater => VersionCheck::RemoteNewer,
            Ordering::Less => VersionCheck::RemoteOlder,
        },
        _ => VersionCheck::Unparseable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::request("request", MessageType::Request)]
    #[case::response("response", MessageType::Response)]
    #[case::failure("failure", MessageType::Failure)]
    #[case::force_finish("forceFinish", MessageType::ForceFinish)]
    #[case::ack("requestAck", MessageType::RequestAck)]
    #[case::unknown("ping", MessageType::Unknown("ping".to_string()))]
    fn test_message_type_wire_names(#[case] wire: &str, #[case] expected: MessageType) {
        let json = format!(r#"{{"messageType":"{}"}}"#, wire);
        let message = AppMessage::from_json(&json).unwrap();
        assert_eq!(message.message_type(), &expected);
        assert_eq!(message.message_type().as_str(), wire);
    }

    #[test]
    fn test_message_data_defaults_to_empty_object() {
        let message = AppMessage::from_json(r#"{"messageType":"request"}"#).unwrap();
        assert_eq!(message.message_data(), "{}");
        assert_eq!(message.internal_data().unwrap(), None);
    }

    #[test]
    fn test_internal_data_round_trip() {
        let internal = InternalData::new(API_VERSION, Some("com.example.pos"))
            .with_stage(FlowStage::PreTransaction);
        let message = AppMessage::request(r#"{"a":1}"#)
            .with_internal_data(&internal)
            .unwrap();

        let json = message.to_json().unwrap();
        let restored = AppMessage::from_json(&json).unwrap();
        let restored_internal = restored.internal_data().unwrap().unwrap();

        assert_eq!(restored, message);
        assert_eq!(restored_internal.stage(), FlowStage::PreTransaction);
        assert_eq!(
            restored_internal.sender_component_name.as_deref(),
            Some("com.example.pos")
        );
    }

    #[test]
    fn test_stage_defaults_to_unknown() {
        let internal = InternalData::new(API_VERSION, None);
        assert_eq!(internal.stage(), FlowStage::Unknown);
    }

    #[test]
    fn test_failure_carries_error_payload() {
        let message = AppMessage::failure(error_codes::SERVICE_EXCEPTION, "boom").unwrap();
        assert_eq!(message.message_type(), &MessageType::Failure);

        let payload = message.error_payload().unwrap();
        assert_eq!(payload.error_code, "serviceException");
        assert_eq!(payload.error_message, "boom");
        assert!(message.message_data().contains("\"errorCode\""));
    }

    #[test]
    fn test_malformed_internal_data_is_an_error() {
        let message =
            AppMessage::from_json(r#"{"messageType":"request","internalData":"not json"}"#).unwrap();
        assert!(message.internal_data().is_err());
    }

    #[rstest]
    #[case::same("2.0.0", "2.0.0", VersionCheck::Match)]
    #[case::short_form("2.0.0", "2", VersionCheck::Match)]
    #[case::newer_minor("2.0.0", "2.1.0", VersionCheck::RemoteNewer)]
    #[case::older_major("2.0.0", "1.9.9", VersionCheck::RemoteOlder)]
    #[case::garbage("2.0.0", "two", VersionCheck::Unparseable)]
    fn test_compare_api_versions(
        #[case] local: &str,
        #[case] remote: &str,
        #[case] expected: VersionCheck,
    ) {
        assert_eq!(compare_api_versions(local, remote), expected);
    }
}
