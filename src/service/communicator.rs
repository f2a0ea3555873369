//! Per-request communication with the client
//!
//! A [`ClientCommunicator`] owns the reply side of exactly one request stream.
//! It stamps local [`InternalData`] on everything it sends and enforces the
//! order of the exchange:
//!
//! ```text
//! AwaitingRequest ──ack──▶ AckSent ──▶ Processing ──┬─▶ ResponseSent ──┐
//!        │                                          └─▶ ErrorSent ─────┤
//!        └──────────────── failure ─────────────────────────────────────┴─▶ StreamEnded
//! ```
//!
//! Only one terminal message (response or failure) is ever sent per stream.

use crate::io::channel::MessageChannel;
use crate::io::message::{AppMessage, InternalData, EMPTY_DATA};
use crate::service::ServiceConfig;
use crate::types::{AppFlowError, JsonConvertible};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Position of a request stream in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicatorState {
    AwaitingRequest,
    AckSent,
    Processing,
    ResponseSent,
    ErrorSent,
    StreamEnded,
}

impl CommunicatorState {
    /// Whether a response or failure has already gone out
    pub fn has_responded(&self) -> bool {
        matches!(
            self,
            CommunicatorState::ResponseSent
                | CommunicatorState::ErrorSent
                | CommunicatorState::StreamEnded
        )
    }
}

impl fmt::Display for CommunicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommunicatorState::AwaitingRequest => "awaiting request",
            CommunicatorState::AckSent => "ack sent",
            CommunicatorState::Processing => "processing",
            CommunicatorState::ResponseSent => "response sent",
            CommunicatorState::ErrorSent => "error sent",
            CommunicatorState::StreamEnded => "stream ended",
        };
        f.write_str(name)
    }
}

/// Reply side of one request stream
pub struct ClientCommunicator {
    channel: Arc<dyn MessageChannel>,
    internal_data: InternalData,
    state: Mutex<CommunicatorState>,
}

impl fmt::Debug for ClientCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCommunicator")
            .field("internal_data", &self.internal_data)
            .field("state", &self.state())
            .finish()
    }
}

impl ClientCommunicator {
    /// Create a communicator for a new stream
    ///
    /// # Arguments
    ///
    /// * `channel` - Outgoing direction of the connection
    /// * `config` - Supplies the version and component name to stamp on messages
    pub fn new(channel: Arc<dyn MessageChannel>, config: &ServiceConfig) -> Self {
        Self {
            channel,
            internal_data: InternalData::new(&config.api_version, Some(&config.component_name)),
            state: Mutex::new(CommunicatorState::AwaitingRequest),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CommunicatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state
    pub fn state(&self) -> CommunicatorState {
        *self.lock()
    }

    /// Whether a response or failure has already gone out
    pub fn has_responded(&self) -> bool {
        self.state().has_responded()
    }

    fn send(&self, message: AppMessage) -> Result<(), AppFlowError> {
        let message = message.with_internal_data(&self.internal_data)?;
        self.channel.send(message.to_json()?)
    }

    /// Acknowledge the request
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the communicator is awaiting a request.
    pub fn send_ack(&self) -> Result<(), AppFlowError> {
        let mut state = self.lock();
        if *state != CommunicatorState::AwaitingRequest {
            return Err(AppFlowError::invalid_state("acknowledge", *state));
        }
        self.send(AppMessage::request_ack())?;
        *state = CommunicatorState::AckSent;
        Ok(())
    }

    /// Record that the request has been handed to business processing
    pub(crate) fn mark_processing(&self) {
        let mut state = self.lock();
        if *state == CommunicatorState::AckSent {
            *state = CommunicatorState::Processing;
        }
    }

    /// Send a `response` without ending the stream
    ///
    /// # Errors
    ///
    /// Returns `ResponseAlreadySent` if a terminal message already went out.
    pub fn send_response(&self, data: &str) -> Result<(), AppFlowError> {
        let mut state = self.lock();
        if state.has_responded() {
            return Err(AppFlowError::ResponseAlreadySent);
        }
        self.send(AppMessage::response(data))?;
        *state = CommunicatorState::ResponseSent;
        Ok(())
    }

    /// Send a `response` and end the stream
    pub fn send_response_and_end(&self, data: &str) -> Result<(), AppFlowError> {
        self.send_response(data)?;
        self.end_stream()
    }

    /// Send a `failure` with a structured error payload and end the stream
    ///
    /// # Arguments
    ///
    /// * `error_code` - Well-known code, see [`error_codes`](crate::io::message::error_codes)
    /// * `error_message` - Human readable description
    ///
    /// # Errors
    ///
    /// Returns `ResponseAlreadySent` if a terminal message already went out.
    pub fn send_response_as_error_and_end(
        &self,
        error_code: &str,
        error_message: &str,
    ) -> Result<(), AppFlowError> {
        {
            let mut state = self.lock();
            if state.has_responded() {
                return Err(AppFlowError::ResponseAlreadySent);
            }
            self.send(AppMessage::failure(error_code, error_message)?)?;
            *state = CommunicatorState::ErrorSent;
        }
        self.end_stream()
    }

    /// Send an empty response and end the stream
    pub fn finish_with_no_response(&self) -> Result<(), AppFlowError> {
        self.send_response_and_end(EMPTY_DATA)
    }

    /// End the stream; repeated calls are ignored
    pub fn end_stream(&self) -> Result<(), AppFlowError> {
        let mut state = self.lock();
        if *state == CommunicatorState::StreamEnded {
            return Ok(());
        }
        *state = CommunicatorState::StreamEnded;
        self.channel.send_end_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::channel::duplex;
    use crate::io::message::{error_codes, MessageType, API_VERSION};

    fn communicator() -> (ClientCommunicator, crate::io::ClientEnd) {
        let (connection, client) = duplex("orchestrator");
        let communicator = ClientCommunicator::new(connection.outgoing(), &ServiceConfig::default());
        (communicator, client)
    }

    #[tokio::test]
    async fn test_happy_path_states() {
        let (communicator, mut client) = communicator();
        assert_eq!(communicator.state(), CommunicatorState::AwaitingRequest);

        communicator.send_ack().unwrap();
        assert_eq!(communicator.state(), CommunicatorState::AckSent);
        communicator.mark_processing();
        assert_eq!(communicator.state(), CommunicatorState::Processing);
        communicator.send_response_and_end(r#"{"ok":true}"#).unwrap();
        assert_eq!(communicator.state(), CommunicatorState::StreamEnded);

        let messages = client.collect_stream().await;
        let types: Vec<_> = messages.iter().map(|m| m.message_type().clone()).collect();
        assert_eq!(types, vec![MessageType::RequestAck, MessageType::Response]);
        assert_eq!(messages[1].message_data(), r#"{"ok":true}"#);

        let internal = messages[1].internal_data().unwrap().unwrap();
        assert_eq!(internal.sender_api_version, API_VERSION);
    }

    #[tokio::test]
    async fn test_second_terminal_send_is_rejected() {
        let (communicator, _client) = communicator();
        communicator.send_ack().unwrap();
        communicator.send_response("{}").unwrap();

        assert_eq!(
            communicator.send_response("{}"),
            Err(AppFlowError::ResponseAlreadySent)
        );
        assert_eq!(
            communicator.send_response_as_error_and_end(error_codes::SERVICE_EXCEPTION, "late"),
            Err(AppFlowError::ResponseAlreadySent)
        );
    }

    #[tokio::test]
    async fn test_double_ack_is_rejected() {
        let (communicator, _client) = communicator();
        communicator.send_ack().unwrap();

        assert!(matches!(
            communicator.send_ack(),
            Err(AppFlowError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_error_response_carries_payload_and_ends_stream() {
        let (communicator, mut client) = communicator();

        communicator
            .send_response_as_error_and_end(error_codes::UNKNOWN_MESSAGE_TYPE, "what is ping")
            .unwrap();

        let messages = client.collect_stream().await;
        assert_eq!(messages.len(), 1);
        let payload = messages[0].error_payload().unwrap();
        assert_eq!(payload.error_code, error_codes::UNKNOWN_MESSAGE_TYPE);
        assert_eq!(communicator.state(), CommunicatorState::StreamEnded);
    }

    #[tokio::test]
    async fn test_finish_with_no_response_sends_empty_data() {
        let (communicator, mut client) = communicator();
        communicator.send_ack().unwrap();

        communicator.finish_with_no_response().unwrap();
        communicator.end_stream().unwrap();

        let messages = client.collect_stream().await;
        assert_eq!(messages.last().unwrap().message_data(), "{}");
        assert!(communicator.has_responded());
    }
}
