//! Duplex string channel between a service and its client
//!
//! A connection is a pair of directions. Outgoing messages go through a
//! [`MessageChannel`], which never blocks the caller; incoming messages arrive
//! as [`ChannelEvent`]s on an unbounded receiver.
//!
//! # Architecture
//!
//! ```text
//! ClientEnd ──ChannelEvent──▶ Connection.incoming ──▶ run_connection
//!     ▲                                                      │
//!     └────────ChannelEvent──── ChannelSender ◀──────────────┘
//! ```

use crate::io::message::{AppMessage, InternalData, API_VERSION};
use crate::types::{AppFlowError, FlowStage, JsonConvertible};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Event observed on one direction of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A serialized [`AppMessage`]
    Message(String),
    /// The sender will not send anything more for the current stream
    EndOfStream,
}

/// Outgoing half of a duplex channel
///
/// Sends are fire-and-forget so they never block message dispatch.
pub trait MessageChannel: Send + Sync {
    /// Send one serialized message
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the peer has gone away.
    fn send(&self, message: String) -> Result<(), AppFlowError>;

    /// Signal the end of the current stream
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the peer has gone away.
    fn send_end_stream(&self) -> Result<(), AppFlowError>;
}

/// [`MessageChannel`] backed by a tokio unbounded sender
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: UnboundedSender<ChannelEvent>,
}

impl ChannelSender {
    pub fn new(tx: UnboundedSender<ChannelEvent>) -> Self {
        Self { tx }
    }
}

impl MessageChannel for ChannelSender {
    fn send(&self, message: String) -> Result<(), AppFlowError> {
        self.tx
            .send(ChannelEvent::Message(message))
            .map_err(|_| AppFlowError::ChannelClosed)
    }

    fn send_end_stream(&self) -> Result<(), AppFlowError> {
        self.tx
            .send(ChannelEvent::EndOfStream)
            .map_err(|_| AppFlowError::ChannelClosed)
    }
}

/// Service side of a connection
pub struct Connection {
    outgoing: Arc<dyn MessageChannel>,
    incoming: UnboundedReceiver<ChannelEvent>,
}

impl Connection {
    /// Create a connection from its two directions
    ///
    /// # Arguments
    ///
    /// * `outgoing` - Where messages for the peer are sent
    /// * `incoming` - Subscription to messages from the peer
    pub fn new(outgoing: Arc<dyn MessageChannel>, incoming: UnboundedReceiver<ChannelEvent>) -> Self {
        Self { outgoing, incoming }
    }

    /// Shared handle to the outgoing direction
    pub fn outgoing(&self) -> Arc<dyn MessageChannel> {
        Arc::clone(&self.outgoing)
    }

    /// Wait for the next incoming event
    ///
    /// # Returns
    ///
    /// `None` once the peer has dropped its sending half.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.incoming.recv().await
    }
}

/// Client side of an in-memory connection
///
/// Plays the orchestrator: sends requests and reads back whatever the service
/// emits.
pub struct ClientEnd {
    to_service: UnboundedSender<ChannelEvent>,
    from_service: UnboundedReceiver<ChannelEvent>,
    component_name: String,
}

impl ClientEnd {
    /// Send a prepared message
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the service side is gone, or `Serialization`
    /// if the message can not be encoded.
    pub fn send_message(&self, message: &AppMessage) -> Result<(), AppFlowError> {
        self.to_service
            .send(ChannelEvent::Message(message.to_json()?))
            .map_err(|_| AppFlowError::ChannelClosed)
    }

    /// Send a raw string, which need not be a valid envelope
    pub fn send_raw(&self, raw: &str) -> Result<(), AppFlowError> {
        self.to_service
            .send(ChannelEvent::Message(raw.to_string()))
            .map_err(|_| AppFlowError::ChannelClosed)
    }

    /// Send a `request` for the given stage
    ///
    /// # Arguments
    ///
    /// * `stage` - Stage recorded in the request's internal data
    /// * `data` - JSON payload of the stage input
    pub fn send_request(&self, stage: FlowStage, data: &str) -> Result<(), AppFlowError> {
        let internal = InternalData::new(API_VERSION, Some(&self.component_name)).with_stage(stage);
        let message = AppMessage::request(data).with_internal_data(&internal)?;
        self.send_message(&message)
    }

    /// Ask the service to abandon the in-flight request
    pub fn send_force_finish(&self) -> Result<(), AppFlowError> {
        let internal = InternalData::new(API_VERSION, Some(&self.component_name));
        let message = AppMessage::force_finish().with_internal_data(&internal)?;
        self.send_message(&message)
    }

    /// Tell the service no more messages will follow
    pub fn close(&self) -> Result<(), AppFlowError> {
        self.to_service
            .send(ChannelEvent::EndOfStream)
            .map_err(|_| AppFlowError::ChannelClosed)
    }

    /// Next raw event from the service
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.from_service.recv().await
    }

    /// Next message from the service
    ///
    /// # Returns
    ///
    /// `None` when the service ends its stream or goes away. Undecodable
    /// strings are skipped.
    pub async fn next_message(&mut self) -> Option<AppMessage> {
        loop {
            match self.from_service.recv().await? {
                ChannelEvent::Message(raw) => match AppMessage::from_json(&raw) {
                    Ok(message) => return Some(message),
                    Err(e) => tracing::warn!(error = %e, "client dropped undecodable message"),
                },
                ChannelEvent::EndOfStream => return None,
            }
        }
    }

    /// Read every message until the service ends the stream
    pub async fn collect_stream(&mut self) -> Vec<AppMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message().await {
            messages.push(message);
        }
        messages
    }
}

/// Create an in-memory connection pair
///
/// # Arguments
///
/// * `client_component_name` - Sender name stamped on client messages
///
/// # Returns
///
/// The service-side [`Connection`] and the matching [`ClientEnd`].
pub fn duplex(client_component_name: &str) -> (Connection, ClientEnd) {
    let (to_service, service_incoming) = mpsc::unbounded_channel();
    let (service_outgoing, from_service) = mpsc::unbounded_channel();

    let connection = Connection::new(
        Arc::new(ChannelSender::new(service_outgoing)),
        service_incoming,
    );
    let client = ClientEnd {
        to_service,
        from_service,
        component_name: client_component_name.to_string(),
    };

    (connection, client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::message::MessageType;

    #[tokio::test]
    async fn test_duplex_carries_messages_both_ways() {
        let (mut connection, mut client) = duplex("orchestrator");

        client.send_request(FlowStage::PreFlow, "{}").unwrap();
        let event = connection.next_event().await.unwrap();
        let ChannelEvent::Message(raw) = event else {
            panic!("expected a message");
        };
        let message = AppMessage::from_json(&raw).unwrap();
        assert_eq!(message.message_type(), &MessageType::Request);
        assert_eq!(
            message.internal_data().unwrap().unwrap().stage(),
            FlowStage::PreFlow
        );

        let outgoing = connection.outgoing();
        outgoing
            .send(AppMessage::request_ack().to_json().unwrap())
            .unwrap();
        outgoing.send_end_stream().unwrap();

        let received = client.collect_stream().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message_type(), &MessageType::RequestAck);
    }

    #[tokio::test]
    async fn test_send_after_peer_dropped_fails() {
        let (connection, client) = duplex("orchestrator");
        drop(client);

        let result = connection.outgoing().send("{}".to_string());

        assert_eq!(result, Err(AppFlowError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_incoming_ends_when_client_dropped() {
        let (mut connection, client) = duplex("orchestrator");
        client.close().unwrap();
        drop(client);

        assert_eq!(connection.next_event().await, Some(ChannelEvent::EndOfStream));
        assert_eq!(connection.next_event().await, None);
    }
}
