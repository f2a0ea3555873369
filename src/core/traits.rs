//! Core traits binding stage models to the outside world
//!
//! A stage model never talks to a transport directly. It reads its request from
//! a [`StageContext`] and hands its single response back to it. Two contexts
//! exist: one for requests received as messages by a service and one for
//! requests passed in by a host that launched a user-facing surface (see
//! [`HostLauncher`]).

use crate::types::{AppFlowError, FlowStage};

/// Source of a stage request and sink for its response
///
/// Implementations must tolerate being called from any thread.
pub trait StageContext: Send + Sync {
    /// Stage the request was made for
    fn stage(&self) -> FlowStage;

    /// JSON payload of the stage input
    fn request_data(&self) -> &str;

    /// Deliver the serialized response and end the exchange
    fn send_response(&self, response: String) -> Result<(), AppFlowError>;

    /// End the exchange without response data
    fn finish(&self) -> Result<(), AppFlowError>;
}

/// Host that launched a stage outside of a service connection
///
/// Supplies the request payload the surface was started with and receives the
/// eventual response string.
pub trait HostLauncher: Send + Sync {
    /// Stage the surface was launched for
    fn stage(&self) -> FlowStage;

    /// Launch payload, the JSON of the stage input
    fn request_data(&self) -> String;

    /// Return the response to whoever launched the surface
    fn deliver_response(&self, response: &str) -> Result<(), AppFlowError>;
}
