//! Service side of the message protocol
//!
//! - `config` - Identity and lifecycle policy of a service
//! - `communicator` - Reply state machine for one request stream
//! - `dispatch` - Per-connection message loop and the [`ApiHandler`] seam
//! - `flow_service` - Stage-level callbacks on top of [`ApiHandler`]
//! - `host` - Serving many connections concurrently

pub mod communicator;
pub mod config;
pub mod dispatch;
pub mod flow_service;
pub mod host;

pub use communicator::{ClientCommunicator, CommunicatorState};
pub use config::{ServiceConfig, ServiceLifecycle, DEFAULT_COMPONENT_NAME};
pub use dispatch::{run_connection, ApiHandler, ServiceContext};
pub use flow_service::{dispatch_stage, run_launched, FlowServiceDispatcher, PaymentFlowService};
pub use host::ServiceHost;
