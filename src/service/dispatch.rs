//! Message dispatch for one connection
//!
//! [`run_connection`] reads envelopes from a [`Connection`] and drives one
//! [`ClientCommunicator`] per request stream.
//!
//! # Dispatch rules
//!
//! - `request`: acknowledged before anything else happens, then handed to the
//!   [`ApiHandler`] together with the stage named in its internal data
//!   (`UNKNOWN` when absent)
//! - `forceFinish`: the handler's abort callback runs, any in-flight request is
//!   dropped and the stream still ends with an empty response
//! - anything else: answered with an `unknownMessageType` failure
//!
//! Handler errors always produce a `failure` on the wire before anything is
//! propagated locally. Protocol errors carry their own code and are not
//! re-raised; every other error (and any panic) is reported as
//! `serviceException` and then returned (or resumed) to the caller.

use crate::io::channel::{ChannelEvent, Connection};
use crate::io::message::{
    compare_api_versions, error_codes, AppMessage, InternalData, MessageType, VersionCheck,
};
use crate::service::{ClientCommunicator, ServiceConfig, ServiceLifecycle};
use crate::types::{AppFlowError, FlowStage, JsonConvertible};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything a handler needs to serve one request
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// Stage named by the request, `Unknown` if absent
    pub stage: FlowStage,
    /// JSON payload of the request
    pub message_data: String,
    /// Metadata sent by the client, if any
    pub sender: Option<InternalData>,
    /// Reply side of this request stream
    pub communicator: Arc<ClientCommunicator>,
}

/// Business side of a service connection
#[async_trait]
pub trait ApiHandler: Send + Sync {
    /// Serve one acknowledged request
    ///
    /// The handler is expected to send exactly one terminal message through
    /// `context.communicator`. Returning an error instead makes the dispatcher
    /// send a failure on its behalf.
    async fn process_request(&self, context: ServiceContext) -> Result<(), AppFlowError>;

    /// Abort any work in progress; called on `forceFinish`
    async fn on_force_finish(&self) {}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn check_version(config: &ServiceConfig, sender: Option<&InternalData>) {
    let Some(sender) = sender else {
        return;
    };
    match compare_api_versions(&config.api_version, &sender.sender_api_version) {
        VersionCheck::Match => {}
        VersionCheck::RemoteNewer | VersionCheck::RemoteOlder => warn!(
            local = %config.api_version,
            remote = %sender.sender_api_version,
            sender = sender.sender_component_name.as_deref().unwrap_or("unknown"),
            "api version mismatch"
        ),
        VersionCheck::Unparseable => warn!(
            remote = %sender.sender_api_version,
            "unparseable sender api version"
        ),
    }
}

fn is_force_finish(raw: &str) -> bool {
    AppMessage::from_json(raw)
        .map(|message| *message.message_type() == MessageType::ForceFinish)
        .unwrap_or(false)
}

/// Serve a connection until the client goes away or the lifecycle says stop
///
/// # Arguments
///
/// * `handler` - Business side serving requests
/// * `connection` - Connection to read from and reply on
/// * `config` - Identity and lifecycle policy
///
/// # Returns
///
/// The number of request streams that were completed.
///
/// # Errors
///
/// Returns any non-protocol error raised by the handler, after the client has
/// been sent a `serviceException` failure. A panicking handler is reported the
/// same way and the panic is then resumed.
pub async fn run_connection(
    handler: Arc<dyn ApiHandler>,
    mut connection: Connection,
    config: &ServiceConfig,
) -> Result<usize, AppFlowError> {
    let mut completed = 0;
    let mut backlog = VecDeque::new();

    loop {
        let event = match backlog.pop_front() {
            Some(event) => event,
            None => match connection.next_event().await {
                Some(event) => event,
                None => break,
            },
        };
        let raw = match event {
            ChannelEvent::Message(raw) => raw,
            ChannelEvent::EndOfStream => {
                debug!("client ended its stream");
                break;
            }
        };

        let communicator = Arc::new(ClientCommunicator::new(connection.outgoing(), config));
        let message = match AppMessage::from_json(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "undecodable message");
                communicator
                    .send_response_as_error_and_end(error_codes::INVALID_MESSAGE, &e.to_string())?;
                completed += 1;
                if config.lifecycle == ServiceLifecycle::StopAfterStream {
                    break;
                }
                continue;
            }
        };

        let sender = match message.internal_data() {
            Ok(sender) => sender,
            Err(e) => {
                warn!(error = %e, "ignoring malformed internal data");
                None
            }
        };
        check_version(config, sender.as_ref());

        match message.message_type() {
            MessageType::Request => {
                let stage = sender.as_ref().map_or(FlowStage::Unknown, InternalData::stage);
                let context = ServiceContext {
                    stage,
                    message_data: message.message_data().to_string(),
                    sender,
                    communicator: Arc::clone(&communicator),
                };
                dispatch_request(&handler, &mut connection, &mut backlog, context).await?;
            }
            MessageType::ForceFinish => {
                info!("force finish while idle");
                handler.on_force_finish().await;
                communicator.finish_with_no_response()?;
            }
            other => {
                warn!(message_type = %other, "unknown message type");
                communicator.send_response_as_error_and_end(
                    error_codes::UNKNOWN_MESSAGE_TYPE,
                    &AppFlowError::unknown_message_type(other.as_str()).to_string(),
                )?;
            }
        }

        completed += 1;
        if config.lifecycle == ServiceLifecycle::StopAfterStream {
            break;
        }
    }

    Ok(completed)
}

/// Run one acknowledged request to completion
///
/// Messages other than `forceFinish` that arrive meanwhile are queued in
/// `backlog` and served afterwards.
async fn dispatch_request(
    handler: &Arc<dyn ApiHandler>,
    connection: &mut Connection,
    backlog: &mut VecDeque<ChannelEvent>,
    context: ServiceContext,
) -> Result<(), AppFlowError> {
    let communicator = Arc::clone(&context.communicator);
    let stage = context.stage;

    communicator.send_ack()?;
    communicator.mark_processing();
    info!(%stage, "dispatching request");

    let work = AssertUnwindSafe(handler.process_request(context)).catch_unwind();
    tokio::pin!(work);

    let mut inbound_open = true;
    let outcome = loop {
        tokio::select! {
            biased;
            outcome = &mut work => break outcome,
            event = connection.next_event(), if inbound_open => match event {
                Some(ChannelEvent::Message(raw)) if is_force_finish(&raw) => {
                    info!(%stage, "force finish during request");
                    handler.on_force_finish().await;
                    if !communicator.has_responded() {
                        communicator.finish_with_no_response()?;
                    }
                    return Ok(());
                }
                Some(event @ ChannelEvent::Message(_)) => {
                    debug!(%stage, "queueing message received while a request is in flight");
                    backlog.push_back(event);
                }
                Some(ChannelEvent::EndOfStream) => {
                    debug!(%stage, "client ended its stream during request");
                    backlog.push_back(ChannelEvent::EndOfStream);
                    inbound_open = false;
                }
                None => inbound_open = false,
            },
        }
    };

    match outcome {
        Ok(Ok(())) => {
            if !communicator.has_responded() {
                warn!(%stage, "handler returned without responding, sending empty response");
                communicator.finish_with_no_response()?;
            }
            communicator.end_stream()?;
        }
        Ok(Err(e)) if e.is_protocol_error() => {
            warn!(%stage, error = %e, "request failed");
            report_failure(&communicator, e.error_code(), &e.to_string());
        }
        Ok(Err(e)) => {
            error!(%stage, error = %e, "service exception");
            report_failure(&communicator, error_codes::SERVICE_EXCEPTION, &e.to_string());
            return Err(e);
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(%stage, panic = %message, "handler panicked");
            report_failure(&communicator, error_codes::SERVICE_EXCEPTION, &message);
            std::panic::resume_unwind(panic);
        }
    }

    Ok(())
}

fn report_failure(communicator: &ClientCommunicator, error_code: &str, message: &str) {
    if communicator.has_responded() {
        debug!(error_code, "response already sent, failure not reported to client");
        if let Err(e) = communicator.end_stream() {
            debug!(error = %e, "could not end stream");
        }
        return;
    }
    if let Err(e) = communicator.send_response_as_error_and_end(error_code, message) {
        warn!(error = %e, "could not report failure to client");
    }
}
