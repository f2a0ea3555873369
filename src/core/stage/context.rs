//! The two ways a stage model can be bound
//!
//! [`ServiceStageContext`] wraps a request received over a service connection
//! and replies through its [`ClientCommunicator`](crate::service::ClientCommunicator).
//! [`LaunchedStageContext`] wraps a [`HostLauncher`] that started a
//! user-facing surface with the request as its launch payload.

use crate::core::{HostLauncher, StageContext};
use crate::io::message::EMPTY_DATA;
use crate::service::ServiceContext;
use crate::types::{AppFlowError, FlowStage};
use std::sync::Arc;

/// Stage context for a request received as a message
#[derive(Debug, Clone)]
pub struct ServiceStageContext {
    context: ServiceContext,
}

impl ServiceStageContext {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

impl StageContext for ServiceStageContext {
    fn stage(&self) -> FlowStage {
        self.context.stage
    }

    fn request_data(&self) -> &str {
        &self.context.message_data
    }

    fn send_response(&self, response: String) -> Result<(), AppFlowError> {
        self.context.communicator.send_response_and_end(&response)
    }

    fn finish(&self) -> Result<(), AppFlowError> {
        self.context.communicator.finish_with_no_response()
    }
}

/// Stage context for a request passed in by a launching host
pub struct LaunchedStageContext {
    launcher: Arc<dyn HostLauncher>,
    stage: FlowStage,
    request_data: String,
}

impl LaunchedStageContext {
    /// Bind to a launcher, reading its payload once
    pub fn new(launcher: Arc<dyn HostLauncher>) -> Self {
        let stage = launcher.stage();
        let request_data = launcher.request_data();
        Self {
            launcher,
            stage,
            request_data,
        }
    }
}

impl StageContext for LaunchedStageContext {
    fn stage(&self) -> FlowStage {
        self.stage
    }

    fn request_data(&self) -> &str {
        &self.request_data
    }

    fn send_response(&self, response: String) -> Result<(), AppFlowError> {
        self.launcher.deliver_response(&response)
    }

    fn finish(&self) -> Result<(), AppFlowError> {
        self.launcher.deliver_response(EMPTY_DATA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::testing::{RecordingContext, RecordingLauncher};
    use crate::core::stage::PreTransactionModel;
    use crate::io::{duplex, MessageType};
    use crate::service::{ClientCommunicator, ServiceConfig};
    use crate::types::{Amounts, JsonConvertible, Payment, Transaction, TransactionRequest, SALE};

    fn request_json() -> String {
        let payment = Payment::builder()
            .with_transaction_type(SALE)
            .with_amounts(Amounts::new(1000, "USD").unwrap())
            .build()
            .unwrap();
        let transaction = Transaction::new(payment.amounts().clone());
        TransactionRequest::for_transaction(&payment, &transaction, FlowStage::PreTransaction)
            .to_json()
            .unwrap()
    }

    fn add_surcharge(context: Arc<dyn StageContext>) {
        let mut model = PreTransactionModel::from_context(context).unwrap();
        model.set_additional_amount("surcharge", 50);
        model.send_response().unwrap();
    }

    #[tokio::test]
    async fn test_both_bindings_produce_the_same_response() {
        let (connection, mut client) = duplex("orchestrator");
        let communicator = Arc::new(ClientCommunicator::new(
            connection.outgoing(),
            &ServiceConfig::default(),
        ));
        communicator.send_ack().unwrap();
        let service = ServiceStageContext::new(ServiceContext {
            stage: FlowStage::PreTransaction,
            message_data: request_json(),
            sender: None,
            communicator,
        });
        add_surcharge(Arc::new(service));

        let launcher = Arc::new(RecordingLauncher {
            context: RecordingContext::new(FlowStage::PreTransaction, request_json()),
        });
        let launched = LaunchedStageContext::new(launcher.clone());
        assert_eq!(launched.stage(), FlowStage::PreTransaction);
        add_surcharge(Arc::new(launched));

        let messages = client.collect_stream().await;
        let response = messages
            .iter()
            .find(|message| *message.message_type() == MessageType::Response)
            .unwrap();
        assert_eq!(launcher.context.sent(), vec![response.message_data().to_string()]);
    }

    #[test]
    fn test_launched_finish_delivers_empty_data() {
        let launcher = Arc::new(RecordingLauncher {
            context: RecordingContext::new(FlowStage::PostFlow, "{}".to_string()),
        });
        LaunchedStageContext::new(launcher.clone()).finish().unwrap();

        assert_eq!(launcher.context.sent(), vec![EMPTY_DATA.to_string()]);
    }
}
