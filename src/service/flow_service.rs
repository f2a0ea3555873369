//! Stage-level service callbacks
//!
//! [`PaymentFlowService`] is what a flow or payment service actually
//! implements: one callback per stage, each receiving a bound stage model.
//! [`FlowServiceDispatcher`] turns such a service into an [`ApiHandler`] so it
//! can be served over a connection, and [`run_launched`] serves the same
//! callbacks for a stage started by a [`HostLauncher`].

use crate::core::{
    CardReadingModel, HostLauncher, LaunchedStageContext, PostFlowModel, PostTransactionModel,
    PreFlowModel, PreTransactionModel, ServiceStageContext, SplitModel, StageContext,
    TransactionProcessingModel,
};
use crate::service::{ApiHandler, ServiceContext};
use crate::types::{AppFlowError, FlowStage};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-stage callbacks of a flow or payment service
///
/// Flow-service stages default to skipping, `POST_FLOW` defaults to finishing
/// and the two payment-service stages default to `UnsupportedStage`.
#[async_trait]
pub trait PaymentFlowService: Send + Sync {
    async fn pre_flow(&self, model: PreFlowModel) -> Result<(), AppFlowError> {
        model.skip()
    }

    async fn split(&self, model: SplitModel) -> Result<(), AppFlowError> {
        model.skip()
    }

    async fn pre_transaction(&self, model: PreTransactionModel) -> Result<(), AppFlowError> {
        model.skip()
    }

    async fn post_card_reading(&self, model: PreTransactionModel) -> Result<(), AppFlowError> {
        model.skip()
    }

    async fn card_reading(&self, _model: CardReadingModel) -> Result<(), AppFlowError> {
        Err(AppFlowError::unsupported_stage(FlowStage::CardReading))
    }

    async fn transaction_processing(
        &self,
        _model: TransactionProcessingModel,
    ) -> Result<(), AppFlowError> {
        Err(AppFlowError::unsupported_stage(
            FlowStage::TransactionProcessing,
        ))
    }

    async fn post_transaction(&self, model: PostTransactionModel) -> Result<(), AppFlowError> {
        model.skip()
    }

    async fn post_flow(&self, model: PostFlowModel) -> Result<(), AppFlowError> {
        model.finish()
    }

    /// Abort work in progress
    async fn on_force_finish(&self) {}

    /// Whether pre-transaction models may change currency
    fn allows_currency_change(&self) -> bool {
        false
    }
}

/// Bind the right model for the context's stage and hand it to `service`
///
/// # Errors
///
/// Returns `UnsupportedStage` for `UNKNOWN`, any error binding the model, and
/// whatever the service callback returns.
pub async fn dispatch_stage(
    service: &dyn PaymentFlowService,
    context: Arc<dyn StageContext>,
) -> Result<(), AppFlowError> {
    let stage = context.stage();
    tracing::debug!(%stage, "binding stage model");
    match stage {
        FlowStage::PreFlow => service.pre_flow(PreFlowModel::from_context(context)?).await,
        FlowStage::Split => service.split(SplitModel::from_context(context)?).await,
        FlowStage::PreTransaction => {
            let model = PreTransactionModel::from_context(context)?
                .allow_currency_change(service.allows_currency_change());
            service.pre_transaction(model).await
        }
        FlowStage::PostCardReading => {
            let model = PreTransactionModel::from_context(context)?
                .allow_currency_change(service.allows_currency_change());
            service.post_card_reading(model).await
        }
        FlowStage::CardReading => {
            service
                .card_reading(CardReadingModel::from_context(context)?)
                .await
        }
        FlowStage::TransactionProcessing => {
            service
                .transaction_processing(TransactionProcessingModel::from_context(context)?)
                .await
        }
        FlowStage::PostTransaction => {
            service
                .post_transaction(PostTransactionModel::from_context(context)?)
                .await
        }
        FlowStage::PostFlow => service.post_flow(PostFlowModel::from_context(context)?).await,
        FlowStage::Unknown => Err(AppFlowError::unsupported_stage(stage)),
    }
}

/// Serve a stage that a host launched directly
pub async fn run_launched(
    service: &dyn PaymentFlowService,
    launcher: Arc<dyn HostLauncher>,
) -> Result<(), AppFlowError> {
    dispatch_stage(service, Arc::new(LaunchedStageContext::new(launcher))).await
}

/// [`ApiHandler`] serving a [`PaymentFlowService`]
#[derive(Clone)]
pub struct FlowServiceDispatcher {
    service: Arc<dyn PaymentFlowService>,
}

impl FlowServiceDispatcher {
    pub fn new(service: Arc<dyn PaymentFlowService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ApiHandler for FlowServiceDispatcher {
    async fn process_request(&self, context: ServiceContext) -> Result<(), AppFlowError> {
        dispatch_stage(
            self.service.as_ref(),
            Arc::new(ServiceStageContext::new(context)),
        )
        .await
    }

    async fn on_force_finish(&self) {
        self.service.on_force_finish().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::testing::{RecordingContext, RecordingLauncher};
    use crate::io::message::error_codes;
    use crate::io::{duplex, MessageType};
    use crate::service::{run_connection, ServiceConfig};
    use crate::types::{
        Amounts, FlowResponse, JsonConvertible, Payment, Transaction, TransactionRequest, SALE,
    };
    use rstest::rstest;
    use rust_decimal::Decimal;

    struct Defaults;

    #[async_trait]
    impl PaymentFlowService for Defaults {}

    struct Converting;

    #[async_trait]
    impl PaymentFlowService for Converting {
        async fn pre_transaction(
            &self,
            mut model: PreTransactionModel,
        ) -> Result<(), AppFlowError> {
            model.change_currency("GBP", Decimal::new(5, 1))?;
            model.send_response()
        }

        fn allows_currency_change(&self) -> bool {
            true
        }
    }

    fn payment() -> Payment {
        Payment::builder()
            .with_transaction_type(SALE)
            .with_amounts(Amounts::new(1000, "USD").unwrap())
            .build()
            .unwrap()
    }

    fn transaction_request(stage: FlowStage) -> String {
        let payment = payment();
        let transaction = Transaction::new(payment.amounts().clone());
        TransactionRequest::for_transaction(&payment, &transaction, stage)
            .to_json()
            .unwrap()
    }

    #[rstest]
    #[case::card_reading(FlowStage::CardReading)]
    #[case::transaction_processing(FlowStage::TransactionProcessing)]
    #[tokio::test]
    async fn test_payment_stages_unsupported_by_default(#[case] stage: FlowStage) {
        let (connection, mut client) = duplex("orchestrator");
        client.send_request(stage, &transaction_request(stage)).unwrap();

        let handler = Arc::new(FlowServiceDispatcher::new(Arc::new(Defaults)));
        run_connection(handler, connection, &ServiceConfig::default())
            .await
            .unwrap();

        let messages = client.collect_stream().await;
        assert_eq!(messages[1].message_type(), &MessageType::Failure);
        assert_eq!(
            messages[1].error_payload().unwrap().error_code,
            error_codes::UNSUPPORTED_STAGE
        );
    }

    #[tokio::test]
    async fn test_flow_stage_skipped_by_default() {
        let (connection, mut client) = duplex("orchestrator");
        client
            .send_request(FlowStage::PreFlow, &payment().to_json().unwrap())
            .unwrap();

        let handler = Arc::new(FlowServiceDispatcher::new(Arc::new(Defaults)));
        run_connection(handler, connection, &ServiceConfig::default())
            .await
            .unwrap();

        let messages = client.collect_stream().await;
        assert_eq!(messages[1].message_type(), &MessageType::Response);
        assert_eq!(messages[1].message_data(), "{}");
    }

    #[tokio::test]
    async fn test_unknown_stage_is_unsupported() {
        let result = dispatch_stage(
            &Defaults,
            Arc::new(RecordingContext::new(FlowStage::Unknown, "{}".to_string())),
        )
        .await;

        assert!(matches!(result, Err(AppFlowError::UnsupportedStage { .. })));
    }

    #[tokio::test]
    async fn test_currency_policy_follows_service() {
        let launcher = Arc::new(RecordingLauncher {
            context: RecordingContext::new(
                FlowStage::PreTransaction,
                transaction_request(FlowStage::PreTransaction),
            ),
        });

        run_launched(&Converting, launcher.clone()).await.unwrap();

        let response = FlowResponse::from_json(&launcher.context.sent()[0]).unwrap();
        let amounts = response.updated_request_amounts.unwrap();
        assert_eq!(amounts.currency(), "GBP");
        assert_eq!(amounts.base_amount_value(), 500);
    }
}
