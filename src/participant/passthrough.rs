//! Participant that leaves every payment untouched

use crate::core::{PreFlowModel, PreTransactionModel};
use crate::service::PaymentFlowService;
use crate::types::AppFlowError;
use async_trait::async_trait;

/// Skips every flow-service stage
pub struct PassthroughParticipant;

#[async_trait]
impl PaymentFlowService for PassthroughParticipant {
    async fn pre_flow(&self, model: PreFlowModel) -> Result<(), AppFlowError> {
        tracing::debug!(payment = %model.payment().id(), "passing payment through");
        model.skip()
    }

    async fn pre_transaction(&self, model: PreTransactionModel) -> Result<(), AppFlowError> {
        tracing::debug!(transaction = %model.request().id, "passing transaction through");
        model.skip()
    }
}
