//! Transaction processing stage
//!
//! Handled by the payment service. The transaction must end with exactly one
//! outcome, approved or declined, so there is no way to skip this stage.

use super::decode_request;
use crate::core::StageContext;
use crate::types::{
    AppFlowError, FlowStage, JsonConvertible, TransactionRequest, TransactionResponse,
    TransactionResponseBuilder,
};
use std::sync::Arc;

/// Model for the `TRANSACTION_PROCESSING` stage
pub struct TransactionProcessingModel {
    context: Arc<dyn StageContext>,
    request: TransactionRequest,
    builder: TransactionResponseBuilder,
}

impl TransactionProcessingModel {
    /// Bind to a context carrying a [`TransactionRequest`]
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedStage` if the context is for another stage and
    /// `Serialization` if the payload is not a transaction request.
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let request = decode_request(context.as_ref(), &[FlowStage::TransactionProcessing])?;
        Ok(Self {
            context,
            request,
            builder: TransactionResponseBuilder::new(),
        })
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    /// Builder for the outcome of this transaction
    pub fn transaction_response_builder(&mut self) -> &mut TransactionResponseBuilder {
        &mut self.builder
    }

    /// The response as it would be sent now
    ///
    /// # Errors
    ///
    /// Returns `MissingOutcome` if no outcome has been chosen yet.
    pub fn transaction_response(&self) -> Result<TransactionResponse, AppFlowError> {
        self.builder.build()
    }

    /// Send the transaction response
    ///
    /// # Errors
    ///
    /// Returns `MissingOutcome` without sending anything if neither approve nor
    /// decline was called on the builder.
    pub fn send_response(self) -> Result<(), AppFlowError> {
        let response = self.builder.build()?;
        tracing::debug!(
            transaction = %self.request.id,
            outcome = ?response.outcome(),
            "transaction processed"
        );
        self.context.send_response(response.to_json()?)
    }
}
