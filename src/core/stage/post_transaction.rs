//! Post-transaction stage
//!
//! Runs after each transaction has been processed. Amounts can no longer be
//! changed; a flow service may only add references and request data, for
//! example a loyalty receipt number.

use super::{decode_request, send_flow_response, skip_response, ResponseAccumulator};
use crate::core::StageContext;
use crate::types::{AppFlowError, DataType, FlowResponse, FlowStage, TransactionSummary};
use std::sync::Arc;

/// Model for the `POST_TRANSACTION` stage
pub struct PostTransactionModel {
    context: Arc<dyn StageContext>,
    summary: TransactionSummary,
    response: ResponseAccumulator,
}

impl PostTransactionModel {
    /// Bind to a context carrying a [`TransactionSummary`]
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let summary: TransactionSummary =
            decode_request(context.as_ref(), &[FlowStage::PostTransaction])?;
        let response = ResponseAccumulator::new(&summary.request.amounts);
        Ok(Self {
            context,
            summary,
            response,
        })
    }

    pub fn transaction_summary(&self) -> &TransactionSummary {
        &self.summary
    }

    /// Add a payment reference to the transaction
    pub fn add_payment_references<T: DataType>(&mut self, key: &str, value: T) {
        self.response.references.add_data(key, value);
    }

    pub fn add_request_data<T: DataType>(&mut self, key: &str, value: T) {
        self.response.request_data.add_data(key, value);
    }

    pub fn flow_response(&self) -> Result<FlowResponse, AppFlowError> {
        self.response.flow_response()
    }

    pub fn send_response(self) -> Result<(), AppFlowError> {
        let response = self.response.flow_response()?;
        send_flow_response(self.context.as_ref(), &response)
    }

    pub fn skip(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &skip_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::testing::RecordingContext;
    use crate::types::{
        Amounts, JsonConvertible, Payment, Transaction, TransactionRequest,
        TransactionResponseBuilder, SALE,
    };

    fn context() -> Arc<RecordingContext> {
        let amounts = Amounts::new(1000, "USD").unwrap();
        let payment = Payment::builder()
            .with_transaction_type(SALE)
            .with_amounts(amounts.clone())
            .build()
            .unwrap();
        let mut transaction = Transaction::new(amounts.clone());
        transaction.add_transaction_response(
            TransactionResponseBuilder::new().approve(amounts).build().unwrap(),
        );
        let request =
            TransactionRequest::for_transaction(&payment, &transaction, FlowStage::PostTransaction);
        let summary = TransactionSummary::new(request, &transaction);
        Arc::new(RecordingContext::new(
            FlowStage::PostTransaction,
            summary.to_json().unwrap(),
        ))
    }

    #[test]
    fn test_binds_summary() {
        let model = PostTransactionModel::from_context(context()).unwrap();

        let summary = model.transaction_summary();
        assert_eq!(summary.transaction_responses.len(), 1);
        assert_eq!(summary.remaining_amounts.base_amount_value(), 0);
    }

    #[test]
    fn test_references_are_sent() {
        let context = context();
        let mut model = PostTransactionModel::from_context(context.clone()).unwrap();
        model.add_payment_references("receiptNumber", "R-0001".to_string());
        model.send_response().unwrap();

        let response = FlowResponse::from_json(&context.sent()[0]).unwrap();
        assert!(response.updated_request_amounts.is_none());
        assert_eq!(
            response
                .payment_references
                .unwrap()
                .get_value::<String>("receiptNumber"),
            Some("R-0001".to_string())
        );
    }

    #[test]
    fn test_skip_sends_empty_response() {
        let context = context();
        PostTransactionModel::from_context(context.clone())
            .unwrap()
            .skip()
            .unwrap();

        assert_eq!(context.sent(), vec!["{}".to_string()]);
    }
}
