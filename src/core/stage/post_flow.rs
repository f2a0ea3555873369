//! Post-flow stage
//!
//! Runs once the payment has completed. The outcome is final; a flow service
//! can only observe it (for receipts, analytics or loyalty accrual) and finish.

use super::decode_request;
use crate::core::StageContext;
use crate::types::{AppFlowError, FlowStage, PaymentResponse};
use std::sync::Arc;

/// Model for the `POST_FLOW` stage
pub struct PostFlowModel {
    context: Arc<dyn StageContext>,
    payment_response: PaymentResponse,
}

impl PostFlowModel {
    /// Bind to a context carrying the final [`PaymentResponse`]
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let payment_response = decode_request(context.as_ref(), &[FlowStage::PostFlow])?;
        Ok(Self {
            context,
            payment_response,
        })
    }

    pub fn payment_response(&self) -> &PaymentResponse {
        &self.payment_response
    }

    /// Signal completion without a response
    pub fn finish(self) -> Result<(), AppFlowError> {
        tracing::debug!(outcome = ?self.payment_response.outcome(), "post flow finished");
        self.context.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::testing::RecordingContext;
    use crate::types::{
        Amounts, JsonConvertible, Payment, PaymentOutcome, PaymentResponseBuilder, Transaction,
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
        let response = PaymentResponseBuilder::new(payment)
            .add_transaction(transaction)
            .build()
            .unwrap();
        Arc::new(RecordingContext::new(
            FlowStage::PostFlow,
            response.to_json().unwrap(),
        ))
    }

    #[test]
    fn test_observe_and_finish() {
        let context = context();
        let model = PostFlowModel::from_context(context.clone()).unwrap();

        assert_eq!(model.payment_response().outcome(), PaymentOutcome::Fulfilled);
        assert_eq!(
            model.payment_response().total_amounts_processed().base_amount_value(),
            1000
        );

        model.finish().unwrap();
        assert_eq!(context.sent(), vec![String::new()]);
    }
}
