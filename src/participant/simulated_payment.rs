//! Simulated payment service
//!
//! Handles the two payment-service stages without any real card hardware or
//! acquirer. Card reading always presents the same test card; processing
//! approves the full requested amount unless it exceeds the decline limit.

use crate::core::{CardReadingModel, TransactionProcessingModel};
use crate::service::PaymentFlowService;
use crate::types::{AppFlowError, Card};
use async_trait::async_trait;
use uuid::Uuid;

/// Masked PAN of the test card
pub const TEST_CARD_PAN: &str = "4761 73** **** 0010";

const APPROVED_CODE: &str = "00";
const DECLINED_CODE: &str = "05";

pub struct SimulatedPaymentParticipant {
    decline_above: Option<i64>,
}

impl SimulatedPaymentParticipant {
    /// # Arguments
    ///
    /// * `decline_above` - Totals above this many subunits are declined
    pub fn new(decline_above: Option<i64>) -> Self {
        Self { decline_above }
    }

    fn test_card() -> Card {
        Card {
            cardholder_name: Some("TEST CARDHOLDER".to_string()),
            expiry_date: Some("3012".to_string()),
            ..Card::new(TEST_CARD_PAN)
        }
    }
}

#[async_trait]
impl PaymentFlowService for SimulatedPaymentParticipant {
    async fn card_reading(&self, model: CardReadingModel) -> Result<(), AppFlowError> {
        model.approve_with_card(Self::test_card())
    }

    async fn transaction_processing(
        &self,
        mut model: TransactionProcessingModel,
    ) -> Result<(), AppFlowError> {
        let request = model.request().clone();
        let total = request.amounts.total_amount_value();
        let builder = model.transaction_response_builder();
        if let Some(card) = request.card {
            builder.with_card(card);
        }

        match self.decline_above {
            Some(limit) if total > limit => {
                tracing::info!(transaction = %request.id, total, limit, "declining above limit");
                builder
                    .decline("Amount above limit")
                    .with_response_code(DECLINED_CODE);
            }
            _ => {
                let auth_code = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
                builder
                    .approve(request.amounts)
                    .with_response_code(APPROVED_CODE);
                builder.add_reference("authCode", auth_code);
            }
        }
        model.send_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::testing::{RecordingContext, RecordingLauncher};
    use crate::service::run_launched;
    use crate::types::{
        Amounts, CardResponse, CardResult, FlowStage, JsonConvertible, Payment, Transaction,
        TransactionOutcome, TransactionRequest, TransactionResponse, SALE,
    };
    use rstest::rstest;
    use std::sync::Arc;

    fn launcher(stage: FlowStage, base: i64) -> Arc<RecordingLauncher> {
        let payment = Payment::builder()
            .with_transaction_type(SALE)
            .with_amounts(Amounts::new(base, "USD").unwrap())
            .build()
            .unwrap();
        let transaction = Transaction::new(payment.amounts().clone());
        let request = TransactionRequest::for_transaction(&payment, &transaction, stage);
        Arc::new(RecordingLauncher {
            context: RecordingContext::new(stage, request.to_json().unwrap()),
        })
    }

    #[tokio::test]
    async fn test_card_reading_presents_test_card() {
        let launcher = launcher(FlowStage::CardReading, 1000);

        run_launched(&SimulatedPaymentParticipant::new(None), launcher.clone())
            .await
            .unwrap();

        let response = CardResponse::from_json(&launcher.context.sent()[0]).unwrap();
        assert_eq!(response.result, CardResult::Approved);
        assert_eq!(
            response.card.unwrap().masked_pan.as_deref(),
            Some(TEST_CARD_PAN)
        );
    }

    #[rstest]
    #[case::no_limit(5000, None, TransactionOutcome::Approved)]
    #[case::at_limit(5000, Some(5000), TransactionOutcome::Approved)]
    #[case::above_limit(5001, Some(5000), TransactionOutcome::Declined)]
    #[tokio::test]
    async fn test_processing_against_limit(
        #[case] base: i64,
        #[case] limit: Option<i64>,
        #[case] expected: TransactionOutcome,
    ) {
        let launcher = launcher(FlowStage::TransactionProcessing, base);

        run_launched(&SimulatedPaymentParticipant::new(limit), launcher.clone())
            .await
            .unwrap();

        let response = TransactionResponse::from_json(&launcher.context.sent()[0]).unwrap();
        assert_eq!(response.outcome(), expected);
        if expected == TransactionOutcome::Approved {
            assert_eq!(
                response.amounts_processed().map(Amounts::total_amount_value),
                Some(base)
            );
            let auth_code = response.references().get_value::<String>("authCode");
            assert_eq!(auth_code.map(|code| code.len()), Some(6));
        }
    }
}
