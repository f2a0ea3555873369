//! Card reading stage
//!
//! Handled by the payment service. It either reads a card, skips card reading
//! (leaving it to transaction processing) or declines the transaction outright.

use super::decode_request;
use crate::core::StageContext;
use crate::types::{
    AppFlowError, Card, CardResponse, CardResult, FlowStage, JsonConvertible, TransactionRequest,
};
use std::sync::Arc;

/// Model for the `CARD_READING` stage
pub struct CardReadingModel {
    context: Arc<dyn StageContext>,
    request: TransactionRequest,
}

impl CardReadingModel {
    /// Bind to a context carrying a [`TransactionRequest`]
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let request = decode_request(context.as_ref(), &[FlowStage::CardReading])?;
        Ok(Self { context, request })
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    fn respond(self, response: CardResponse) -> Result<(), AppFlowError> {
        tracing::debug!(result = ?response.result, "card reading finished");
        self.context.send_response(response.to_json()?)
    }

    /// Report a successfully read card
    pub fn approve_with_card(self, card: Card) -> Result<(), AppFlowError> {
        self.respond(CardResponse {
            result: CardResult::Approved,
            card: Some(card),
            message: None,
        })
    }

    /// Continue without card data
    pub fn skip_card_reading(self) -> Result<(), AppFlowError> {
        self.respond(CardResponse {
            result: CardResult::Skipped,
            card: None,
            message: None,
        })
    }

    /// Stop the transaction
    pub fn decline_transaction(self, message: &str) -> Result<(), AppFlowError> {
        self.respond(CardResponse {
            result: CardResult::Declined,
            card: None,
            message: Some(message.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::testing::RecordingContext;
    use crate::types::{Amounts, Payment, Transaction, SALE};

    fn context() -> Arc<RecordingContext> {
        let payment = Payment::builder()
            .with_transaction_type(SALE)
            .with_amounts(Amounts::new(1000, "USD").unwrap())
            .build()
            .unwrap();
        let transaction = Transaction::new(payment.amounts().clone());
        let request =
            TransactionRequest::for_transaction(&payment, &transaction, FlowStage::CardReading);
        Arc::new(RecordingContext::new(
            FlowStage::CardReading,
            request.to_json().unwrap(),
        ))
    }

    fn sent_response(context: &RecordingContext) -> CardResponse {
        CardResponse::from_json(&context.sent()[0]).unwrap()
    }

    #[test]
    fn test_approve_with_card() {
        let context = context();
        let model = CardReadingModel::from_context(context.clone()).unwrap();
        assert_eq!(model.request().amounts.base_amount_value(), 1000);

        model.approve_with_card(Card::new("4111 **** **** 1111")).unwrap();

        let response = sent_response(&context);
        assert_eq!(response.result, CardResult::Approved);
        assert_eq!(
            response.card.and_then(|card| card.masked_pan),
            Some("4111 **** **** 1111".to_string())
        );
    }

    #[test]
    fn test_skip_card_reading() {
        let context = context();
        CardReadingModel::from_context(context.clone())
            .unwrap()
            .skip_card_reading()
            .unwrap();

        assert_eq!(sent_response(&context).result, CardResult::Skipped);
    }

    #[test]
    fn test_decline_transaction() {
        let context = context();
        CardReadingModel::from_context(context.clone())
            .unwrap()
            .decline_transaction("card removed")
            .unwrap();

        let response = sent_response(&context);
        assert_eq!(response.result, CardResult::Declined);
        assert_eq!(response.message.as_deref(), Some("card removed"));
    }
}
