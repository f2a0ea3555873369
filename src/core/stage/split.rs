//! Split stage
//!
//! Runs before each transaction of a split payment. The flow service decides
//! how much of the remaining amount the next transaction covers, which basket
//! goes with it, or reports part of the payment as already paid by other means.

use super::{cancel_response, decode_request, send_flow_response, skip_response, ResponseAccumulator};
use crate::core::StageContext;
use crate::types::{
    validate_amounts_paid, Amounts, AppFlowError, Basket, FlowResponse, FlowStage, SplitRequest,
    Transaction,
};
use std::sync::Arc;

/// Model for the `SPLIT` stage
pub struct SplitModel {
    context: Arc<dyn StageContext>,
    request: SplitRequest,
    remaining: Amounts,
    response: ResponseAccumulator,
}

impl SplitModel {
    /// Bind to a context carrying a [`SplitRequest`]
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedStage` if the context is for another stage and
    /// `Serialization` if the payload is not a split request.
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let request: SplitRequest = decode_request(context.as_ref(), &[FlowStage::Split])?;
        let remaining = request.remaining_amounts();
        let response = ResponseAccumulator::new(&remaining);
        Ok(Self {
            context,
            request,
            remaining,
            response,
        })
    }

    pub fn split_request(&self) -> &SplitRequest {
        &self.request
    }

    /// Amounts of the payment still to be processed
    pub fn remaining_amounts(&self) -> &Amounts {
        &self.remaining
    }

    /// Limit the next transaction to `base_amount` of the remaining base amount
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` for a negative value and
    /// `AmountsPaidExceedRemaining` if it exceeds the remaining base amount.
    pub fn set_base_amount_for_next_transaction(
        &mut self,
        base_amount: i64,
    ) -> Result<(), AppFlowError> {
        if base_amount < 0 {
            return Err(AppFlowError::negative_amount("base", base_amount));
        }
        if base_amount > self.remaining.base_amount_value() {
            return Err(AppFlowError::amounts_paid_exceed_remaining(
                base_amount,
                self.remaining.base_amount_value(),
            ));
        }
        self.response
            .modifier
            .replace_amounts(&Amounts::new(base_amount, self.remaining.currency())?)
    }

    /// Basket covered by the next transaction
    pub fn set_basket_for_next_transaction(&mut self, basket: Basket) {
        self.response.new_basket = Some(basket);
    }

    /// Report amounts as already paid by this flow service
    ///
    /// # Arguments
    ///
    /// * `amounts` - Paid amounts, base only, in the payment currency
    /// * `payment_method` - How they were paid (e.g. "giftcard")
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch`, `AdditionalAmountsNotAllowed` or
    /// `AmountsPaidExceedRemaining` when the amounts are not acceptable.
    pub fn set_amounts_paid(
        &mut self,
        amounts: Amounts,
        payment_method: &str,
    ) -> Result<(), AppFlowError> {
        validate_amounts_paid(&amounts, &self.remaining)?;
        self.response.amounts_paid = Some((amounts, payment_method.to_string()));
        Ok(())
    }

    /// Response accumulated so far
    pub fn flow_response(&self) -> Result<FlowResponse, AppFlowError> {
        self.response.flow_response()
    }

    /// The next transaction as it will look once the response is applied
    ///
    /// # Arguments
    ///
    /// * `app_id` - Identifier recorded as the executing flow app
    pub fn preview_transaction(&self, app_id: &str) -> Result<Transaction, AppFlowError> {
        let mut transaction = Transaction::new(self.remaining.clone());
        self.flow_response()?
            .apply_to_transaction(&mut transaction, app_id, FlowStage::Split)?;
        Ok(transaction)
    }

    /// Send the accumulated response
    pub fn send_response(self) -> Result<(), AppFlowError> {
        let response = self.response.flow_response()?;
        send_flow_response(self.context.as_ref(), &response)
    }

    /// Let the next transaction cover everything that remains
    pub fn skip(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &skip_response())
    }

    /// Cancel the rest of the payment
    pub fn cancel_flow(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &cancel_response())
    }
}
