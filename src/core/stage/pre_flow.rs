//! Pre-flow stage
//!
//! Runs once per payment before any transaction exists. A flow service may
//! change the requested amounts, attach request data or a basket, or cancel the
//! whole payment.

use super::{cancel_response, decode_request, send_flow_response, skip_response, ResponseAccumulator};
use crate::core::StageContext;
use crate::types::{Amounts, AppFlowError, Basket, DataType, FlowResponse, FlowStage, Payment};
use std::sync::Arc;

/// Model for the `PRE_FLOW` stage
pub struct PreFlowModel {
    context: Arc<dyn StageContext>,
    payment: Payment,
    response: ResponseAccumulator,
}

impl PreFlowModel {
    /// Bind to a context carrying a [`Payment`]
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedStage` if the context is for another stage and
    /// `Serialization` if the payload is not a payment.
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let payment: Payment = decode_request(context.as_ref(), &[FlowStage::PreFlow])?;
        let response = ResponseAccumulator::new(payment.amounts());
        Ok(Self {
            context,
            payment,
            response,
        })
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    /// Replace the requested amounts
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if the currency differs from the payment's.
    pub fn update_request_amounts(&mut self, amounts: &Amounts) -> Result<(), AppFlowError> {
        self.response.modifier.replace_amounts(amounts)
    }

    /// Set an additional amount on the requested amounts
    pub fn set_additional_amount(&mut self, id: &str, value: i64) {
        self.response.modifier.set_additional_amount(id, value);
    }

    /// Attach data to the payment request
    pub fn add_request_data<T: DataType>(&mut self, key: &str, value: T) {
        self.response.request_data.add_data(key, value);
    }

    /// Replace the payment's basket
    pub fn set_request_basket(&mut self, basket: Basket) {
        self.response.modified_basket = Some(basket);
    }

    /// Response accumulated so far
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` if the amount changes left a negative component.
    pub fn flow_response(&self) -> Result<FlowResponse, AppFlowError> {
        self.response.flow_response()
    }

    /// Send the accumulated response; with no changes this equals [`skip`](Self::skip)
    pub fn send_response(self) -> Result<(), AppFlowError> {
        let response = self.response.flow_response()?;
        send_flow_response(self.context.as_ref(), &response)
    }

    /// Leave the payment untouched
    pub fn skip(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &skip_response())
    }

    /// Cancel the payment, discarding any accumulated changes
    pub fn cancel_flow(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &cancel_response())
    }
}
