//! Pre-transaction and post-card-reading stages
//!
//! Both stages see the [`TransactionRequest`] about to be processed and may
//! adjust its amounts. Typical uses are surcharges, tips, charity round-ups,
//! currency conversion and paying part of the amount with points or vouchers.

use super::{cancel_response, decode_request, send_flow_response, skip_response, ResponseAccumulator};
use crate::core::StageContext;
use crate::types::{
    validate_amounts_paid, Amounts, AppFlowError, Basket, DataType, FlowResponse, FlowStage,
    TransactionRequest,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Model for the `PRE_TRANSACTION` and `POST_CARD_READING` stages
pub struct PreTransactionModel {
    context: Arc<dyn StageContext>,
    request: TransactionRequest,
    response: ResponseAccumulator,
    currency_change_allowed: bool,
}

impl PreTransactionModel {
    /// Bind to a context carrying a [`TransactionRequest`]
    ///
    /// Currency changes are refused until allowed with
    /// [`allow_currency_change`](Self::allow_currency_change).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedStage` if the context is for another stage and
    /// `Serialization` if the payload is not a transaction request.
    pub fn from_context(context: Arc<dyn StageContext>) -> Result<Self, AppFlowError> {
        let request: TransactionRequest = decode_request(
            context.as_ref(),
            &[FlowStage::PreTransaction, FlowStage::PostCardReading],
        )?;
        let response = ResponseAccumulator::new(&request.amounts);
        Ok(Self {
            context,
            request,
            response,
            currency_change_allowed: false,
        })
    }

    /// Permit or forbid [`change_currency`](Self::change_currency)
    pub fn allow_currency_change(mut self, allowed: bool) -> Self {
        self.currency_change_allowed = allowed;
        self
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    /// Stage this model was bound for
    pub fn stage(&self) -> FlowStage {
        self.context.stage()
    }

    /// Set (or overwrite) an additional amount
    pub fn set_additional_amount(&mut self, id: &str, value: i64) {
        self.response.modifier.set_additional_amount(id, value);
    }

    /// Set an additional amount as a fraction of the base amount
    ///
    /// # Returns
    ///
    /// The value that was set.
    ///
    /// # Errors
    ///
    /// Returns `FractionOutOfRange` if `fraction` is outside of [0, 1].
    pub fn set_additional_amount_as_base_fraction(
        &mut self,
        id: &str,
        fraction: Decimal,
    ) -> Result<i64, AppFlowError> {
        self.response
            .modifier
            .set_additional_amount_as_base_fraction(id, fraction)
    }

    /// Add `delta` (which may be negative) to the base amount
    pub fn offset_base_amount(&mut self, delta: i64) {
        self.response.modifier.offset_base_amount(delta);
    }

    /// Convert the requested amounts to another currency
    ///
    /// # Errors
    ///
    /// Returns `CurrencyChangeNotAllowed` unless currency changes were allowed,
    /// or `InvalidArgument` for a non-positive rate.
    pub fn change_currency(&mut self, currency: &str, rate: Decimal) -> Result<(), AppFlowError> {
        if !self.currency_change_allowed {
            return Err(AppFlowError::CurrencyChangeNotAllowed {
                stage: self.stage().to_string(),
            });
        }
        self.response.modifier.change_currency(currency, rate)
    }

    /// Report part of the transaction as already paid by this flow service
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
        validate_amounts_paid(&amounts, &self.request.amounts)?;
        self.response.amounts_paid = Some((amounts, payment_method.to_string()));
        Ok(())
    }

    /// Attach data to the transaction request
    pub fn add_request_data<T: DataType>(&mut self, key: &str, value: T) {
        self.response.request_data.add_data(key, value);
    }

    /// Add references to go with the amounts paid
    pub fn add_payment_references<T: DataType>(&mut self, key: &str, value: T) {
        self.response.references.add_data(key, value);
    }

    /// Add a basket, for example for items added by this flow service
    pub fn add_new_basket(&mut self, basket: Basket) {
        self.response.new_basket = Some(basket);
    }

    /// Response accumulated so far, with updated amounts reflecting every change
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

    /// Leave the transaction untouched
    pub fn skip(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &skip_response())
    }

    /// Cancel the transaction, discarding any accumulated changes
    pub fn cancel_transaction(self) -> Result<(), AppFlowError> {
        send_flow_response(self.context.as_ref(), &cancel_response())
    }
}
