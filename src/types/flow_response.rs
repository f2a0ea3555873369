//! Flow responses
//!
//! A [`FlowResponse`] is the set of augmentations one participant contributes
//! at one stage: changed request amounts, amounts it has already taken payment
//! for, baskets, bespoke request data and payment references. An empty flow
//! response serializes to `{}` and is indistinguishable from a skip.

use crate::types::{
    AdditionalData, Amounts, AppFlowError, Basket, FlowAppInfo, FlowStage, Transaction,
    TransactionResponseBuilder,
};
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Augmentations produced by a flow service at one stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_request_amounts: Option<Amounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amounts_paid: Option<Amounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amounts_paid_payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_request_data: Option<AdditionalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_references: Option<AdditionalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_request_basket: Option<Basket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_basket: Option<Basket>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cancel_transaction: bool,
}

impl FlowResponse {
    /// Whether the response carries no augmentation at all
    pub fn is_empty(&self) -> bool {
        *self == FlowResponse::default()
    }

    /// Merge this response into the transaction it was produced for
    ///
    /// This is the orchestrator-side half of the protocol: requested amounts are
    /// replaced, baskets added or replaced, request data merged without
    /// overwriting, and amounts reported as paid become an approved
    /// transaction response. The executing application is recorded.
    ///
    /// The merge is all or nothing: on error `transaction` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the paid amounts are not acceptable for the
    /// transaction (see [`validate_amounts_paid`]).
    pub fn apply_to_transaction(
        &self,
        transaction: &mut Transaction,
        app_id: &str,
        stage: FlowStage,
    ) -> Result<(), AppFlowError> {
        let mut updated = transaction.clone();
        let mut info = FlowAppInfo::new(app_id, stage);

        if let Some(amounts) = &self.updated_request_amounts {
            updated.update_requested_amounts(amounts.clone());
            info.amounts_changed = true;
        }
        if let Some(basket) = &self.modified_request_basket {
            updated.replace_basket(basket.clone());
        }
        if let Some(basket) = &self.new_basket {
            updated.add_basket(basket.clone());
        }
        if let Some(data) = &self.additional_request_data {
            updated.additional_data().add_all(data, false);
        }
        if let Some(paid) = &self.amounts_paid {
            validate_amounts_paid(paid, &updated.remaining_amounts())?;
            let mut builder = TransactionResponseBuilder::new();
            builder.approve(paid.clone());
            if let Some(method) = &self.amounts_paid_payment_method {
                builder.with_payment_method(method);
            }
            if let Some(references) = &self.payment_references {
                builder.add_references(references);
            }
            updated.add_transaction_response(builder.build()?);
            info.payment_amounts_set = true;
        }

        updated.add_executed_flow_app(info);
        *transaction = updated;
        Ok(())
    }
}

/// Check amounts a participant reports as already paid
///
/// # Errors
///
/// - `NegativeAmount` if the paid base is below zero
/// - `CurrencyMismatch` if the currencies differ
/// - `AdditionalAmountsNotAllowed` if `paid` carries additional amounts
/// - `AmountsPaidExceedRemaining` if the paid base exceeds the remaining base
pub fn validate_amounts_paid(paid: &Amounts, remaining: &Amounts) -> Result<(), AppFlowError> {
    if paid.base_amount_value() < 0 {
        return Err(AppFlowError::negative_amount(
            "amountsPaid",
            paid.base_amount_value(),
        ));
    }
    if paid.currency() != remaining.currency() {
        return Err(AppFlowError::currency_mismatch(
            remaining.currency(),
            paid.currency(),
        ));
    }
    if !paid.additional_amounts().is_empty() {
        return Err(AppFlowError::AdditionalAmountsNotAllowed);
    }
    if paid.base_amount_value() > remaining.base_amount_value() {
        return Err(AppFlowError::amounts_paid_exceed_remaining(
            paid.base_amount_value(),
            remaining.base_amount_value(),
        ));
    }
    Ok(())
}
