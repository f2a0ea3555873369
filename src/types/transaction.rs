//! Transactions and their outcomes
//!
//! A [`Transaction`] is one customer-facing sub-payment. Without split there is
//! exactly one per payment; with split every round through the transaction
//! stages adds another. Each transaction collects the [`TransactionResponse`]s
//! produced for it (by the payment service or by a flow service that reported
//! amounts as paid) and derives from them how much is still remaining.

use crate::types::{AdditionalData, Amounts, AppFlowError, Basket, Card, DataType, FlowStage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default payment method recorded on a transaction response
pub const PAYMENT_METHOD_CARD: &str = "card";

/// Outcome of a single transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionOutcome {
    Approved,
    Declined,
}

/// Immutable outcome record for a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    id: String,
    outcome: TransactionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outcome_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amounts_processed: Option<Amounts>,
    payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    card: Option<Card>,
    #[serde(default)]
    references: AdditionalData,
}

impl TransactionResponse {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn outcome(&self) -> TransactionOutcome {
        self.outcome
    }

    pub fn outcome_message(&self) -> Option<&str> {
        self.outcome_message.as_deref()
    }

    pub fn response_code(&self) -> Option<&str> {
        self.response_code.as_deref()
    }

    pub fn amounts_processed(&self) -> Option<&Amounts> {
        self.amounts_processed.as_ref()
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn card(&self) -> Option<&Card> {
        self.card.as_ref()
    }

    pub fn references(&self) -> &AdditionalData {
        &self.references
    }
}

/// Builder for [`TransactionResponse`]
///
/// An outcome must be chosen through [`approve`](Self::approve) or
/// [`decline`](Self::decline) before [`build`](Self::build) succeeds.
#[derive(Debug, Default, Clone)]
pub struct TransactionResponseBuilder {
    outcome: Option<TransactionOutcome>,
    outcome_message: Option<String>,
    response_code: Option<String>,
    amounts_processed: Option<Amounts>,
    payment_method: Option<String>,
    card: Option<Card>,
    references: AdditionalData,
}

impl TransactionResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve the transaction for the given amounts
    pub fn approve(&mut self, amounts_processed: Amounts) -> &mut Self {
        self.outcome = Some(TransactionOutcome::Approved);
        self.amounts_processed = Some(amounts_processed);
        self
    }

    /// Decline the transaction
    pub fn decline(&mut self, message: &str) -> &mut Self {
        self.outcome = Some(TransactionOutcome::Declined);
        self.outcome_message = Some(message.to_string());
        self
    }

    pub fn with_outcome_message(&mut self, message: &str) -> &mut Self {
        self.outcome_message = Some(message.to_string());
        self
    }

    pub fn with_response_code(&mut self, code: &str) -> &mut Self {
        self.response_code = Some(code.to_string());
        self
    }

    /// Override the default payment method ("card")
    pub fn with_payment_method(&mut self, method: &str) -> &mut Self {
        self.payment_method = Some(method.to_string());
        self
    }

    pub fn with_card(&mut self, card: Card) -> &mut Self {
        self.card = Some(card);
        self
    }

    /// Add a reference; the first value written under a key wins
    ///
    /// # Returns
    ///
    /// `true` if the reference was recorded, `false` if the key was taken.
    pub fn add_reference<T: DataType>(&mut self, key: &str, value: T) -> bool {
        if self.references.has_data(key) {
            return false;
        }
        self.references.add_data(key, value);
        true
    }

    /// Add every entry of `references` whose key is not taken yet
    ///
    /// Values keep their stored type.
    pub fn add_references(&mut self, references: &AdditionalData) -> &mut Self {
        self.references.add_all(references, false);
        self
    }

    /// Whether an outcome has been chosen
    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Build the response
    ///
    /// # Errors
    ///
    /// Returns `MissingOutcome` if neither approve nor decline was called.
    pub fn build(&self) -> Result<TransactionResponse, AppFlowError> {
        let outcome = self.outcome.ok_or(AppFlowError::MissingOutcome)?;
        Ok(TransactionResponse {
            id: Uuid::new_v4().to_string(),
            outcome,
            outcome_message: self.outcome_message.clone(),
            response_code: self.response_code.clone(),
            amounts_processed: self.amounts_processed.clone(),
            payment_method: self
                .payment_method
                .clone()
                .unwrap_or_else(|| PAYMENT_METHOD_CARD.to_string()),
            card: self.card.clone(),
            references: self.references.clone(),
        })
    }
}

/// Record of a flow application having executed at a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowAppInfo {
    pub app_id: String,
    pub stage: FlowStage,
    #[serde(default)]
    pub amounts_changed: bool,
    #[serde(default)]
    pub payment_amounts_set: bool,
}

impl FlowAppInfo {
    pub fn new(app_id: &str, stage: FlowStage) -> Self {
        FlowAppInfo {
            app_id: app_id.to_string(),
            stage,
            amounts_changed: false,
            payment_amounts_set: false,
        }
    }
}

/// One customer-facing sub-payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: String,
    requested_amounts: Amounts,
    #[serde(default)]
    baskets: Vec<Basket>,
    #[serde(default)]
    transaction_responses: Vec<TransactionResponse>,
    #[serde(default)]
    executed_flow_apps: Vec<FlowAppInfo>,
    #[serde(default)]
    additional_data: AdditionalData,
}

impl Transaction {
    /// Create a transaction for the requested amounts
    pub fn new(requested_amounts: Amounts) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            requested_amounts,
            baskets: Vec::new(),
            transaction_responses: Vec::new(),
            executed_flow_apps: Vec::new(),
            additional_data: AdditionalData::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requested_amounts(&self) -> &Amounts {
        &self.requested_amounts
    }

    /// Replace the requested amounts, e.g. after a flow service added a surcharge
    pub fn update_requested_amounts(&mut self, amounts: Amounts) {
        self.requested_amounts = amounts;
    }

    pub fn baskets(&self) -> &[Basket] {
        &self.baskets
    }

    pub fn add_basket(&mut self, basket: Basket) {
        self.baskets.push(basket);
    }

    /// Replace a basket with the same id, or add it if it is new
    pub fn replace_basket(&mut self, basket: Basket) {
        match self.baskets.iter_mut().find(|b| b.id() == basket.id()) {
            Some(existing) => *existing = basket,
            None => self.baskets.push(basket),
        }
    }

    pub fn transaction_responses(&self) -> &[TransactionResponse] {
        &self.transaction_responses
    }

    pub fn add_transaction_response(&mut self, response: TransactionResponse) {
        self.transaction_responses.push(response);
    }

    pub fn executed_flow_apps(&self) -> &[FlowAppInfo] {
        &self.executed_flow_apps
    }

    pub fn add_executed_flow_app(&mut self, info: FlowAppInfo) {
        self.executed_flow_apps.push(info);
    }

    pub fn additional_data(&self) -> &AdditionalData {
        &self.additional_data
    }

    /// Sum of the amounts processed by all approved responses
    ///
    /// Declined responses and approved responses without amounts contribute
    /// nothing. Approved amounts that can not be added to the total (another
    /// currency, or an overflowing sum) are left out with a warning.
    pub fn processed_amounts(&self) -> Amounts {
        let zero = Amounts::zero(self.requested_amounts.currency());
        self.transaction_responses
            .iter()
            .filter(|response| response.outcome == TransactionOutcome::Approved)
            .filter_map(|response| response.amounts_processed.as_ref())
            .fold(zero, |total, processed| {
                match Amounts::add_amounts(&total, processed) {
                    Ok(sum) => sum,
                    Err(e) => {
                        tracing::warn!(
                            transaction_id = %self.id,
                            expected = total.currency(),
                            actual = processed.currency(),
                            error = %e,
                            "approved amounts left out of processed total"
                        );
                        total
                    }
                }
            })
    }

    /// Requested amounts minus processed amounts, floored at zero per component
    pub fn remaining_amounts(&self) -> Amounts {
        Amounts::subtract_amounts(&self.requested_amounts, &self.processed_amounts())
            .unwrap_or_else(|_| self.requested_amounts.clone())
    }

    /// Whether nothing is left to pay on this transaction
    pub fn has_processed_requested_amounts(&self) -> bool {
        self.remaining_amounts().total_amount_value() == 0
    }

    /// Whether any response declined the transaction
    pub fn has_declined_response(&self) -> bool {
        self.transaction_responses
            .iter()
            .any(|response| response.outcome == TransactionOutcome::Declined)
    }
}
