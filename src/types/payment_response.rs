//! Terminal, client-facing payment response
//!
//! The [`PaymentResponse`] aggregates every transaction of a payment and
//! classifies the overall result from requested vs. processed totals.

use crate::types::{
    AdditionalData, Amounts, AppFlowError, FlowAppInfo, Payment, Transaction,
};
use serde::{Deserialize, Serialize};

/// Overall result of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    /// The full requested amount was processed
    Fulfilled,
    /// Some but not all of the requested amount was processed
    PartiallyFulfilled,
    /// Nothing was processed
    Failed,
}

/// Why a payment did not fully succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    #[default]
    None,
    Cancelled,
    Rejected,
    Declined,
    Timeout,
    Error,
}

/// Aggregated result of a payment, returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    originating_payment: Payment,
    outcome: PaymentOutcome,
    #[serde(default)]
    failure_reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_message: Option<String>,
    total_amounts_requested: Amounts,
    total_amounts_processed: Amounts,
    #[serde(default)]
    transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    executed_pre_flow_app: Option<FlowAppInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    executed_post_flow_app: Option<FlowAppInfo>,
    #[serde(default)]
    additional_data: AdditionalData,
}

impl PaymentResponse {
    pub fn originating_payment(&self) -> &Payment {
        &self.originating_payment
    }

    pub fn outcome(&self) -> PaymentOutcome {
        self.outcome
    }

    pub fn failure_reason(&self) -> FailureReason {
        self.failure_reason
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    pub fn total_amounts_requested(&self) -> &Amounts {
        &self.total_amounts_requested
    }

    pub fn total_amounts_processed(&self) -> &Amounts {
        &self.total_amounts_processed
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// A payment is split when it was processed as more than one transaction
    pub fn is_split(&self) -> bool {
        self.transactions.len() > 1
    }

    pub fn executed_pre_flow_app(&self) -> Option<&FlowAppInfo> {
        self.executed_pre_flow_app.as_ref()
    }

    pub fn executed_post_flow_app(&self) -> Option<&FlowAppInfo> {
        self.executed_post_flow_app.as_ref()
    }

    pub fn additional_data(&self) -> &AdditionalData {
        &self.additional_data
    }
}

/// Builder for [`PaymentResponse`]
///
/// Totals and the outcome are derived from the transactions at build time;
/// [`fail`](Self::fail) forces a failed outcome with a reason.
#[derive(Debug, Clone)]
pub struct PaymentResponseBuilder {
    payment: Payment,
    transactions: Vec<Transaction>,
    failure: Option<(FailureReason, Option<String>)>,
    executed_pre_flow_app: Option<FlowAppInfo>,
    executed_post_flow_app: Option<FlowAppInfo>,
    additional_data: AdditionalData,
}

impl PaymentResponseBuilder {
    /// Start a response for the given payment
    pub fn new(payment: Payment) -> Self {
        PaymentResponseBuilder {
            payment,
            transactions: Vec::new(),
            failure: None,
            executed_pre_flow_app: None,
            executed_post_flow_app: None,
            additional_data: AdditionalData::new(),
        }
    }

    pub fn add_transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }

    pub fn with_pre_flow_app(mut self, info: FlowAppInfo) -> Self {
        self.executed_pre_flow_app = Some(info);
        self
    }

    pub fn with_post_flow_app(mut self, info: FlowAppInfo) -> Self {
        self.executed_post_flow_app = Some(info);
        self
    }

    pub fn with_additional_data(self, data: &AdditionalData) -> Self {
        self.additional_data.add_all(data, true);
        self
    }

    /// Mark the payment as failed, regardless of what was processed
    pub fn fail(mut self, reason: FailureReason, message: &str) -> Self {
        self.failure = Some((reason, Some(message.to_string())));
        self
    }

    /// Build the response
    ///
    /// The requested total is the payment's amounts; the processed total sums
    /// every transaction's processed amounts. When the transactions were
    /// converted into another currency, both totals are taken in that currency
    /// and the requested total is the sum of the transactions' requested
    /// amounts, carrying their conversion record. Without an explicit failure the
    /// outcome is `Fulfilled` when nothing remains, `PartiallyFulfilled` when
    /// something was processed, and `Failed` otherwise. A failed or partial
    /// outcome with declined transactions is reported as `Declined`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if the transactions do not share one
    /// currency after conversion.
    pub fn build(self) -> Result<PaymentResponse, AppFlowError> {
        let requested = self.requested_total()?;
        let mut processed = Amounts::zero(requested.currency());
        for transaction in &self.transactions {
            processed = Amounts::add_amounts(&processed, &transaction.processed_amounts())?;
        }

        let remaining = Amounts::subtract_amounts(&requested, &processed)?;
        let (outcome, failure_reason, failure_message) = match self.failure {
            Some((reason, message)) => (PaymentOutcome::Failed, reason, message),
            None if remaining.total_amount_value() == 0 => {
                (PaymentOutcome::Fulfilled, FailureReason::None, None)
            }
            None => {
                let declined = self.transactions.iter().any(Transaction::has_declined_response);
                let reason = if declined {
                    FailureReason::Declined
                } else {
                    FailureReason::None
                };
                if processed.total_amount_value() > 0 {
                    (PaymentOutcome::PartiallyFulfilled, reason, None)
                } else {
                    (PaymentOutcome::Failed, reason, None)
                }
            }
        };

        Ok(PaymentResponse {
            originating_payment: self.payment,
            outcome,
            failure_reason,
            failure_message,
            total_amounts_requested: requested,
            total_amounts_processed: processed,
            transactions: self.transactions,
            executed_pre_flow_app: self.executed_pre_flow_app,
            executed_post_flow_app: self.executed_post_flow_app,
            additional_data: self.additional_data,
        })
    }

    fn requested_total(&self) -> Result<Amounts, AppFlowError> {
        let payment_amounts = self.payment.amounts();
        let converted = self.transactions.iter().find(|transaction| {
            transaction.requested_amounts().currency() != payment_amounts.currency()
        });
        let Some(converted) = converted else {
            return Ok(payment_amounts.clone());
        };

        let currency = converted.requested_amounts().currency();
        tracing::debug!(
            payment_currency = payment_amounts.currency(),
            currency,
            "totalling converted transactions"
        );
        let mut total = Amounts::zero(currency);
        for transaction in &self.transactions {
            total = Amounts::add_amounts(&total, transaction.requested_amounts())?;
        }
        Ok(total.with_conversion(
            converted.requested_amounts().original_currency().map(str::to_string),
            converted.requested_amounts().currency_exchange_rate(),
        ))
    }
}
