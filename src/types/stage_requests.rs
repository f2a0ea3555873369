//! Inbound request records for the individual stages
//!
//! Each stage model deserializes one of these from the request payload it was
//! bound to: pre-flow gets the [`Payment`](crate::types::Payment) itself, split
//! gets a [`SplitRequest`], the transaction stages get a [`TransactionRequest`],
//! post-transaction gets a [`TransactionSummary`] and post-flow the final
//! [`PaymentResponse`](crate::types::PaymentResponse).

use crate::types::{
    AdditionalData, Amounts, Basket, Card, FlowStage, Payment, Transaction, TransactionResponse,
};
use serde::{Deserialize, Serialize};

/// Request sent to the split stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub source_payment: Payment,
    /// Transactions already completed for this payment
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl SplitRequest {
    pub fn new(source_payment: Payment, transactions: Vec<Transaction>) -> Self {
        SplitRequest {
            source_payment,
            transactions,
        }
    }

    /// Amounts processed across all previous transactions
    pub fn processed_amounts(&self) -> Amounts {
        let zero = Amounts::zero(self.source_payment.amounts().currency());
        self.transactions
            .iter()
            .map(Transaction::processed_amounts)
            .fold(zero, |total, processed| {
                Amounts::add_amounts(&total, &processed).unwrap_or(total)
            })
    }

    /// Amounts of the payment not yet processed, floored at zero
    pub fn remaining_amounts(&self) -> Amounts {
        Amounts::subtract_amounts(self.source_payment.amounts(), &self.processed_amounts())
            .unwrap_or_else(|_| self.source_payment.amounts().clone())
    }

    /// Whether this is the first split round
    pub fn is_first_split(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Request sent to the per-transaction stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub id: String,
    pub transaction_type: String,
    pub stage: FlowStage,
    pub amounts: Amounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket: Option<Basket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(default)]
    pub additional_data: AdditionalData,
}

impl TransactionRequest {
    /// Build the request for `transaction` at `stage` of `payment`
    pub fn for_transaction(payment: &Payment, transaction: &Transaction, stage: FlowStage) -> Self {
        TransactionRequest {
            id: transaction.id().to_string(),
            transaction_type: payment.transaction_type().to_string(),
            stage,
            amounts: transaction.remaining_amounts(),
            basket: transaction.baskets().first().cloned(),
            card: None,
            additional_data: payment.additional_data().clone(),
        }
    }
}

/// Request sent to the post-transaction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub request: TransactionRequest,
    #[serde(default)]
    pub transaction_responses: Vec<TransactionResponse>,
    pub remaining_amounts: Amounts,
}

impl TransactionSummary {
    /// Summarise `transaction` after processing
    pub fn new(request: TransactionRequest, transaction: &Transaction) -> Self {
        TransactionSummary {
            request,
            transaction_responses: transaction.transaction_responses().to_vec(),
            remaining_amounts: transaction.remaining_amounts(),
        }
    }
}

/// Result of the card reading stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardResult {
    /// Card data was read successfully
    Approved,
    /// No card was read; processing decides how to continue
    Skipped,
    /// The transaction must not continue
    Declined,
}

/// Response produced by the card reading stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub result: CardResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
