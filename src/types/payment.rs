//! Client-initiated payment requests
//!
//! A [`Payment`] is immutable once built. [`PaymentBuilder`] enforces the
//! construction rules: a transaction type is required, and a card token can
//! not be combined with split transactions.

use crate::types::{AdditionalData, Amounts, AppFlowError, Basket};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known transaction type for a purchase
pub const SALE: &str = "sale";

/// Well-known transaction type for a refund
pub const REFUND: &str = "refund";

/// Where the payment id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSource {
    /// Generated by this library
    Internal,
    /// Supplied by the client application
    External,
}

/// A payment request initiated by a client POS application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    id: String,
    transaction_type: String,
    amounts: Amounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    basket: Option<Basket>,
    #[serde(default)]
    split_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    card_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_id: Option<String>,
    #[serde(default)]
    additional_data: AdditionalData,
    source: PaymentSource,
}

impl Payment {
    /// Start building a payment
    pub fn builder() -> PaymentBuilder {
        PaymentBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    pub fn amounts(&self) -> &Amounts {
        &self.amounts
    }

    pub fn basket(&self) -> Option<&Basket> {
        self.basket.as_ref()
    }

    pub fn is_split_enabled(&self) -> bool {
        self.split_enabled
    }

    pub fn card_token(&self) -> Option<&str> {
        self.card_token.as_deref()
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn additional_data(&self) -> &AdditionalData {
        &self.additional_data
    }

    pub fn source(&self) -> PaymentSource {
        self.source
    }
}

/// Builder for [`Payment`]
#[derive(Debug, Default)]
pub struct PaymentBuilder {
    id: Option<String>,
    transaction_type: Option<String>,
    amounts: Option<Amounts>,
    basket: Option<Basket>,
    split_enabled: bool,
    card_token: Option<String>,
    customer_id: Option<String>,
    additional_data: AdditionalData,
}

impl PaymentBuilder {
    /// Use an id supplied by the client instead of generating one
    pub fn with_external_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Set the transaction type, e.g. [`SALE`]
    pub fn with_transaction_type(mut self, transaction_type: &str) -> Self {
        self.transaction_type = Some(transaction_type.to_string());
        self
    }

    pub fn with_amounts(mut self, amounts: Amounts) -> Self {
        self.amounts = Some(amounts);
        self
    }

    pub fn with_basket(mut self, basket: Basket) -> Self {
        self.basket = Some(basket);
        self
    }

    /// Allow the payment to be split across several transactions
    pub fn with_split(mut self, enabled: bool) -> Self {
        self.split_enabled = enabled;
        self
    }

    /// Pay with a previously tokenised card
    pub fn with_card_token(mut self, token: &str) -> Self {
        self.card_token = Some(token.to_string());
        self
    }

    pub fn with_customer_id(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    /// Merge bespoke data into the payment, overwriting existing keys
    pub fn with_additional_data(self, data: &AdditionalData) -> Self {
        self.additional_data.add_all(data, true);
        self
    }

    /// Validate and build the payment
    ///
    /// # Errors
    ///
    /// - `MissingField` if no transaction type (or no amounts) were given
    /// - `ConflictingPaymentOptions` if a card token is combined with split
    pub fn build(self) -> Result<Payment, AppFlowError> {
        let transaction_type = self
            .transaction_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppFlowError::missing_field("transactionType"))?;
        let amounts = self
            .amounts
            .ok_or_else(|| AppFlowError::missing_field("amounts"))?;
        if self.card_token.is_some() && self.split_enabled {
            return Err(AppFlowError::ConflictingPaymentOptions);
        }
        let (id, source) = match self.id {
            Some(id) => (id, PaymentSource::External),
            None => (Uuid::new_v4().to_string(), PaymentSource::Internal),
        };

        Ok(Payment {
            id,
            transaction_type,
            amounts,
            basket: self.basket,
            split_enabled: self.split_enabled,
            card_token: self.card_token,
            customer_id: self.customer_id,
            additional_data: self.additional_data,
            source,
        })
    }
}
