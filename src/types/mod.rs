//! Types module
//!
//! Contains the data model exchanged between participants of a payment flow.
//! This module organizes types into logical submodules:
//! - `amount`: Amount and Amounts arithmetic
//! - `additional_data`: The type-tagged extensibility bag
//! - `basket`: Baskets and basket items
//! - `payment`: Client-initiated payment requests
//! - `stage`: Flow stage enumeration
//! - `stage_requests`: Per-stage inbound request records
//! - `flow_response`: Flow service augmentations
//! - `transaction`: Transactions and transaction responses
//! - `payment_response`: The final client-facing response
//! - `card`: Card details
//! - `json`: JSON conversion
//! - `error`: Error types for the AppFlow core

pub mod additional_data;
pub mod amount;
pub mod basket;
pub mod card;
pub mod error;
pub mod flow_response;
pub mod json;
pub mod payment;
pub mod payment_response;
pub mod stage;
pub mod stage_requests;
pub mod transaction;

pub use additional_data::{AdditionalData, CustomData, DataEntry, DataType, DataValue};
pub use amount::{Amount, Amounts, OTHER, TIP};
pub use basket::{Basket, BasketItem};
pub use card::Card;
pub use error::AppFlowError;
pub use flow_response::{validate_amounts_paid, FlowResponse};
pub use json::JsonConvertible;
pub use payment::{Payment, PaymentBuilder, PaymentSource, REFUND, SALE};
pub use payment_response::{FailureReason, PaymentOutcome, PaymentResponse, PaymentResponseBuilder};
pub use stage::FlowStage;
pub use stage_requests::{CardResponse, CardResult, SplitRequest, TransactionRequest, TransactionSummary};
pub use transaction::{
    FlowAppInfo, Transaction, TransactionOutcome, TransactionResponse, TransactionResponseBuilder,
    PAYMENT_METHOD_CARD,
};
