//! AppFlow Core Library
//! # Overview
//!
//! This library implements the participant side of an AppFlow point-of-sale
//! payment flow: the stage models flow and payment services use to inspect
//! and augment a payment, and the request/acknowledge/response message
//! protocol they are served over.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Data model (Amounts, AdditionalData, Basket, Payment, Transaction, ...)
//! - [`core`] - Stage models and the amounts modifier:
//!   - [`core::stage`] - One model per flow stage
//!   - [`core::amounts_modifier`] - Accumulates amount changes
//! - [`io`] - Message envelope and the duplex channel collaborator
//! - [`service`] - Reply state machine, connection dispatch and stage callbacks
//! - [`participant`] - Built-in flow and payment services
//! - [`cli`] - CLI arguments parsing
//!
//! # Flow Stages
//!
//! A payment passes through up to eight stages:
//!
//! - **PRE_FLOW**: Alter the payment as a whole
//! - **SPLIT**: Divide the payment into sub-transactions
//! - **PRE_TRANSACTION** / **POST_CARD_READING**: Adjust each transaction's amounts
//! - **CARD_READING** / **TRANSACTION_PROCESSING**: Owned by the payment service
//! - **POST_TRANSACTION**: Add references after processing
//! - **POST_FLOW**: Observe the final outcome
//!
//! # Message Protocol
//!
//! Every request is acknowledged before any business processing starts and
//! answered by exactly one terminal message: a `response`, or a `failure`
//! carrying an error code.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod participant;
pub mod service;
pub mod types;

pub use core::{AmountsModifier, HostLauncher, StageContext};
pub use io::{duplex, AppMessage, ClientEnd, Connection, MessageType};
pub use service::{FlowServiceDispatcher, PaymentFlowService, ServiceConfig, ServiceHost};
pub use types::{
    AdditionalData, Amounts, AppFlowError, Basket, FlowResponse, FlowStage, Payment,
    PaymentResponse, Transaction,
};
