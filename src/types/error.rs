//! Error types for the AppFlow core
//!
//! This module defines all error types that can occur while building payment
//! requests, accumulating flow responses and exchanging protocol messages.
//!
//! # Error Categories
//!
//! - **Validation Errors**: Malformed builder input, out-of-range fractions,
//!   negative amounts, mismatched currencies, paid amounts exceeding what remains.
//!   Raised synchronously at the point of mutation or build.
//! - **Protocol Errors**: Unknown message types, undecodable payloads, a missing
//!   mandatory outcome. Surfaced to the remote peer as a `failure` message.
//! - **Internal Errors**: Anything else raised while a request is processed.
//!   Reported to the peer as a service exception and then propagated locally.

use crate::io::message::error_codes;
use thiserror::Error;

/// Main error type for the AppFlow core
///
/// Each variant includes the context needed to diagnose the failure.
/// Variants are grouped by the taxonomy above; see [`AppFlowError::is_validation_error`]
/// and [`AppFlowError::is_protocol_error`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppFlowError {
    /// Generic argument rejection raised by a builder or mutator
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument
        message: String,
    },

    /// Two amounts that must share a currency do not
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// Currency of the reference amount
        expected: String,
        /// Currency that was supplied
        actual: String,
    },

    /// An amount component would become negative
    #[error("Amount '{field}' must not be negative (got {value})")]
    NegativeAmount {
        /// Name of the offending component (base, tip, additional amount id, ...)
        field: String,
        /// The rejected value
        value: i64,
    },

    /// A fraction outside of [0.0, 1.0] was supplied
    #[error("Fraction {fraction} is outside of the range [0, 1]")]
    FractionOutOfRange {
        /// The rejected fraction, as text
        fraction: String,
    },

    /// Paid amounts exceed the amounts remaining for the payment
    #[error("Amounts paid ({paid}) exceed the remaining base amount ({remaining})")]
    AmountsPaidExceedRemaining {
        /// Paid base amount
        paid: i64,
        /// Remaining base amount
        remaining: i64,
    },

    /// Paid amounts were reported with an additional amounts portion
    #[error("Amounts paid must not contain additional amounts")]
    AdditionalAmountsNotAllowed,

    /// A currency change was requested while the policy forbids it
    #[error("Currency change is not permitted at stage {stage}")]
    CurrencyChangeNotAllowed {
        /// Stage that rejected the change
        stage: String,
    },

    /// A builder was finalised without a mandatory field
    #[error("Missing mandatory field '{field}'")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// A payment was configured with a card token and split at the same time
    #[error("A card token can not be combined with split transactions")]
    ConflictingPaymentOptions,

    /// A basket operation referenced an item that does not exist
    #[error("Basket item '{item_id}' not found")]
    BasketItemNotFound {
        /// Item identifier
        item_id: String,
    },

    /// A basket item count would go below zero
    #[error("Basket item '{item_id}' count {count} can not be decremented by {by}")]
    InvalidItemCount {
        /// Item identifier
        item_id: String,
        /// Current count
        count: u32,
        /// Requested decrement
        by: u32,
    },

    /// Transaction processing tried to respond without approving or declining
    #[error("A transaction outcome (approve/decline) must be set before responding")]
    MissingOutcome,

    /// A payload could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description from the serializer
        message: String,
    },

    /// An envelope carried a message type this side can not handle
    #[error("Unknown message type '{message_type}'")]
    UnknownMessageType {
        /// Message type as received
        message_type: String,
    },

    /// The handler does not support the requested stage
    #[error("Stage {stage} is not supported by this service")]
    UnsupportedStage {
        /// Stage name as received
        stage: String,
    },

    /// A flow service reported a failure of its own
    #[error("Flow service error: {message}")]
    FlowService {
        /// Description of the failure
        message: String,
    },

    /// A response was already sent on this connection
    #[error("A response has already been sent for this request")]
    ResponseAlreadySent,

    /// A communicator operation was attempted in the wrong state
    #[error("Can not {operation} while {state}")]
    InvalidState {
        /// Attempted operation
        operation: String,
        /// State the communicator was in
        state: String,
    },

    /// The underlying channel has been closed by the peer
    #[error("Channel closed")]
    ChannelClosed,

    /// Reading or writing the transport failed
    #[error("I/O error: {message}")]
    Io {
        /// Description from the operating system
        message: String,
    },

    /// Unexpected failure while a request was processed
    #[error("Service exception: {message}")]
    ServiceException {
        /// Description of the failure
        message: String,
    },
}

impl From<serde_json::Error> for AppFlowError {
    fn from(error: serde_json::Error) -> Self {
        AppFlowError::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for AppFlowError {
    fn from(error: std::io::Error) -> Self {
        AppFlowError::Io {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl AppFlowError {
    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AppFlowError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a CurrencyMismatch error
    pub fn currency_mismatch(expected: &str, actual: &str) -> Self {
        AppFlowError::CurrencyMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a NegativeAmount error
    pub fn negative_amount(field: &str, value: i64) -> Self {
        AppFlowError::NegativeAmount {
            field: field.to_string(),
            value,
        }
    }

    /// Create a FractionOutOfRange error
    pub fn fraction_out_of_range(fraction: impl std::fmt::Display) -> Self {
        AppFlowError::FractionOutOfRange {
            fraction: fraction.to_string(),
        }
    }

    /// Create an AmountsPaidExceedRemaining error
    pub fn amounts_paid_exceed_remaining(paid: i64, remaining: i64) -> Self {
        AppFlowError::AmountsPaidExceedRemaining { paid, remaining }
    }

    /// Create a MissingField error
    pub fn missing_field(field: &str) -> Self {
        AppFlowError::MissingField {
            field: field.to_string(),
        }
    }

    /// Create a BasketItemNotFound error
    pub fn basket_item_not_found(item_id: &str) -> Self {
        AppFlowError::BasketItemNotFound {
            item_id: item_id.to_string(),
        }
    }

    /// Create an UnknownMessageType error
    pub fn unknown_message_type(message_type: &str) -> Self {
        AppFlowError::UnknownMessageType {
            message_type: message_type.to_string(),
        }
    }

    /// Create an UnsupportedStage error
    pub fn unsupported_stage(stage: impl std::fmt::Display) -> Self {
        AppFlowError::UnsupportedStage {
            stage: stage.to_string(),
        }
    }

    /// Create a FlowService error
    pub fn flow_service(message: impl Into<String>) -> Self {
        AppFlowError::FlowService {
            message: message.into(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(operation: &str, state: impl std::fmt::Display) -> Self {
        AppFlowError::InvalidState {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a ServiceException error
    pub fn service_exception(message: impl Into<String>) -> Self {
        AppFlowError::ServiceException {
            message: message.into(),
        }
    }

    /// Whether this error rejects caller input at an API boundary
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            AppFlowError::InvalidArgument { .. }
                | AppFlowError::CurrencyMismatch { .. }
                | AppFlowError::NegativeAmount { .. }
                | AppFlowError::FractionOutOfRange { .. }
                | AppFlowError::AmountsPaidExceedRemaining { .. }
                | AppFlowError::AdditionalAmountsNotAllowed
                | AppFlowError::CurrencyChangeNotAllowed { .. }
                | AppFlowError::MissingField { .. }
                | AppFlowError::ConflictingPaymentOptions
                | AppFlowError::BasketItemNotFound { .. }
                | AppFlowError::InvalidItemCount { .. }
        )
    }

    /// Whether this error is reported to the peer with its own error code
    ///
    /// Protocol errors end the stream but are not re-raised locally.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            AppFlowError::MissingOutcome
                | AppFlowError::Serialization { .. }
                | AppFlowError::UnknownMessageType { .. }
                | AppFlowError::UnsupportedStage { .. }
                | AppFlowError::FlowService { .. }
        )
    }

    /// Wire error code used when this error is sent to the peer
    pub fn error_code(&self) -> &'static str {
        match self {
            AppFlowError::UnknownMessageType { .. } => error_codes::UNKNOWN_MESSAGE_TYPE,
            AppFlowError::Serialization { .. } => error_codes::INVALID_MESSAGE,
            AppFlowError::UnsupportedStage { .. } => error_codes::UNSUPPORTED_STAGE,
            AppFlowError::MissingOutcome => error_codes::INVALID_RESPONSE,
            AppFlowError::FlowService { .. } => error_codes::FLOW_SERVICE_ERROR,
            _ if self.is_validation_error() => error_codes::INVALID_RESPONSE,
            _ => error_codes::SERVICE_EXCEPTION,
        }
    }
}
