//! Stage models
//!
//! One model per flow stage. Every model follows the same lifecycle:
//!
//! ```text
//! from_context ──▶ CREATED ──[mutations 0..n]──▶ terminal operation (consumes the model)
//! ```
//!
//! A model is bound to a [`StageContext`] on construction and reads its input
//! from it. Mutations accumulate a response; exactly one terminal operation
//! (`send_response`, `skip`, `cancel_flow`, `approve_with_card`, ...) takes the
//! model by value, serializes what was accumulated and hands it back to the
//! context. Using a model after its terminal operation does not compile.
//!
//! Inputs are deep copies, so nothing a model mutates is visible to whoever
//! produced the request.
//!
//! - `pre_flow` - [`PreFlowModel`]
//! - `split` - [`SplitModel`]
//! - `pre_transaction` - [`PreTransactionModel`], also used for post card reading
//! - `card_reading` - [`CardReadingModel`]
//! - `transaction_processing` - [`TransactionProcessingModel`]
//! - `post_transaction` - [`PostTransactionModel`]
//! - `post_flow` - [`PostFlowModel`]
//! - `context` - The service and launched [`StageContext`] implementations

pub mod card_reading;
pub mod context;
pub mod post_flow;
pub mod post_transaction;
pub mod pre_flow;
pub mod pre_transaction;
pub mod split;
pub mod transaction_processing;

pub use card_reading::CardReadingModel;
pub use context::{LaunchedStageContext, ServiceStageContext};
pub use post_flow::PostFlowModel;
pub use post_transaction::PostTransactionModel;
pub use pre_flow::PreFlowModel;
pub use pre_transaction::PreTransactionModel;
pub use split::SplitModel;
pub use transaction_processing::TransactionProcessingModel;

use crate::core::{AmountsModifier, StageContext};
use crate::types::{
    AdditionalData, Amounts, AppFlowError, Basket, FlowResponse, FlowStage, JsonConvertible,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Decode the stage input, checking the context is for an accepted stage
fn decode_request<T: Serialize + DeserializeOwned>(
    context: &dyn StageContext,
    accepted: &[FlowStage],
) -> Result<T, AppFlowError> {
    let stage = context.stage();
    if !accepted.contains(&stage) {
        return Err(AppFlowError::unsupported_stage(stage));
    }
    T::from_json(context.request_data())
}

fn send_flow_response(
    context: &dyn StageContext,
    response: &FlowResponse,
) -> Result<(), AppFlowError> {
    tracing::debug!(stage = %context.stage(), empty = response.is_empty(), "sending flow response");
    context.send_response(response.to_json()?)
}

/// Augmentations accumulated by the flow-service stage models
#[derive(Debug, Clone)]
struct ResponseAccumulator {
    modifier: AmountsModifier,
    request_data: AdditionalData,
    references: AdditionalData,
    amounts_paid: Option<(Amounts, String)>,
    modified_basket: Option<Basket>,
    new_basket: Option<Basket>,
}

impl ResponseAccumulator {
    fn new(amounts: &Amounts) -> Self {
        Self {
            modifier: AmountsModifier::new(amounts),
            request_data: AdditionalData::new(),
            references: AdditionalData::new(),
            amounts_paid: None,
            modified_basket: None,
            new_basket: None,
        }
    }

    fn flow_response(&self) -> Result<FlowResponse, AppFlowError> {
        let updated_request_amounts = if self.modifier.has_modifications() {
            Some(self.modifier.build()?)
        } else {
            None
        };
        let (amounts_paid, amounts_paid_payment_method) = match &self.amounts_paid {
            Some((amounts, method)) => (Some(amounts.clone()), Some(method.clone())),
            None => (None, None),
        };

        Ok(FlowResponse {
            updated_request_amounts,
            amounts_paid,
            amounts_paid_payment_method,
            additional_request_data: non_empty(&self.request_data),
            payment_references: non_empty(&self.references),
            modified_request_basket: self.modified_basket.clone(),
            new_basket: self.new_basket.clone(),
            cancel_transaction: false,
        })
    }
}

fn non_empty(data: &AdditionalData) -> Option<AdditionalData> {
    if data.is_empty() {
        None
    } else {
        Some(data.clone())
    }
}

/// Response sent by `skip`
fn skip_response() -> FlowResponse {
    FlowResponse::default()
}

/// Response sent by `cancel_flow` / `cancel_transaction`
fn cancel_response() -> FlowResponse {
    FlowResponse {
        cancel_transaction: true,
        ..FlowResponse::default()
    }
}
