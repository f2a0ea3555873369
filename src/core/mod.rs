//! Core stage-model logic
//!
//! This module contains the participant-side components of a payment flow:
//! - `traits` - Seams binding stage models to a transport or a launching host
//! - `amounts_modifier` - Accumulates changes to requested amounts
//! - `stage` - One model per flow stage

pub mod amounts_modifier;
pub mod stage;
pub mod traits;

pub use amounts_modifier::AmountsModifier;
pub use stage::{
    CardReadingModel, LaunchedStageContext, PostFlowModel, PostTransactionModel, PreFlowModel,
    PreTransactionModel, ServiceStageContext, SplitModel, TransactionProcessingModel,
};
pub use traits::{HostLauncher, StageContext};
