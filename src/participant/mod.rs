//! Built-in participants
//!
//! Ready-made [`PaymentFlowService`] implementations selectable at runtime, so
//! the binary can stand in for a flow or payment service during integration:
//!
//! - `passthrough` - Skips every flow stage
//! - `surcharge` - Adds a surcharge proportional to the base amount
//! - `simulated_payment` - Reads a test card and authorises against a limit

use crate::cli::ParticipantKind;
use crate::service::PaymentFlowService;
use rust_decimal::Decimal;
use std::sync::Arc;

pub mod passthrough;
pub mod simulated_payment;
pub mod surcharge;

pub use passthrough::PassthroughParticipant;
pub use simulated_payment::SimulatedPaymentParticipant;
pub use surcharge::SurchargeParticipant;

/// Additional amount identifier used for surcharges
pub const DEFAULT_SURCHARGE_ID: &str = "surcharge";

/// Settings shared by the built-in participants
#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantSettings {
    /// Additional amount identifier the surcharge is recorded under
    pub surcharge_id: String,
    /// Surcharge as a fraction of the base amount, in [0, 1]
    pub surcharge_fraction: Decimal,
    /// Decline transactions whose total exceeds this many subunits
    pub decline_above: Option<i64>,
}

impl Default for ParticipantSettings {
    fn default() -> Self {
        Self {
            surcharge_id: DEFAULT_SURCHARGE_ID.to_string(),
            surcharge_fraction: Decimal::new(5, 2),
            decline_above: None,
        }
    }
}

/// Create a participant of the given kind
///
/// # Arguments
///
/// * `kind` - Which participant to run
/// * `settings` - Settings; each participant reads only what it needs
///
/// # Returns
///
/// A shared trait object ready to be wrapped in a
/// [`FlowServiceDispatcher`](crate::service::FlowServiceDispatcher).
pub fn create_participant(
    kind: ParticipantKind,
    settings: ParticipantSettings,
) -> Arc<dyn PaymentFlowService> {
    match kind {
        ParticipantKind::Passthrough => Arc::new(PassthroughParticipant),
        ParticipantKind::Surcharge => Arc::new(SurchargeParticipant::new(
            &settings.surcharge_id,
            settings.surcharge_fraction,
        )),
        ParticipantKind::SimulatedPayment => {
            Arc::new(SimulatedPaymentParticipant::new(settings.decline_above))
        }
    }
}
