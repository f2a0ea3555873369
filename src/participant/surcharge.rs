//! Participant adding a card surcharge before each transaction

use crate::core::PreTransactionModel;
use crate::service::PaymentFlowService;
use crate::types::AppFlowError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Adds `fraction` of the base amount as an additional amount at
/// `PRE_TRANSACTION`
pub struct SurchargeParticipant {
    surcharge_id: String,
    fraction: Decimal,
}

impl SurchargeParticipant {
    /// # Arguments
    ///
    /// * `surcharge_id` - Additional amount identifier, e.g. "surcharge"
    /// * `fraction` - Share of the base amount, validated when applied
    pub fn new(surcharge_id: &str, fraction: Decimal) -> Self {
        Self {
            surcharge_id: surcharge_id.to_string(),
            fraction,
        }
    }
}

#[async_trait]
impl PaymentFlowService for SurchargeParticipant {
    async fn pre_transaction(&self, mut model: PreTransactionModel) -> Result<(), AppFlowError> {
        let value =
            model.set_additional_amount_as_base_fraction(&self.surcharge_id, self.fraction)?;
        if value == 0 {
            return model.skip();
        }
        tracing::info!(
            transaction = %model.request().id,
            id = %self.surcharge_id,
            value,
            "applying surcharge"
        );
        model.send_response()
    }
}
