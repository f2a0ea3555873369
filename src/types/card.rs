//! Card details captured during card reading

use crate::types::AdditionalData;
use serde::{Deserialize, Serialize};

/// Card data made available to later stages
///
/// Only masked or tokenised data is carried; the full PAN never leaves the
/// payment service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_pan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardholder_name: Option<String>,
    /// Expiry as `YYMM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_token: Option<String>,
    #[serde(default)]
    pub additional_data: AdditionalData,
}

impl Card {
    /// Create a card from its masked PAN
    pub fn new(masked_pan: &str) -> Self {
        Card {
            masked_pan: Some(masked_pan.to_string()),
            ..Card::default()
        }
    }

    /// A card with no data at all
    pub fn is_empty(&self) -> bool {
        self.masked_pan.is_none()
            && self.cardholder_name.is_none()
            && self.expiry_date.is_none()
            && self.card_token.is_none()
            && self.additional_data.is_empty()
    }
}
