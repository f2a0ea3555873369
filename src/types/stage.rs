//! Flow stages
//!
//! A payment moves through a fixed sequence of named stages. Flow services and
//! payment services are invoked at the stages they registered for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One named point in the payment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStage {
    /// Before anything else; may alter the payment as a whole
    PreFlow,
    /// Divide the payment into sub-transactions
    Split,
    /// Before card reading for each transaction
    PreTransaction,
    /// Card presentment, owned by the payment service
    CardReading,
    /// After card data is known, before processing
    PostCardReading,
    /// Authorisation, owned by the payment service
    TransactionProcessing,
    /// After each transaction has been processed
    PostTransaction,
    /// After the whole payment has completed
    PostFlow,
    /// Stage name missing or not recognised
    #[serde(other)]
    Unknown,
}

impl FlowStage {
    /// Stages in the order the orchestrator visits them
    pub const ORDER: [FlowStage; 8] = [
        FlowStage::PreFlow,
        FlowStage::Split,
        FlowStage::PreTransaction,
        FlowStage::CardReading,
        FlowStage::PostCardReading,
        FlowStage::TransactionProcessing,
        FlowStage::PostTransaction,
        FlowStage::PostFlow,
    ];

    /// Wire name of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStage::PreFlow => "PRE_FLOW",
            FlowStage::Split => "SPLIT",
            FlowStage::PreTransaction => "PRE_TRANSACTION",
            FlowStage::CardReading => "CARD_READING",
            FlowStage::PostCardReading => "POST_CARD_READING",
            FlowStage::TransactionProcessing => "TRANSACTION_PROCESSING",
            FlowStage::PostTransaction => "POST_TRANSACTION",
            FlowStage::PostFlow => "POST_FLOW",
            FlowStage::Unknown => "UNKNOWN",
        }
    }

    /// The stage that follows this one, `None` after post-flow
    ///
    /// Note that the orchestrator loops from post-transaction back to split
    /// while a split payment still has amounts remaining; that decision is not
    /// made here.
    pub fn next(&self) -> Option<FlowStage> {
        let position = Self::ORDER.iter().position(|stage| stage == self)?;
        Self::ORDER.get(position + 1).copied()
    }

    /// Whether the stage is handled by the payment service rather than flow services
    pub fn is_payment_service_stage(&self) -> bool {
        matches!(
            self,
            FlowStage::CardReading | FlowStage::TransactionProcessing
        )
    }

    /// Whether the stage runs once per transaction (as opposed to once per payment)
    pub fn is_transaction_stage(&self) -> bool {
        matches!(
            self,
            FlowStage::PreTransaction
                | FlowStage::CardReading
                | FlowStage::PostCardReading
                | FlowStage::TransactionProcessing
                | FlowStage::PostTransaction
        )
    }

    /// Parse a stage name, mapping anything unrecognised to `Unknown`
    pub fn parse_lenient(name: &str) -> FlowStage {
        name.parse().unwrap_or(FlowStage::Unknown)
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        FlowStage::ORDER
            .iter()
            .chain(std::iter::once(&FlowStage::Unknown))
            .find(|stage| stage.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown flow stage '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pre_flow(FlowStage::PreFlow, Some(FlowStage::Split))]
    #[case::card_reading(FlowStage::CardReading, Some(FlowStage::PostCardReading))]
    #[case::post_transaction(FlowStage::PostTransaction, Some(FlowStage::PostFlow))]
    #[case::post_flow(FlowStage::PostFlow, None)]
    #[case::unknown(FlowStage::Unknown, None)]
    fn test_next_stage(#[case] stage: FlowStage, #[case] expected: Option<FlowStage>) {
        assert_eq!(stage.next(), expected);
    }

    #[rstest]
    #[case::exact("PRE_TRANSACTION", FlowStage::PreTransaction)]
    #[case::lowercase("post_flow", FlowStage::PostFlow)]
    #[case::garbage("LOYALTY", FlowStage::Unknown)]
    #[case::empty("", FlowStage::Unknown)]
    fn test_parse_lenient(#[case] name: &str, #[case] expected: FlowStage) {
        assert_eq!(FlowStage::parse_lenient(name), expected);
    }

    #[test]
    fn test_wire_names_match_serde() {
        for stage in FlowStage::ORDER {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
        let unknown: FlowStage = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(unknown, FlowStage::Unknown);
    }

    #[test]
    fn test_payment_service_stages() {
        let owned: Vec<FlowStage> = FlowStage::ORDER
            .into_iter()
            .filter(FlowStage::is_payment_service_stage)
            .collect();
        assert_eq!(
            owned,
            vec![FlowStage::CardReading, FlowStage::TransactionProcessing]
        );
    }
}
