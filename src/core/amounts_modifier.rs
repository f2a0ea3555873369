//! Accumulating changes to request amounts
//!
//! [`AmountsModifier`] starts from a snapshot of [`Amounts`] and records the
//! changes a flow service wants to make: additional amounts (fixed or as a
//! fraction of the base), base amount adjustments and currency conversion.
//! Nothing is validated against the non-negative invariant until
//! [`build`](AmountsModifier::build), so a sequence of offsets may pass through
//! a temporarily negative value.
//!
//! Fractions and exchange rates are `Decimal`s; results are rounded to the
//! nearest subunit with midpoints rounded away from zero.

use crate::types::{Amounts, AppFlowError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;

/// Builder-style accumulator of changes to a set of [`Amounts`]
#[derive(Debug, Clone, PartialEq)]
pub struct AmountsModifier {
    base_amount: i64,
    currency: String,
    additional_amounts: BTreeMap<String, i64>,
    original_currency: Option<String>,
    exchange_rate: Option<Decimal>,
    modified: bool,
}

fn round_to_subunit(value: Decimal) -> Result<i64, AppFlowError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppFlowError::invalid_argument(format!("amount {} out of range", value)))
}

fn scale(value: i64, factor: Decimal) -> Result<i64, AppFlowError> {
    let scaled = Decimal::from(value).checked_mul(factor).ok_or_else(|| {
        AppFlowError::invalid_argument(format!("{} × {} is out of range", value, factor))
    })?;
    round_to_subunit(scaled)
}

impl AmountsModifier {
    /// Start modifying a copy of `amounts`
    pub fn new(amounts: &Amounts) -> Self {
        Self {
            base_amount: amounts.base_amount_value(),
            currency: amounts.currency().to_string(),
            additional_amounts: amounts.additional_amounts().clone(),
            original_currency: amounts.original_currency().map(str::to_string),
            exchange_rate: amounts.currency_exchange_rate(),
            modified: false,
        }
    }

    /// Set (or overwrite) an additional amount
    pub fn set_additional_amount(&mut self, id: &str, value: i64) -> &mut Self {
        self.additional_amounts.insert(id.to_string(), value);
        self.modified = true;
        self
    }

    /// Set an additional amount as a fraction of the current base amount
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier of the additional amount
    /// * `fraction` - Share of the base amount, within [0, 1]
    ///
    /// # Returns
    ///
    /// The value that was set, `round(base × fraction)`.
    ///
    /// # Errors
    ///
    /// Returns `FractionOutOfRange` if `fraction` is outside of [0, 1], or
    /// `InvalidArgument` if the product is out of range.
    pub fn set_additional_amount_as_base_fraction(
        &mut self,
        id: &str,
        fraction: Decimal,
    ) -> Result<i64, AppFlowError> {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(AppFlowError::fraction_out_of_range(fraction));
        }
        let value = scale(self.base_amount, fraction)?;
        self.set_additional_amount(id, value);
        Ok(value)
    }

    /// Add `delta` (which may be negative) to the base amount
    pub fn offset_base_amount(&mut self, delta: i64) -> &mut Self {
        self.base_amount = self.base_amount.saturating_add(delta);
        self.modified = true;
        self
    }

    /// Replace the base amount
    pub fn update_base_amount(&mut self, value: i64) -> &mut Self {
        self.base_amount = value;
        self.modified = true;
        self
    }

    /// Replace every component with those of `amounts`
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if `amounts` uses another currency.
    pub fn replace_amounts(&mut self, amounts: &Amounts) -> Result<(), AppFlowError> {
        if amounts.currency() != self.currency {
            return Err(AppFlowError::currency_mismatch(&self.currency, amounts.currency()));
        }
        self.base_amount = amounts.base_amount_value();
        self.additional_amounts = amounts.additional_amounts().clone();
        self.modified = true;
        Ok(())
    }

    /// Convert every component into another currency
    ///
    /// Each component is multiplied by `rate` and rounded. The currency the
    /// amounts started in and the cumulative rate are recorded on the result.
    /// Whether a conversion is permitted at all is decided by the caller.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `rate` is not positive, `currency` is blank
    /// or a converted value is out of range. The modifier is unchanged on error.
    pub fn change_currency(&mut self, currency: &str, rate: Decimal) -> Result<(), AppFlowError> {
        if rate <= Decimal::ZERO {
            return Err(AppFlowError::invalid_argument(format!(
                "exchange rate must be positive, got {}",
                rate
            )));
        }
        if currency.trim().is_empty() {
            return Err(AppFlowError::invalid_argument("currency code must not be blank"));
        }

        let base_amount = scale(self.base_amount, rate)?;
        let additional_amounts = self
            .additional_amounts
            .iter()
            .map(|(id, value)| Ok((id.clone(), scale(*value, rate)?)))
            .collect::<Result<BTreeMap<_, _>, AppFlowError>>()?;
        let exchange_rate = match self.exchange_rate {
            Some(previous) => previous.checked_mul(rate).ok_or_else(|| {
                AppFlowError::invalid_argument(format!(
                    "cumulative exchange rate {} × {} is out of range",
                    previous, rate
                ))
            })?,
            None => rate,
        };

        if self.original_currency.is_none() {
            self.original_currency = Some(self.currency.clone());
        }
        self.base_amount = base_amount;
        self.additional_amounts = additional_amounts;
        self.exchange_rate = Some(exchange_rate);
        self.currency = currency.to_string();
        self.modified = true;
        Ok(())
    }

    /// Whether any setter has been called
    pub fn has_modifications(&self) -> bool {
        self.modified
    }

    /// Current (unvalidated) base amount
    pub fn base_amount_value(&self) -> i64 {
        self.base_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Produce the modified amounts
    ///
    /// Does not consume the modifier; calling it repeatedly without changes
    /// yields equal results.
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` if the base or any additional amount is negative.
    pub fn build(&self) -> Result<Amounts, AppFlowError> {
        let amounts = Amounts::with_additional_amounts(
            self.base_amount,
            &self.currency,
            self.additional_amounts.clone(),
        )?;
        Ok(amounts.with_conversion(self.original_currency.clone(), self.exchange_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn usd(value: i64) -> Amounts {
        Amounts::new(value, "USD").unwrap()
    }

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_unmodified_build_equals_input() {
        let amounts = usd(1000);
        let modifier = AmountsModifier::new(&amounts);

        assert!(!modifier.has_modifications());
        assert_eq!(modifier.build().unwrap(), amounts);
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut modifier = AmountsModifier::new(&usd(1000));
        modifier.set_additional_amount("charity", 25);

        assert!(modifier.has_modifications());
        assert_eq!(modifier.build().unwrap(), modifier.build().unwrap());
        assert_eq!(modifier.build().unwrap().total_amount_value(), 1025);
    }

    #[rstest]
    #[case::zero("0", 0)]
    #[case::five_percent("0.05", 50)]
    #[case::rounds_half_up("0.0125", 13)]
    #[case::whole("1", 1000)]
    fn test_base_fraction(#[case] fraction: &str, #[case] expected: i64) {
        let mut modifier = AmountsModifier::new(&usd(1000));

        let value = modifier
            .set_additional_amount_as_base_fraction("surcharge", dec(fraction))
            .unwrap();

        assert_eq!(value, expected);
        assert_eq!(
            modifier.build().unwrap().additional_amount_value("surcharge"),
            expected
        );
    }

    #[rstest]
    #[case::negative("-0.01")]
    #[case::above_one("1.5")]
    fn test_base_fraction_out_of_range(#[case] fraction: &str) {
        let mut modifier = AmountsModifier::new(&usd(1000));

        let result = modifier.set_additional_amount_as_base_fraction("surcharge", dec(fraction));

        assert!(matches!(result, Err(AppFlowError::FractionOutOfRange { .. })));
        assert!(!modifier.has_modifications());
    }

    #[test]
    fn test_negative_result_rejected_at_build() {
        let mut modifier = AmountsModifier::new(&usd(100));
        modifier.offset_base_amount(-150);

        assert!(matches!(
            modifier.build(),
            Err(AppFlowError::NegativeAmount { .. })
        ));

        modifier.offset_base_amount(100);
        assert_eq!(modifier.build().unwrap().base_amount_value(), 50);
    }

    #[test]
    fn test_negative_additional_amount_rejected_at_build() {
        let mut modifier = AmountsModifier::new(&usd(100));
        modifier.set_additional_amount("discount", -10);

        assert!(modifier.build().is_err());
    }

    #[test]
    fn test_change_currency_converts_every_component() {
        let mut modifier = AmountsModifier::new(&usd(1000));
        modifier.set_additional_amount("tip", 100);
        modifier.change_currency("EUR", dec("0.85")).unwrap();

        let amounts = modifier.build().unwrap();

        assert_eq!(amounts.currency(), "EUR");
        assert_eq!(amounts.base_amount_value(), 850);
        assert_eq!(amounts.additional_amount_value("tip"), 85);
        assert_eq!(amounts.original_currency(), Some("USD"));
        assert_eq!(amounts.currency_exchange_rate(), Some(dec("0.85")));
    }

    #[rstest]
    #[case::zero_rate("EUR", "0")]
    #[case::negative_rate("EUR", "-1.2")]
    #[case::blank_currency("  ", "1.2")]
    fn test_change_currency_rejects_bad_input(#[case] currency: &str, #[case] rate: &str) {
        let mut modifier = AmountsModifier::new(&usd(1000));

        assert!(modifier.change_currency(currency, dec(rate)).is_err());
        assert_eq!(modifier.currency(), "USD");
    }

    #[rstest]
    #[case::base(usd(i64::MAX / 2), 0)]
    #[case::additional(usd(0), i64::MAX / 2)]
    fn test_change_currency_overflow_is_an_error(#[case] amounts: Amounts, #[case] tip: i64) {
        let mut modifier = AmountsModifier::new(&amounts);
        modifier.set_additional_amount("tip", tip);
        let before = modifier.clone();

        let result = modifier.change_currency("XXX", Decimal::MAX);

        assert!(matches!(result, Err(AppFlowError::InvalidArgument { .. })));
        assert_eq!(modifier, before);
    }

    #[test]
    fn test_cumulative_rate_overflow_is_an_error() {
        let mut modifier = AmountsModifier::new(&usd(0));
        modifier.change_currency("EUR", Decimal::MAX).unwrap();

        let result = modifier.change_currency("GBP", Decimal::MAX);

        assert!(matches!(result, Err(AppFlowError::InvalidArgument { .. })));
        assert_eq!(modifier.currency(), "EUR");
    }

    #[test]
    fn test_replace_amounts_requires_same_currency() {
        let mut modifier = AmountsModifier::new(&usd(1000));

        assert!(modifier
            .replace_amounts(&Amounts::new(500, "GBP").unwrap())
            .is_err());
        assert!(!modifier.has_modifications());

        modifier.replace_amounts(&usd(500)).unwrap();
        assert_eq!(modifier.build().unwrap(), usd(500));
    }

    #[test]
    fn test_update_base_amount() {
        let mut modifier = AmountsModifier::new(&usd(1000));
        modifier.update_base_amount(750);

        assert_eq!(modifier.build().unwrap(), usd(750));
    }
}
