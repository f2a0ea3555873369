//! Monetary value types
//!
//! All values are expressed in currency subunits (e.g. cents for USD) as `i64`.
//! [`Amount`] is a single value in a currency; [`Amounts`] is the full set of
//! amounts for a payment: a base amount plus named additional amounts such as
//! tip, cashback or a surcharge.

use crate::types::AppFlowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of the tip additional amount
pub const TIP: &str = "tip";

/// Identifier of the catch-all "other" additional amount
pub const OTHER: &str = "other";

/// A single non-negative value in a currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAmount")]
pub struct Amount {
    value: i64,
    currency: String,
}

#[derive(Deserialize)]
struct RawAmount {
    value: i64,
    currency: String,
}

impl TryFrom<RawAmount> for Amount {
    type Error = AppFlowError;

    fn try_from(raw: RawAmount) -> Result<Self, Self::Error> {
        Amount::new(raw.value, &raw.currency)
    }
}

impl Amount {
    /// Create a new amount
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` if `value` is below zero.
    pub fn new(value: i64, currency: &str) -> Result<Self, AppFlowError> {
        if value < 0 {
            return Err(AppFlowError::negative_amount("value", value));
        }
        Ok(Amount {
            value,
            currency: currency.to_string(),
        })
    }

    /// Value in currency subunits
    pub fn value(&self) -> i64 {
        self.value
    }

    /// ISO-4217 currency code
    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Amounts relating to a payment or transaction
///
/// Holds the base amount, any number of named additional amounts and, after a
/// currency conversion, the original currency and the rate that was applied.
///
/// # Invariants
///
/// - No component is negative
/// - All components share `currency`
/// - Additional amounts built through [`Amounts::with_tip_and_other`] are only
///   present when their value is greater than zero
///
/// Deserialized amounts go through the same checks as [`Amounts::with_additional_amounts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAmounts")]
pub struct Amounts {
    base_amount: i64,
    currency: String,
    #[serde(default)]
    additional_amounts: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency_exchange_rate: Option<Decimal>,
}

/// Wire form of [`Amounts`] before validation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAmounts {
    base_amount: i64,
    currency: String,
    #[serde(default)]
    additional_amounts: BTreeMap<String, i64>,
    #[serde(default)]
    original_currency: Option<String>,
    #[serde(default)]
    currency_exchange_rate: Option<Decimal>,
}

impl TryFrom<RawAmounts> for Amounts {
    type Error = AppFlowError;

    fn try_from(raw: RawAmounts) -> Result<Self, Self::Error> {
        if let Some(rate) = raw.currency_exchange_rate {
            if rate <= Decimal::ZERO {
                return Err(AppFlowError::invalid_argument(format!(
                    "currency exchange rate must be positive, got {}",
                    rate
                )));
            }
        }
        Ok(
            Amounts::with_additional_amounts(raw.base_amount, &raw.currency, raw.additional_amounts)?
                .with_conversion(raw.original_currency, raw.currency_exchange_rate),
        )
    }
}

impl Amounts {
    /// Create amounts with only a base amount
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` if `base_amount` is below zero.
    pub fn new(base_amount: i64, currency: &str) -> Result<Self, AppFlowError> {
        if base_amount < 0 {
            return Err(AppFlowError::negative_amount("base", base_amount));
        }
        Ok(Amounts {
            base_amount,
            currency: currency.to_string(),
            additional_amounts: BTreeMap::new(),
            original_currency: None,
            currency_exchange_rate: None,
        })
    }

    /// Zero amounts in a currency
    pub fn zero(currency: &str) -> Self {
        Amounts {
            base_amount: 0,
            currency: currency.to_string(),
            additional_amounts: BTreeMap::new(),
            original_currency: None,
            currency_exchange_rate: None,
        }
    }

    /// Create amounts from a base amount with optional tip and other amounts
    ///
    /// Tip and other are only recorded when their value is greater than zero.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if tip or other use a different currency than base.
    pub fn with_tip_and_other(
        base: Amount,
        tip: Option<Amount>,
        other: Option<Amount>,
    ) -> Result<Self, AppFlowError> {
        let mut amounts = Amounts::new(base.value(), base.currency())?;
        for (id, amount) in [(TIP, tip), (OTHER, other)] {
            if let Some(amount) = amount {
                if amount.currency() != base.currency() {
                    return Err(AppFlowError::currency_mismatch(
                        base.currency(),
                        amount.currency(),
                    ));
                }
                if amount.value() > 0 {
                    amounts
                        .additional_amounts
                        .insert(id.to_string(), amount.value());
                }
            }
        }
        Ok(amounts)
    }

    /// Create amounts with a set of additional amounts
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` if any component is below zero.
    pub fn with_additional_amounts(
        base_amount: i64,
        currency: &str,
        additional_amounts: BTreeMap<String, i64>,
    ) -> Result<Self, AppFlowError> {
        let mut amounts = Amounts::new(base_amount, currency)?;
        for (id, value) in additional_amounts {
            if value < 0 {
                return Err(AppFlowError::negative_amount(&id, value));
            }
            amounts.additional_amounts.insert(id, value);
        }
        Ok(amounts)
    }

    /// Amounts that skip validation, for exercising checks further down
    #[cfg(test)]
    pub(crate) fn unchecked(base_amount: i64, currency: &str) -> Self {
        let mut amounts = Amounts::zero(currency);
        amounts.base_amount = base_amount;
        amounts
    }

    pub(crate) fn with_conversion(
        mut self,
        original_currency: Option<String>,
        rate: Option<Decimal>,
    ) -> Self {
        self.original_currency = original_currency;
        self.currency_exchange_rate = rate;
        self
    }

    /// Base amount value in subunits
    pub fn base_amount_value(&self) -> i64 {
        self.base_amount
    }

    /// Base amount as an [`Amount`]
    pub fn base_amount(&self) -> Amount {
        Amount {
            value: self.base_amount,
            currency: self.currency.clone(),
        }
    }

    /// Currency of all components
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Tip amount, if one greater than zero is present
    pub fn tip(&self) -> Option<Amount> {
        self.positive_amount(TIP)
    }

    /// Other amount, if one greater than zero is present
    pub fn other(&self) -> Option<Amount> {
        self.positive_amount(OTHER)
    }

    fn positive_amount(&self, id: &str) -> Option<Amount> {
        self.additional_amounts
            .get(id)
            .filter(|value| **value > 0)
            .map(|value| Amount {
                value: *value,
                currency: self.currency.clone(),
            })
    }

    /// Value of a named additional amount, 0 if absent
    pub fn additional_amount_value(&self, id: &str) -> i64 {
        self.additional_amounts.get(id).copied().unwrap_or(0)
    }

    /// Whether an additional amount with this identifier is set
    pub fn has_additional_amount(&self, id: &str) -> bool {
        self.additional_amounts.contains_key(id)
    }

    /// All additional amounts keyed by identifier
    pub fn additional_amounts(&self) -> &BTreeMap<String, i64> {
        &self.additional_amounts
    }

    /// Currency the amounts were converted from, if any
    pub fn original_currency(&self) -> Option<&str> {
        self.original_currency.as_deref()
    }

    /// Exchange rate applied by a currency conversion, if any
    pub fn currency_exchange_rate(&self) -> Option<Decimal> {
        self.currency_exchange_rate
    }

    /// Total of base and all additional amounts
    pub fn total_amount_value(&self) -> i64 {
        self.base_amount + self.additional_amounts.values().sum::<i64>()
    }

    /// Total of base and additional amounts, leaving out the given identifiers
    pub fn total_excluding(&self, excluded: &[&str]) -> i64 {
        self.base_amount
            + self
                .additional_amounts
                .iter()
                .filter(|(id, _)| !excluded.contains(&id.as_str()))
                .map(|(_, value)| *value)
                .sum::<i64>()
    }

    /// Add two amounts component-wise
    ///
    /// Additional amounts are matched by identifier; identifiers present in
    /// only one operand are carried over.
    ///
    /// # Errors
    ///
    /// - `CurrencyMismatch` if the operands use different currencies
    /// - `InvalidArgument` if a component sum overflows
    pub fn add_amounts(a: &Amounts, b: &Amounts) -> Result<Amounts, AppFlowError> {
        if a.currency != b.currency {
            return Err(AppFlowError::currency_mismatch(&a.currency, &b.currency));
        }
        let overflow = |id: &str| {
            AppFlowError::invalid_argument(format!("sum of '{}' amounts overflows", id))
        };
        let mut result = a.clone();
        result.base_amount = a
            .base_amount
            .checked_add(b.base_amount)
            .ok_or_else(|| overflow("base"))?;
        for (id, value) in &b.additional_amounts {
            let current = result.additional_amounts.entry(id.clone()).or_insert(0);
            *current = current.checked_add(*value).ok_or_else(|| overflow(id))?;
        }
        Ok(result)
    }

    /// Subtract `b` from `a` component-wise
    ///
    /// Each component is floored at zero rather than going negative, and
    /// additional amounts that reach zero are dropped.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if the operands use different currencies.
    pub fn subtract_amounts(a: &Amounts, b: &Amounts) -> Result<Amounts, AppFlowError> {
        if a.currency != b.currency {
            return Err(AppFlowError::currency_mismatch(&a.currency, &b.currency));
        }
        let mut result = a.clone();
        result.base_amount = (a.base_amount - b.base_amount).max(0);
        for (id, value) in &b.additional_amounts {
            if let Some(current) = result.additional_amounts.get_mut(id) {
                *current = (*current - value).max(0);
            }
        }
        result.additional_amounts.retain(|_, value| *value > 0);
        Ok(result)
    }
}

impl std::fmt::Display for Amounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (base {})",
            self.total_amount_value(),
            self.currency,
            self.base_amount
        )
    }
}
