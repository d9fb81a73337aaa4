//! Fixed-point monetary amounts.
//!
//! Uses `rust_decimal` so that summing split values and comparing them
//! against the original amount is exact to the tolerance.

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Leading currency symbol and blanks are optional; the number itself must
/// have a fractional part. Digits are ASCII only so every match parses.
static CURRENCY_RE: OnceLock<Regex> = OnceLock::new();

fn currency_regex() -> &'static Regex {
    CURRENCY_RE.get_or_init(|| {
        Regex::new(r"^\$?[ \t]*(-?[0-9]+\.[0-9]+)").expect("currency pattern is valid")
    })
}

/// A monetary amount.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use split_rows::Amount;
///
/// let a = Amount::from_str("60.00").unwrap();
/// let b = Amount::from_str("40.005").unwrap();
/// assert_eq!(a.checked_add(b).unwrap().to_two_places(), "100.01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero value.
    pub const ZERO: Self = Amount(Decimal::ZERO);

    /// Largest difference at which two amounts still count as equal.
    pub fn tolerance() -> Decimal {
        Decimal::new(1, 3)
    }

    /// Wraps a raw decimal.
    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    /// Returns `true` if `self` and `other` differ by no more than
    /// [`Amount::tolerance`].
    ///
    /// A difference too large to represent never reconciles.
    pub fn reconciles_with(&self, other: Amount) -> bool {
        self.0
            .checked_sub(other.0)
            .map(|diff| diff.abs() <= Self::tolerance())
            .unwrap_or(false)
    }

    /// Sum of two amounts, or `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Difference of two amounts, or `None` on overflow.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Formats with exactly two decimal places, rounding half away from zero.
    pub fn to_two_places(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.2}", rounded)
    }

    /// Pulls an amount out of a loosely formatted value such as `$ -12.50`.
    ///
    /// Returns the numeric text as it appeared (without symbol or padding)
    /// together with its parsed value, or `None` if no amount leads the value.
    pub fn extract(value: &str) -> Option<(&str, Amount)> {
        let caps = currency_regex().captures(value)?;
        let digits = caps.get(1)?.as_str();
        let amount = Decimal::from_str(digits).ok()?;
        Some((digits, Amount(amount)))
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed))?;
        Ok(Amount(decimal))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[test]
    fn test_from_str_trims() {
        assert_eq!(amount("  100.00 "), amount("100"));
        assert_eq!(amount("-3.5"), Amount::new(Decimal::new(-35, 1)));
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!(Amount::from_str("$10.00").is_err());
        assert!(Amount::from_str("").is_err());
        assert!(Amount::from_str("abc").is_err());
    }

    #[test]
    fn test_to_two_places_rounds_and_pads() {
        assert_eq!(amount("10").to_two_places(), "10.00");
        assert_eq!(amount("10.5").to_two_places(), "10.50");
        assert_eq!(amount("0.125").to_two_places(), "0.13");
        assert_eq!(amount("-0.125").to_two_places(), "-0.13");
        assert_eq!(amount("19.994").to_two_places(), "19.99");
    }

    #[test]
    fn test_reconciles_within_tolerance() {
        assert!(amount("100.00").reconciles_with(amount("100.001")));
        assert!(amount("100.00").reconciles_with(amount("99.999")));
        assert!(!amount("100.00").reconciles_with(amount("100.0011")));
        assert!(!amount("100.00").reconciles_with(amount("99.99")));
    }

    #[test]
    fn test_extract_plain_and_symbol() {
        let (text, value) = Amount::extract("60.00").unwrap();
        assert_eq!(text, "60.00");
        assert_eq!(value, amount("60"));

        let (text, value) = Amount::extract("$40.00").unwrap();
        assert_eq!(text, "40.00");
        assert_eq!(value, amount("40"));

        let (text, _) = Amount::extract("$  -12.50 USD").unwrap();
        assert_eq!(text, "-12.50");
    }

    #[test]
    fn test_extract_requires_leading_decimal() {
        assert!(Amount::extract("60").is_none());
        assert!(Amount::extract("USD 60.00").is_none());
        assert!(Amount::extract("").is_none());
    }

    #[test]
    fn test_extract_ascii_digits_only() {
        assert!(Amount::extract("$\u{0666}\u{0660}.\u{0660}\u{0660}").is_none());
        assert!(Amount::extract("\u{00a0}60.00").is_none());
        assert_eq!(Amount::extract("$\t60.00").unwrap().0, "60.00");
    }

    #[test]
    fn test_checked_arithmetic() {
        let total = Amount::ZERO
            .checked_add(amount("60.00"))
            .and_then(|t| t.checked_add(amount("39.99")))
            .unwrap();
        assert_eq!(amount("100.00").checked_sub(total).unwrap().to_two_places(), "0.01");
    }

    #[test]
    fn test_checked_arithmetic_overflow() {
        let huge = amount("50000000000000000000000000000");
        assert!(huge.checked_add(huge).is_none());
        assert!(huge.checked_sub(Amount::ZERO.checked_sub(huge).unwrap()).is_none());
        assert!(!huge.reconciles_with(Amount::ZERO.checked_sub(huge).unwrap()));
    }
}
