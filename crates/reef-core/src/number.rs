//! Fixed-precision decimal numbers.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Every `Number` carries the
//! number of digits after the decimal point it is held at; arithmetic keeps the
//! larger of the two operand precisions unless a precision is given explicitly.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Largest precision a `Decimal` can hold.
pub const MAX_PRECISION: u32 = 28;

/// Rounding policy applied when a value is brought to a precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Round half away from zero (1.15 -> 1.2, -1.15 -> -1.2).
    #[default]
    HalfAwayFromZero,
    /// Drop extra digits (1.19 -> 1.1).
    Truncate,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            Self::Truncate => RoundingStrategy::ToZero,
        }
    }
}

/// Exact decimal value held at a fixed precision.
#[derive(Debug, Clone, Copy)]
pub struct Number {
    value: Decimal,
    precision: u32,
}

fn check_precision(precision: u32) -> Result<u32> {
    if precision > MAX_PRECISION {
        return Err(CoreError::InvalidPrecision(precision));
    }
    Ok(precision)
}

fn round_to(value: Decimal, precision: u32, rounding: Rounding) -> Decimal {
    value.round_dp_with_strategy(precision, rounding.strategy())
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

impl Number {
    /// Build from a decimal, rounding half away from zero.
    pub fn from_decimal(value: Decimal, precision: u32) -> Result<Self> {
        Self::from_decimal_with(value, precision, Rounding::HalfAwayFromZero)
    }

    /// Build from a decimal with an explicit rounding policy.
    pub fn from_decimal_with(value: Decimal, precision: u32, rounding: Rounding) -> Result<Self> {
        let precision = check_precision(precision)?;
        Ok(Self {
            value: round_to(value, precision, rounding),
            precision,
        })
    }

    /// Build from a float, rounding half away from zero.
    ///
    /// The float goes through its shortest round-trip string form, so `1.15`
    /// is treated as the decimal `1.15` and not its binary approximation.
    pub fn from_f64(value: f64, precision: u32) -> Result<Self> {
        Self::from_f64_with(value, precision, Rounding::HalfAwayFromZero)
    }

    /// Build from a float, truncating extra digits.
    pub fn from_f64_truncate(value: f64, precision: u32) -> Result<Self> {
        Self::from_f64_with(value, precision, Rounding::Truncate)
    }

    fn from_f64_with(value: f64, precision: u32, rounding: Rounding) -> Result<Self> {
        if !value.is_finite() {
            return Err(CoreError::InvalidNumber(value.to_string()));
        }
        let parsed = Decimal::from_str(&value.to_string())?;
        Self::from_decimal_with(parsed, precision, rounding)
    }

    /// Parse a string and round it to `precision`.
    pub fn from_str_with_precision(s: &str, precision: u32) -> Result<Self> {
        let parsed = Decimal::from_str(s.trim())
            .map_err(|e| CoreError::InvalidNumber(format!("{s}: {e}")))?;
        Self::from_decimal(parsed, precision)
    }

    pub fn zero() -> Self {
        Self {
            value: Decimal::ZERO,
            precision: 0,
        }
    }

    pub fn one() -> Self {
        Self {
            value: Decimal::ONE,
            precision: 0,
        }
    }

    #[inline]
    pub fn value(&self) -> Decimal {
        self.value
    }

    #[inline]
    pub fn precision(&self) -> u32 {
        self.precision
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.value.is_sign_positive() && !self.value.is_zero()
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    /// Lossy float view, for logging and float-based collaborators.
    pub fn as_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    /// String with exactly `precision` digits after the point.
    pub fn as_string(&self) -> String {
        format!("{:.*}", self.precision as usize, self.value)
    }

    fn at(value: Decimal, precision: u32, rounding: Rounding) -> Self {
        Self {
            value: round_to(value, precision, rounding),
            precision,
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        let precision = self.precision.max(other.precision);
        Self::at(self.value + other.value, precision, Rounding::HalfAwayFromZero)
    }

    pub fn subtract(&self, other: &Number) -> Number {
        let precision = self.precision.max(other.precision);
        Self::at(self.value - other.value, precision, Rounding::HalfAwayFromZero)
    }

    pub fn multiply(&self, other: &Number) -> Number {
        self.multiply_with(other, Rounding::HalfAwayFromZero)
    }

    pub fn multiply_truncate(&self, other: &Number) -> Number {
        self.multiply_with(other, Rounding::Truncate)
    }

    fn multiply_with(&self, other: &Number, rounding: Rounding) -> Number {
        let precision = self.precision.max(other.precision);
        Self::at(self.value * other.value, precision, rounding)
    }

    pub fn divide(&self, other: &Number) -> Result<Number> {
        self.divide_with(other, Rounding::HalfAwayFromZero)
    }

    pub fn divide_truncate(&self, other: &Number) -> Result<Number> {
        self.divide_with(other, Rounding::Truncate)
    }

    fn divide_with(&self, other: &Number, rounding: Rounding) -> Result<Number> {
        let precision = self.precision.max(other.precision);
        let quotient = self
            .value
            .checked_div(other.value)
            .ok_or(CoreError::DivisionByZero)?;
        Ok(Self::at(quotient, precision, rounding))
    }

    /// Multiply by a raw factor, keeping this number's precision.
    pub fn scale(&self, factor: Decimal) -> Number {
        Self::at(self.value * factor, self.precision, Rounding::HalfAwayFromZero)
    }

    pub fn scale_truncate(&self, factor: Decimal) -> Number {
        Self::at(self.value * factor, self.precision, Rounding::Truncate)
    }

    pub fn negate(&self) -> Number {
        Self {
            value: -self.value,
            precision: self.precision,
        }
    }

    pub fn abs(&self) -> Number {
        Self {
            value: self.value.abs(),
            precision: self.precision,
        }
    }

    /// `1 / self` at this number's precision.
    pub fn invert(&self) -> Result<Number> {
        self.invert_to(self.precision)
    }

    /// `1 / self` at an explicit precision.
    pub fn invert_to(&self, precision: u32) -> Result<Number> {
        let precision = check_precision(precision)?;
        let inverted = Decimal::ONE
            .checked_div(self.value)
            .ok_or(CoreError::DivisionByZero)?;
        Ok(Self::at(inverted, precision, Rounding::HalfAwayFromZero))
    }

    pub fn rescale(&self, precision: u32) -> Result<Number> {
        Self::from_decimal(self.value, precision)
    }

    pub fn rescale_truncate(&self, precision: u32) -> Result<Number> {
        Self::from_decimal_with(self.value, precision, Rounding::Truncate)
    }

    /// Smaller of the two values; the precision travels with the value.
    pub fn min(self, other: Number) -> Number {
        if other.value < self.value {
            other
        } else {
            self
        }
    }

    pub fn max(self, other: Number) -> Number {
        if other.value > self.value {
            other
        } else {
            self
        }
    }

    /// Reduced integer ratio `numerator / denominator` equal to this value.
    ///
    /// # Errors
    /// `RatioOverflow` if either side of the reduced ratio does not fit in an `i32`.
    pub fn as_ratio(&self) -> Result<(i32, i32)> {
        let rounded = round_to(self.value, self.precision, Rounding::HalfAwayFromZero);
        let numerator = rounded.mantissa();
        let denominator = 10i128.pow(rounded.scale());
        let divisor = gcd(numerator, denominator).max(1);
        let (numerator, denominator) = (numerator / divisor, denominator / divisor);

        match (i32::try_from(numerator), i32::try_from(denominator)) {
            (Ok(n), Ok(d)) => Ok((n, d)),
            _ => Err(CoreError::RatioOverflow {
                numerator,
                denominator,
            }),
        }
    }

    /// Compare after bringing both values to the coarser of the two precisions.
    pub fn equals_precision_normalized(&self, other: &Number, epsilon: Decimal) -> bool {
        let precision = self.precision.min(other.precision);
        let a = round_to(self.value, precision, Rounding::HalfAwayFromZero);
        let b = round_to(other.value, precision, Rounding::HalfAwayFromZero);
        (a - b).abs() <= epsilon
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.value.cmp(&other.value))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// Parses a literal keeping the precision it was written with (`"1.050"` -> 3).
impl FromStr for Number {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = Decimal::from_str(s.trim())
            .map_err(|e| CoreError::InvalidNumber(format!("{s}: {e}")))?;
        Self::from_decimal(parsed, parsed.scale())
    }
}

impl Neg for Number {
    type Output = Number;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

struct NumberVisitor;

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = Number;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or decimal string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Number, E> {
        Number::from_str(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Number, E> {
        Number::from_str(&v.to_string()).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Number, E> {
        Number::from_decimal(Decimal::from(v), 0).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Number, E> {
        Number::from_decimal(Decimal::from(v), 0).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn num(s: &str) -> Number {
        s.parse().unwrap()
    }

    #[test]
    fn test_round_vs_truncate_at_midpoint() {
        let rounded = Number::from_f64(1.15, 1).unwrap();
        let truncated = Number::from_f64_truncate(1.15, 1).unwrap();

        assert_eq!(rounded.as_string(), "1.2");
        assert_eq!(truncated.as_string(), "1.1");
    }

    #[test]
    fn test_round_half_away_from_zero_negative() {
        let n = Number::from_f64(-2.5, 0).unwrap();
        assert_eq!(n.as_string(), "-3");
    }

    #[test]
    fn test_precision_round_trip() {
        for (f, p) in [(0.123456, 3), (1234.5, 0), (7.0, 4), (0.0000001, 7), (99.995, 2)] {
            let n = Number::from_f64(f, p).unwrap();
            let parsed: f64 = n.as_string().parse().unwrap();
            let expected = Decimal::from_str(&f.to_string())
                .unwrap()
                .round_dp_with_strategy(p, RoundingStrategy::MidpointAwayFromZero);
            assert_eq!(Decimal::from_str(&parsed.to_string()).unwrap(), expected);
        }
    }

    #[test]
    fn test_as_string_pads_precision() {
        let n = Number::from_decimal(dec!(1.5), 4).unwrap();
        assert_eq!(n.as_string(), "1.5000");
        assert_eq!(n.to_string(), "1.5000");
    }

    #[test]
    fn test_from_str_infers_precision() {
        let n = num("1.050");
        assert_eq!(n.precision(), 3);
        assert_eq!(n.value(), dec!(1.05));
    }

    #[test]
    fn test_arithmetic_uses_larger_precision() {
        let a = num("1.5");
        let b = num("0.25");

        let sum = a.add(&b);
        assert_eq!(sum.precision(), 2);
        assert_eq!(sum.as_string(), "1.75");

        let product = a.multiply(&b);
        assert_eq!(product.precision(), 2);
        assert_eq!(product.as_string(), "0.38"); // 0.375 rounds away from zero

        let truncated = a.multiply_truncate(&b);
        assert_eq!(truncated.as_string(), "0.37");

        let diff = b.subtract(&a);
        assert_eq!(diff.as_string(), "-1.25");
    }

    #[test]
    fn test_divide() {
        let a = num("10.00");
        let b = num("3");
        assert_eq!(a.divide(&b).unwrap().as_string(), "3.33");
        assert_eq!(num("2.00").divide(&b).unwrap().as_string(), "0.67");
        assert_eq!(num("2.00").divide_truncate(&b).unwrap().as_string(), "0.66");
        assert!(matches!(
            a.divide(&Number::zero()),
            Err(CoreError::DivisionByZero)
        ));
    }

    #[test]
    fn test_scale_keeps_precision() {
        let n = num("2.000");
        let scaled = n.scale(dec!(1.0005));
        assert_eq!(scaled.precision(), 3);
        assert_eq!(scaled.as_string(), "2.001");
    }

    #[test]
    fn test_invert() {
        let n = num("4.0000000");
        assert_eq!(n.invert().unwrap().as_string(), "0.2500000");
        assert_eq!(num("3").invert_to(4).unwrap().as_string(), "0.3333");
        assert!(Number::zero().invert().is_err());
    }

    #[test]
    fn test_negate_and_abs() {
        let n = num("-1.25");
        assert_eq!(n.abs().as_string(), "1.25");
        assert_eq!(n.negate().as_string(), "1.25");
        assert_eq!((-n).precision(), 2);
    }

    #[test]
    fn test_ratio_reduced() {
        assert_eq!(num("0.25").as_ratio().unwrap(), (1, 4));
        assert_eq!(num("1.5000000").as_ratio().unwrap(), (3, 2));
        assert_eq!(num("0").as_ratio().unwrap(), (0, 1));
        assert_eq!(num("-2.50").as_ratio().unwrap(), (-5, 2));
    }

    #[test]
    fn test_ratio_invertibility() {
        for s in ["0.1234567", "1.0200000", "250.5", "0.0000001", "3"] {
            let n = num(s);
            let (numerator, denominator) = n.as_ratio().unwrap();
            let rebuilt = Number::from_decimal(
                Decimal::from(numerator) / Decimal::from(denominator),
                n.precision(),
            )
            .unwrap();
            assert!(rebuilt.equals_precision_normalized(&n, Decimal::ZERO), "{s}");
        }
    }

    #[test]
    fn test_ratio_overflow() {
        let n = Number::from_decimal(dec!(0.0000000001), 10).unwrap();
        assert!(matches!(n.as_ratio(), Err(CoreError::RatioOverflow { .. })));
    }

    #[test]
    fn test_equals_precision_normalized() {
        let coarse = num("1.2");
        let fine = num("1.2049");
        assert!(coarse.equals_precision_normalized(&fine, Decimal::ZERO));

        let further = num("1.26");
        assert!(!coarse.equals_precision_normalized(&further, Decimal::ZERO));
        assert!(coarse.equals_precision_normalized(&further, dec!(0.1)));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            Number::from_decimal(dec!(1), 29),
            Err(CoreError::InvalidPrecision(29))
        ));
        assert!(Number::from_f64(f64::NAN, 2).is_err());
        assert!("abc".parse::<Number>().is_err());
    }

    #[test]
    fn test_ordering_ignores_precision() {
        assert_eq!(num("1.0"), num("1.00"));
        assert!(num("1.01") > num("1.0"));
        assert_eq!(num("1.01").min(num("0.9")).as_string(), "0.9");
    }

    #[test]
    fn test_serde_string_form() {
        let n = num("1.0500");
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "\"1.0500\"");

        let back: Number = serde_json::from_str(&json).unwrap();
        assert_eq!(back.precision(), 4);

        let from_float: Number = serde_json::from_str("2.5").unwrap();
        assert_eq!(from_float.as_string(), "2.5");
    }
}
