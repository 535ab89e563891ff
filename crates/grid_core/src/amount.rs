//! Arbitrary-precision energy amounts.
//!
//! [`EnergyAmount`] is the native unit of the grid: an immutable,
//! unbounded, non-negative integer magnitude. Every operation that could
//! underflow clamps to zero instead, so arithmetic is total and no call
//! site has to handle a numeric error in the per-step hot path.
//!
//! All stored state uses exact integer math. Floating point appears only
//! at display boundaries ([`EnergyAmount::to_f64`]) and never feeds back
//! into stored amounts.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GridError;

/// An immutable non-negative energy quantity of unbounded magnitude.
///
/// Ordering is total; equality is exact. Arithmetic always produces a new
/// value and never underflows below zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EnergyAmount(BigUint);

impl EnergyAmount {
    /// The zero amount.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// The unit amount.
    #[must_use]
    pub fn one() -> Self {
        Self(BigUint::from(1u32))
    }

    /// Create an amount from a plain integer.
    #[must_use]
    pub fn from_units(units: u64) -> Self {
        Self(BigUint::from(units))
    }

    /// Create an amount from a wide integer.
    #[must_use]
    pub fn from_units_u128(units: u128) -> Self {
        Self(BigUint::from(units))
    }

    /// Create the amount `10^exp`.
    ///
    /// Tier capacities and budget rates are defined as powers of ten.
    #[must_use]
    pub fn pow10(exp: u32) -> Self {
        Self(BigUint::from(10u32).pow(exp))
    }

    /// Create an amount from a raw magnitude.
    #[must_use]
    pub fn from_biguint(value: BigUint) -> Self {
        Self(value)
    }

    /// Borrow the raw magnitude.
    #[must_use]
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Whether this amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Sum of two amounts.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    /// Difference, floored at zero.
    #[must_use]
    pub fn saturating_sub(&self, other: &Self) -> Self {
        if self.0 >= other.0 {
            Self(&self.0 - &other.0)
        } else {
            Self::zero()
        }
    }

    /// Product of two amounts.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        Self(&self.0 * &other.0)
    }

    /// Product with a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: u64) -> Self {
        Self(&self.0 * BigUint::from(scalar))
    }

    /// Quotient of two amounts (floor division). Zero divisor yields zero.
    #[must_use]
    pub fn div(&self, other: &Self) -> Self {
        if other.is_zero() {
            Self::zero()
        } else {
            Self(&self.0 / &other.0)
        }
    }

    /// Quotient with a scalar (floor division). Zero divisor yields zero.
    #[must_use]
    pub fn div_scalar(&self, scalar: u64) -> Self {
        if scalar == 0 {
            Self::zero()
        } else {
            Self(&self.0 / BigUint::from(scalar))
        }
    }

    /// Exact proportional share: `self * numerator / denominator`, with the
    /// multiplication performed before the floor division so no precision
    /// is lost. Zero denominator yields zero.
    ///
    /// This is the primitive behind scarcity distribution: the sum of
    /// floored shares never exceeds `self` when the numerators sum to the
    /// denominator.
    #[must_use]
    pub fn mul_div(&self, numerator: &Self, denominator: &Self) -> Self {
        if denominator.is_zero() {
            Self::zero()
        } else {
            Self(&self.0 * &numerator.0 / &denominator.0)
        }
    }

    /// This amount clamped from above: the smaller of `self` and `limit`.
    ///
    /// Named to stay clear of [`Ord::min`], whose by-value receiver would
    /// otherwise shadow an inherent `min` at owned call sites.
    #[must_use]
    pub fn capped_at(&self, limit: &Self) -> Self {
        if self <= limit {
            self.clone()
        } else {
            limit.clone()
        }
    }

    /// This amount clamped from below: the larger of `self` and `floor`.
    #[must_use]
    pub fn at_least(&self, floor: &Self) -> Self {
        if self >= floor {
            self.clone()
        } else {
            floor.clone()
        }
    }

    /// Lossy conversion for display and diagnostics only.
    ///
    /// Never feed the result back into stored state; amounts beyond f64
    /// range saturate to `f64::MAX`.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::MAX)
    }

    /// Conversion from a float. Negative, NaN and infinite inputs yield
    /// zero; the fractional part is truncated.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::zero();
        }
        BigUint::from_f64(value.trunc()).map_or_else(Self::zero, Self)
    }

    /// Canonical decimal string. The round trip through [`FromStr`] is
    /// exact; this is the only sanctioned persistence format for amounts.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        self.0.to_str_radix(10)
    }

    /// Parse a canonical decimal string, falling back to zero on any
    /// malformed input. Used at the restore boundary, which must never
    /// fail the surrounding load.
    #[must_use]
    pub fn parse_or_zero(input: &str) -> Self {
        input.parse().unwrap_or_else(|_| Self::zero())
    }

    /// Human-readable magnitude string with powers-of-1000 suffixes and
    /// two-decimal half-up rounding. Display only; never parsed back.
    #[must_use]
    pub fn format_suffixed(&self) -> String {
        const SUFFIXES: [&str; 8] = ["k", "M", "G", "T", "P", "E", "Z", "Y"];
        let thousand = BigUint::from(1000u32);
        if self.0 < thousand {
            return self.0.to_str_radix(10);
        }

        let mut divisor = thousand.clone();
        for suffix in SUFFIXES {
            if &self.0 / &divisor < thousand {
                // Two decimals, rounded half-up: (v * 100 + d/2) / d.
                let scaled = (&self.0 * 100u32 + &divisor / 2u32) / &divisor;
                return format!("{}.{:02}{}", &scaled / 100u32, &scaled % 100u32, suffix);
            }
            divisor *= &thousand;
        }

        // Beyond the largest suffix, fall back to plain digits.
        self.0.to_str_radix(10)
    }
}

impl fmt::Display for EnergyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_suffixed())
    }
}

impl FromStr for EnergyAmount {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| GridError::MalformedAmount(s.to_owned()))
    }
}

impl From<u64> for EnergyAmount {
    fn from(units: u64) -> Self {
        Self::from_units(units)
    }
}

impl Serialize for EnergyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical_string())
    }
}

impl<'de> Deserialize<'de> for EnergyAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(units: u64) -> EnergyAmount {
        EnergyAmount::from_units(units)
    }

    #[test]
    fn test_subtract_floors_at_zero() {
        assert_eq!(amt(10).saturating_sub(&amt(3)), amt(7));
        assert_eq!(amt(3).saturating_sub(&amt(10)), EnergyAmount::zero());
        assert_eq!(amt(3).saturating_sub(&amt(3)), EnergyAmount::zero());
    }

    #[test]
    fn test_zero_divisor_yields_zero() {
        assert_eq!(amt(100).div(&EnergyAmount::zero()), EnergyAmount::zero());
        assert_eq!(amt(100).div_scalar(0), EnergyAmount::zero());
        assert_eq!(
            amt(100).mul_div(&amt(1), &EnergyAmount::zero()),
            EnergyAmount::zero()
        );
    }

    #[test]
    fn test_mul_div_is_exact() {
        // 100 * 150 / 200 = 75 with no intermediate truncation.
        assert_eq!(amt(100).mul_div(&amt(150), &amt(200)), amt(75));
        // Floored shares never over-allocate.
        let available = amt(100);
        let a = available.mul_div(&amt(1), &amt(3));
        let b = available.mul_div(&amt(2), &amt(3));
        assert!(a.add(&b) <= available);
    }

    #[test]
    fn test_ordering_and_clamps() {
        assert!(amt(5) < amt(6));
        assert_eq!(amt(5).capped_at(&amt(6)), amt(5));
        assert_eq!(amt(6).capped_at(&amt(5)), amt(5));
        assert_eq!(amt(5).at_least(&amt(6)), amt(6));
        assert_eq!(amt(6).at_least(&amt(5)), amt(6));
    }

    #[test]
    fn test_canonical_round_trip() {
        let big = EnergyAmount::pow10(60).add(&amt(7));
        let parsed: EnergyAmount = big.canonical_string().parse().unwrap();
        assert_eq!(parsed, big);
    }

    #[test]
    fn test_malformed_parse_falls_back_to_zero() {
        assert_eq!(EnergyAmount::parse_or_zero("not a number"), EnergyAmount::zero());
        assert_eq!(EnergyAmount::parse_or_zero("-5"), EnergyAmount::zero());
        assert_eq!(EnergyAmount::parse_or_zero(""), EnergyAmount::zero());
        assert_eq!(EnergyAmount::parse_or_zero("42"), amt(42));
    }

    #[test]
    fn test_from_f64_guards() {
        assert_eq!(EnergyAmount::from_f64(-1.0), EnergyAmount::zero());
        assert_eq!(EnergyAmount::from_f64(f64::NAN), EnergyAmount::zero());
        assert_eq!(EnergyAmount::from_f64(f64::INFINITY), EnergyAmount::zero());
        assert_eq!(EnergyAmount::from_f64(12.9), amt(12));
    }

    #[test]
    fn test_suffixed_formatting() {
        assert_eq!(amt(0).format_suffixed(), "0");
        assert_eq!(amt(999).format_suffixed(), "999");
        assert_eq!(amt(1000).format_suffixed(), "1.00k");
        assert_eq!(amt(1500).format_suffixed(), "1.50k");
        assert_eq!(amt(2_340_000).format_suffixed(), "2.34M");
        assert_eq!(amt(1_005).format_suffixed(), "1.01k"); // half-up
        assert_eq!(EnergyAmount::pow10(9).format_suffixed(), "1.00G");
    }

    #[test]
    fn test_pow10() {
        assert_eq!(EnergyAmount::pow10(0), amt(1));
        assert_eq!(EnergyAmount::pow10(3), amt(1000));
        assert_eq!(
            EnergyAmount::pow10(48),
            "1000000000000000000000000000000000000000000000000"
                .parse()
                .unwrap()
        );
    }
}
