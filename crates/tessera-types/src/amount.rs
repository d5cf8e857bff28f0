use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stake or voice-credit quantity in integer minor units.
///
/// Quadratic costs grow fast, so every arithmetic helper is either checked
/// or saturating; there is no floating point anywhere in the engine.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Checked multiplication
    pub fn checked_mul(&self, rhs: Self) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(Self)
    }

    pub fn saturating_add(&self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(&self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Addition returning a typed error instead of `None`.
    pub fn try_add(&self, rhs: Self) -> Result<Self, TypesError> {
        self.checked_add(rhs).ok_or(TypesError::AmountOverflow)
    }

    /// Subtraction returning a typed error instead of `None`.
    pub fn try_sub(&self, rhs: Self) -> Result<Self, TypesError> {
        self.checked_sub(rhs).ok_or(TypesError::AmountUnderflow)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Self(value as u128)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc.saturating_add(x))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl FromStr for Amount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse::<u128>()?))
    }
}

/// A fraction in basis points (10000 = 100%).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BasisPoints(u16);

impl BasisPoints {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(10_000);
    /// Simple majority
    pub const HALF: Self = Self(5_000);

    /// Create from a raw basis-point value, rejecting anything above 100%.
    pub fn new(bps: u32) -> Result<Self, TypesError> {
        if bps > 10_000 {
            return Err(TypesError::BasisPointsOutOfRange(bps));
        }
        Ok(Self(bps as u16))
    }

    /// Create from a whole percentage (0..=100).
    pub fn from_percent(percent: u32) -> Result<Self, TypesError> {
        let bps = percent
            .checked_mul(100)
            .ok_or(TypesError::BasisPointsOutOfRange(u32::MAX))?;
        Self::new(bps)
    }

    pub const fn get(&self) -> u16 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `10000 - self`
    pub fn complement(&self) -> Self {
        Self(10_000 - self.0)
    }

    /// Apply this fraction to an amount, rounding down.
    ///
    /// Split into quotient and remainder so that `amount * bps` cannot
    /// overflow even for amounts close to `u128::MAX`.
    pub fn apply(&self, amount: Amount) -> Amount {
        let bps = self.0 as u128;
        let whole = amount.get() / 10_000 * bps;
        let part = amount.get() % 10_000 * bps / 10_000;
        Amount::new(whole + part)
    }

    /// `part / whole` in basis points, rounding down and capped at 100%.
    /// A zero `whole` yields zero.
    pub fn ratio(part: Amount, whole: Amount) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        let bps = match part.get().checked_mul(10_000) {
            Some(scaled) => scaled / whole.get(),
            None => part.get() / (whole.get() / 10_000).max(1),
        };
        Self(bps.min(10_000) as u16)
    }

    /// Exact test of `part / whole >= self` without rounding.
    /// A zero `whole` never meets a non-zero threshold.
    pub fn is_met_by(&self, part: Amount, whole: Amount) -> bool {
        if whole.is_zero() {
            return self.is_zero();
        }
        match (
            part.get().checked_mul(10_000),
            whole.get().checked_mul(self.0 as u128),
        ) {
            (Some(lhs), Some(rhs)) => lhs >= rhs,
            _ => Self::ratio(part, whole) >= *self,
        }
    }
}

impl TryFrom<u32> for BasisPoints {
    type Error = TypesError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BasisPoints> for u32 {
    fn from(value: BasisPoints) -> Self {
        value.0 as u32
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl fmt::Debug for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BasisPoints({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_amount_checked_arithmetic() {
        let a = Amount::new(10);
        let b = Amount::new(3);
        assert_eq!(a.checked_add(b), Some(Amount::new(13)));
        assert_eq!(a.checked_sub(b), Some(Amount::new(7)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(Amount::MAX.checked_add(Amount::new(1)), None);
        assert_eq!(b.try_sub(a), Err(TypesError::AmountUnderflow));
    }

    #[test]
    fn test_amount_saturating() {
        assert_eq!(Amount::new(3).saturating_sub(Amount::new(5)), Amount::ZERO);
        assert_eq!(Amount::MAX.saturating_add(Amount::new(1)), Amount::MAX);
    }

    #[test]
    fn test_amount_parse_and_display() {
        let amount: Amount = "12345".parse().unwrap();
        assert_eq!(amount, Amount::new(12345));
        assert_eq!(amount.to_string(), "12345");
        assert!("-1".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_serde_transparent() {
        let json = serde_json::to_string(&Amount::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_bps_bounds() {
        assert!(BasisPoints::new(10_000).is_ok());
        assert_eq!(
            BasisPoints::new(10_001),
            Err(TypesError::BasisPointsOutOfRange(10_001))
        );
        assert_eq!(BasisPoints::from_percent(60).unwrap().get(), 6_000);
        assert!(BasisPoints::from_percent(101).is_err());
    }

    #[test]
    fn test_bps_apply() {
        let half = BasisPoints::HALF;
        assert_eq!(half.apply(Amount::new(101)), Amount::new(50));
        assert_eq!(BasisPoints::MAX.apply(Amount::new(77)), Amount::new(77));
        assert_eq!(BasisPoints::ZERO.apply(Amount::new(77)), Amount::ZERO);
        // Large values do not overflow
        assert_eq!(BasisPoints::MAX.apply(Amount::MAX), Amount::MAX);
    }

    #[test]
    fn test_bps_ratio() {
        // 85 / 105 = 80.95% -> 8095 bps
        assert_eq!(BasisPoints::ratio(Amount::new(85), Amount::new(105)).get(), 8_095);
        assert_eq!(BasisPoints::ratio(Amount::new(5), Amount::ZERO), BasisPoints::ZERO);
        assert_eq!(BasisPoints::ratio(Amount::new(200), Amount::new(100)), BasisPoints::MAX);
    }

    #[test]
    fn test_bps_is_met_by_exact() {
        let sixty = BasisPoints::from_percent(60).unwrap();
        assert!(sixty.is_met_by(Amount::new(85), Amount::new(105)));
        assert!(sixty.is_met_by(Amount::new(60), Amount::new(100)));
        assert!(!sixty.is_met_by(Amount::new(59), Amount::new(100)));
        // 2/3 is 6666.6 bps, just under 6667
        let two_thirds = BasisPoints::new(6_667).unwrap();
        assert!(!two_thirds.is_met_by(Amount::new(2), Amount::new(3)));
        assert!(!sixty.is_met_by(Amount::ZERO, Amount::ZERO));
    }

    #[test]
    fn test_bps_display() {
        assert_eq!(BasisPoints::new(8_095).unwrap().to_string(), "80.95%");
        assert_eq!(BasisPoints::HALF.to_string(), "50.00%");
    }

    #[test]
    fn test_bps_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<BasisPoints>("10001").is_err());
        let bps: BasisPoints = serde_json::from_str("2500").unwrap();
        assert_eq!(bps.get(), 2_500);
    }

    proptest! {
        #[test]
        fn prop_apply_never_exceeds_amount(value in any::<u128>(), bps in 0u32..=10_000) {
            let fraction = BasisPoints::new(bps).unwrap();
            let applied = fraction.apply(Amount::new(value));
            prop_assert!(applied <= Amount::new(value));
        }

        #[test]
        fn prop_apply_plus_complement_within_one_unit(value in 0u128..1_000_000_000_000, bps in 0u32..=10_000) {
            let fraction = BasisPoints::new(bps).unwrap();
            let total = fraction.apply(Amount::new(value)).get()
                + fraction.complement().apply(Amount::new(value)).get();
            prop_assert!(total <= value && value - total <= 1);
        }
    }
}
