use core::{fmt, str::FromStr};

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{BoundedIntError, Int256, parse_decimal};

/// Unsigned 256-bit amount in `[0, 2^256 - 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint256(U256);

impl Uint256 {
    /// Zero.
    pub const ZERO: Self = Self(U256::ZERO);

    /// `2^256 - 1`.
    pub const MAX: Self = Self(U256::MAX);

    /// Width of the binary encoding.
    pub const ENCODED_LEN: usize = 32;

    /// Returns zero.
    pub const fn new() -> Self {
        Self::ZERO
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Wraps a raw value. Every `U256` is in range.
    pub const fn from_raw(value: U256) -> Self {
        Self(value)
    }

    /// Returns the inner value by copy.
    pub const fn value(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns the value as `u64` if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    /// Replaces the value with a parsed literal; unchanged on error.
    pub fn set(&mut self, literal: &str) -> Result<(), BoundedIntError> {
        *self = literal.parse()?;
        Ok(())
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, BoundedIntError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(BoundedIntError::Overflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, BoundedIntError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(BoundedIntError::Underflow)
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, BoundedIntError> {
        self.0
            .checked_mul(rhs.0)
            .map(Self)
            .ok_or(BoundedIntError::Overflow)
    }

    /// Subtracts `rhs`, clamping at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// 32-byte big-endian form, as used on-chain.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }

    /// Decodes the 32-byte big-endian form.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, BoundedIntError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            BoundedIntError::Malformed(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(U256::from_be_bytes(array)))
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Uint256 {
    type Err = BoundedIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_decimal(s)? {
            (true, magnitude) if !magnitude.is_zero() => Err(BoundedIntError::Underflow),
            (_, magnitude) => Ok(Self(magnitude)),
        }
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<U256> for Uint256 {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<Uint256> for U256 {
    fn from(value: Uint256) -> Self {
        value.0
    }
}

impl TryFrom<Int256> for Uint256 {
    type Error = BoundedIntError;

    fn try_from(value: Int256) -> Result<Self, Self::Error> {
        if value.is_negative() {
            return Err(BoundedIntError::Underflow);
        }
        Ok(Self(value.value().into_raw()))
    }
}

impl Serialize for Uint256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uint256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MAX_LITERAL: &str =
        "115792089237316195423570985008687907853269984665640564039457584007913129639935";
    const OVER_MAX_LITERAL: &str =
        "115792089237316195423570985008687907853269984665640564039457584007913129639936";

    #[test]
    fn test_bounds_accepted() {
        assert_eq!("0".parse::<Uint256>().unwrap(), Uint256::ZERO);
        assert_eq!(MAX_LITERAL.parse::<Uint256>().unwrap(), Uint256::MAX);
        assert_eq!("-0".parse::<Uint256>().unwrap(), Uint256::ZERO);
    }

    #[test]
    fn test_bounds_rejected() {
        assert_matches!("-1".parse::<Uint256>(), Err(BoundedIntError::Underflow));
        assert_matches!(
            OVER_MAX_LITERAL.parse::<Uint256>(),
            Err(BoundedIntError::Overflow)
        );
    }

    #[test]
    fn test_set_leaves_value_on_error() {
        let mut v = Uint256::from_u64(7);
        assert_matches!(v.set("-5"), Err(BoundedIntError::Underflow));
        assert_eq!(v, Uint256::from_u64(7));
        assert_matches!(v.set("seven"), Err(BoundedIntError::InvalidLiteral(_)));
        assert_eq!(v, Uint256::from_u64(7));

        v.set("1000").unwrap();
        assert_eq!(v, Uint256::from_u64(1000));
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Uint256::from_u64(10);
        let b = Uint256::from_u64(3);
        assert_eq!(a.checked_add(b).unwrap(), Uint256::from_u64(13));
        assert_eq!(a.checked_sub(b).unwrap(), Uint256::from_u64(7));
        assert_eq!(a.checked_mul(b).unwrap(), Uint256::from_u64(30));

        assert_matches!(b.checked_sub(a), Err(BoundedIntError::Underflow));
        assert_matches!(
            Uint256::MAX.checked_add(Uint256::from_u64(1)),
            Err(BoundedIntError::Overflow)
        );
        assert_matches!(
            Uint256::MAX.checked_mul(Uint256::from_u64(2)),
            Err(BoundedIntError::Overflow)
        );
    }

    #[test]
    fn test_json_is_quoted_decimal() {
        let v = Uint256::from_u64(1_000_000);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"1000000\"");

        let max: Uint256 = serde_json::from_str(&format!("\"{MAX_LITERAL}\"")).unwrap();
        assert_eq!(max, Uint256::MAX);

        assert!(serde_json::from_str::<Uint256>("1000000").is_err());
        assert!(serde_json::from_str::<Uint256>("\"-3\"").is_err());
    }

    #[test]
    fn test_binary_matches_onchain_word() {
        let bytes = Uint256::from_u64(42).to_be_bytes();
        assert_eq!(bytes[31], 42);
        assert!(bytes[..31].iter().all(|b| *b == 0));

        assert_eq!(Uint256::from_be_slice(&bytes).unwrap(), Uint256::from_u64(42));
        assert_matches!(
            Uint256::from_be_slice(&bytes[1..]),
            Err(BoundedIntError::Malformed(_))
        );
    }

    #[test]
    fn test_ordering() {
        assert!(Uint256::from_u64(1) < Uint256::from_u64(2));
        assert!(Uint256::MAX > Uint256::ZERO);
        assert_eq!(Uint256::from_u64(5).saturating_sub(Uint256::from_u64(9)), Uint256::ZERO);
    }
}
