use core::{fmt, str::FromStr};

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{BoundedIntError, Uint256, parse_decimal};

const SIGN_POSITIVE: u8 = 0;
const SIGN_NEGATIVE: u8 = 1;

/// Signed 256-bit amount in `[-2^255, 2^255 - 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Int256(I256);

impl Int256 {
    pub const ZERO: Self = Self(I256::ZERO);

    /// `-2^255`.
    pub const MIN: Self = Self(I256::MIN);

    /// `2^255 - 1`.
    pub const MAX: Self = Self(I256::MAX);

    pub const fn new() -> Self {
        Self::ZERO
    }

    pub fn from_i64(value: i64) -> Self {
        let magnitude = U256::from(value.unsigned_abs());
        // |i64::MIN| = 2^63 is well inside the range
        Self::from_sign_magnitude(value < 0, magnitude).unwrap_or_default()
    }

    pub const fn from_raw(value: I256) -> Self {
        Self(value)
    }

    /// Returns the inner value by copy.
    pub const fn value(&self) -> I256 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Replaces the value with a parsed literal; unchanged on error.
    pub fn set(&mut self, literal: &str) -> Result<(), BoundedIntError> {
        *self = literal.parse()?;
        Ok(())
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, BoundedIntError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(if rhs.is_negative() {
            BoundedIntError::Underflow
        } else {
            BoundedIntError::Overflow
        })
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, BoundedIntError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(if rhs.is_negative() {
            BoundedIntError::Overflow
        } else {
            BoundedIntError::Underflow
        })
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, BoundedIntError> {
        self.0
            .checked_mul(rhs.0)
            .map(Self)
            .ok_or(if self.is_negative() != rhs.is_negative() {
                BoundedIntError::Underflow
            } else {
                BoundedIntError::Overflow
            })
    }

    /// Sign byte, magnitude length byte, then the big-endian magnitude
    /// without leading zeros.
    pub fn to_bytes(&self) -> Vec<u8> {
        let magnitude = self.0.unsigned_abs().to_be_bytes::<32>();
        let start = magnitude.iter().position(|b| *b != 0).unwrap_or(magnitude.len());
        let significant = magnitude.get(start..).unwrap_or_default();

        let mut out = Vec::with_capacity(2 + significant.len());
        out.push(if self.is_negative() {
            SIGN_NEGATIVE
        } else {
            SIGN_POSITIVE
        });
        out.push(significant.len() as u8);
        out.extend_from_slice(significant);
        out
    }

    /// Decodes the output of [`Int256::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BoundedIntError> {
        let malformed = |reason: &str| BoundedIntError::Malformed(reason.to_string());

        let [sign, len, magnitude @ ..] = bytes else {
            return Err(malformed("missing header"));
        };
        if usize::from(*len) != magnitude.len() || magnitude.len() > 32 {
            return Err(malformed("magnitude length mismatch"));
        }
        let negative = match *sign {
            SIGN_POSITIVE => false,
            SIGN_NEGATIVE => true,
            _ => return Err(malformed("unknown sign byte")),
        };

        let mut word = [0u8; 32];
        let offset = 32 - magnitude.len();
        word.get_mut(offset..)
            .ok_or_else(|| malformed("magnitude too long"))?
            .copy_from_slice(magnitude);
        Self::from_sign_magnitude(negative, U256::from_be_bytes(word))
    }

    fn from_sign_magnitude(negative: bool, magnitude: U256) -> Result<Self, BoundedIntError> {
        let max = I256::MAX.into_raw();
        if !negative {
            if magnitude > max {
                return Err(BoundedIntError::Overflow);
            }
            return Ok(Self(I256::from_raw(magnitude)));
        }
        // the negative side reaches one further, to -2^255
        if magnitude > max + U256::from(1u8) {
            return Err(BoundedIntError::Underflow);
        }
        Ok(Self(I256::from_raw(U256::ZERO.wrapping_sub(magnitude))))
    }
}

impl fmt::Display for Int256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Int256 {
    type Err = BoundedIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, magnitude) = parse_decimal(s)?;
        Self::from_sign_magnitude(negative, magnitude)
    }
}

impl From<i64> for Int256 {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl TryFrom<Uint256> for Int256 {
    type Error = BoundedIntError;

    fn try_from(value: Uint256) -> Result<Self, Self::Error> {
        Self::from_sign_magnitude(false, value.value())
    }
}

impl Serialize for Int256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Int256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(de::Error::custom)
    }
}
