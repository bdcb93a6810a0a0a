//! Bounded 256-bit values for SWAP accounting.
//!
//! Every monetary amount that crosses the chain boundary (cumulative payouts,
//! deposits, paid-out totals) is one of the two types in this crate:
//!
//! - [`Uint256`] - range `[0, 2^256 - 1]`, the on-chain `uint256`
//! - [`Int256`] - range `[-2^255, 2^255 - 1]`, used for signed aggregates
//!
//! Arithmetic is checked and reports [`BoundedIntError::Overflow`] or
//! [`BoundedIntError::Underflow`] instead of wrapping. Both types serialize to
//! JSON as a quoted base-10 string so that values survive decoders without
//! native 256-bit numbers.

mod int256;
mod uint256;

pub use int256::Int256;
pub use uint256::Uint256;

use alloy_primitives::{B256, U256};

/// Identifier of a connected counterparty.
pub type PeerId = B256;

/// Errors produced by bounded-integer construction, arithmetic and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoundedIntError {
    /// Result is above the upper bound.
    #[error("value overflows the representable range")]
    Overflow,

    /// Result is below the lower bound.
    #[error("value underflows the representable range")]
    Underflow,

    /// Input is not a base-10 integer literal.
    #[error("invalid integer literal: {0:?}")]
    InvalidLiteral(String),

    /// Binary input is malformed.
    #[error("malformed encoding: {0}")]
    Malformed(String),
}

/// Parses an optionally signed base-10 literal into `(negative, magnitude)`.
///
/// A magnitude that does not fit 256 bits is reported as `Overflow` for a
/// positive literal and `Underflow` for a negative one.
pub(crate) fn parse_decimal(literal: &str) -> Result<(bool, U256), BoundedIntError> {
    let invalid = || BoundedIntError::InvalidLiteral(literal.to_string());

    let (negative, digits) = match literal.as_bytes().first() {
        Some(b'-') => (true, literal.get(1..).unwrap_or_default()),
        Some(b'+') => (false, literal.get(1..).unwrap_or_default()),
        _ => (false, literal),
    };
    if digits.is_empty() {
        return Err(invalid());
    }

    let out_of_range = if negative {
        BoundedIntError::Underflow
    } else {
        BoundedIntError::Overflow
    };
    let ten = U256::from(10u8);
    let mut magnitude = U256::ZERO;
    for c in digits.chars() {
        let digit = c.to_digit(10).ok_or_else(invalid)?;
        magnitude = magnitude
            .checked_mul(ten)
            .and_then(|m| m.checked_add(U256::from(digit)))
            .ok_or_else(|| out_of_range.clone())?;
    }

    Ok((negative, magnitude))
}
